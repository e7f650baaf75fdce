//! StockPulse Server
//!
//! Serves the HTTP API and runs the job scheduler in the same process.

use dotenvy::dotenv;
use stockpulse::config::Settings;
use stockpulse::core::bootstrap::App;
use stockpulse::core::http::start_server;
use stockpulse::logging;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let settings = Settings::from_env()?;
    info!("Starting StockPulse Server");
    info!(environment = %settings.environment, "Environment");
    info!(port = settings.port, "HTTP Server: http://0.0.0.0:{}", settings.port);

    let port = settings.port;
    let app = App::build(settings).await?;
    app.scheduler.start().await;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let state = app.http_state();
    let mut server_handle = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = start_server(state, port, shutdown).await {
            error!(error = %e, "HTTP server error");
        }
    });

    let server_exited = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            false
        }
        _ = &mut server_handle => {
            error!("HTTP server stopped");
            true
        }
    };

    if !server_exited {
        let _ = shutdown_tx.send(());
        if let Err(e) = server_handle.await {
            error!(error = %e, "HTTP server task failed");
        }
    }

    app.scheduler.stop().await;
    info!("StockPulse Server stopped");
    Ok(())
}
