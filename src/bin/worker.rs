//! StockPulse Worker
//!
//! Runs the job scheduler without the HTTP surface. Can be run as a
//! separate process from the web server.

use dotenvy::dotenv;
use stockpulse::config::Settings;
use stockpulse::core::bootstrap::App;
use stockpulse::logging;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let settings = Settings::from_env()?;
    info!("Starting StockPulse Worker");
    info!(environment = %settings.environment, "Environment");

    let app = App::build(settings).await?;
    for name in app.scheduler.job_names().await {
        info!(job = %name, "Scheduled job: {}", name);
    }
    app.scheduler.start().await;

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    app.scheduler.stop().await;
    info!("StockPulse Worker stopped");
    Ok(())
}
