//! Composition root shared by the server and worker binaries

use crate::config::Settings;
use crate::core::http::AppState;
use crate::core::runtime::TaskRunner;
use crate::core::scheduler::JobScheduler;
use crate::db::{MemoryStore, PostgresStore, Store};
use crate::error::{AppError, AppResult};
use crate::jobs::{register_default_jobs, JobContext};
use crate::metrics::Metrics;
use crate::models::NewChatSubscription;
use crate::services::ai::{PredictionProvider, Predictor};
use crate::services::market_data::{MarketDataProvider, MarketDataSource};
use crate::services::messaging::{Messenger, MessagingProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a process needs, wired once at startup
pub struct App {
    pub settings: Arc<Settings>,
    pub metrics: Arc<Metrics>,
    pub scheduler: JobScheduler,
    pub tasks: TaskRunner,
    pub context: Arc<JobContext>,
}

impl App {
    /// Connect the store, select providers, seed data and register the jobs.
    /// The scheduler is returned stopped.
    pub async fn build(settings: Settings) -> AppResult<Self> {
        let settings = Arc::new(settings);
        let metrics = Arc::new(
            Metrics::new().map_err(|e| AppError::Configuration(format!("metrics: {}", e)))?,
        );

        let store = connect_store(&settings, &metrics).await?;

        let market_data: Arc<dyn MarketDataProvider> =
            Arc::new(MarketDataSource::from_settings(&settings.providers)?);
        let predictor: Arc<dyn PredictionProvider> =
            Arc::new(Predictor::from_settings(&settings.providers)?);
        info!(
            market_data = market_data.id(),
            predictor = predictor.id(),
            "Providers selected: market data {}, predictions {}",
            market_data.id(),
            predictor.id()
        );

        let mut context = JobContext::new(store, market_data, predictor, settings.clone())
            .with_metrics(metrics.clone());
        match Messenger::from_settings(&settings.providers)? {
            Some(messenger) => {
                let messenger: Arc<dyn MessagingProvider> = Arc::new(messenger);
                context = context.with_messenger(messenger);
            }
            None => warn!("TELEGRAM_BOT_TOKEN not set, notifications are disabled"),
        }
        let context = Arc::new(context);

        seed(&context).await?;

        let scheduler = JobScheduler::with_metrics(metrics.clone());
        register_default_jobs(&scheduler, context.clone()).await?;

        Ok(Self {
            settings,
            metrics,
            scheduler,
            tasks: TaskRunner::default(),
            context,
        })
    }

    pub fn http_state(&self) -> AppState {
        AppState::new(
            self.metrics.clone(),
            self.scheduler.clone(),
            self.tasks.clone(),
            self.context.clone(),
        )
    }
}

async fn connect_store(settings: &Settings, metrics: &Metrics) -> AppResult<Arc<dyn Store>> {
    match &settings.database_url {
        Some(url) => {
            info!("Initializing PostgreSQL connection...");
            let store = PostgresStore::connect(url).await?;
            info!("PostgreSQL connected");
            metrics.database_connected.set(1.0);
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store; data will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Track the default symbols on an empty store and subscribe configured chats
async fn seed(ctx: &JobContext) -> AppResult<()> {
    if ctx.store.list_active_symbols().await?.is_empty() {
        for ticker in &ctx.settings.default_symbols {
            ctx.store.upsert_symbol(ticker, None).await?;
        }
        info!(
            symbols = ?ctx.settings.default_symbols,
            "Seeded {} default symbols",
            ctx.settings.default_symbols.len()
        );
    }

    for chat_id in &ctx.settings.providers.telegram_chat_ids {
        let subscription =
            NewChatSubscription::with_defaults(chat_id, ctx.settings.default_alert_threshold_pct);
        ctx.store.upsert_chat(&subscription).await?;
    }
    if !ctx.settings.providers.telegram_chat_ids.is_empty() {
        info!(
            chats = ctx.settings.providers.telegram_chat_ids.len(),
            "Subscribed {} configured chats",
            ctx.settings.providers.telegram_chat_ids.len()
        );
    }
    Ok(())
}
