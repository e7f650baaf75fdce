//! Job context for dependency injection

use crate::config::Settings;
use crate::db::Store;
use crate::metrics::Metrics;
use crate::services::ai::PredictionProvider;
use crate::services::market_data::MarketDataProvider;
use crate::services::messaging::MessagingProvider;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Collaborators shared by every job body and on-demand task.
///
/// Built once by the composition root. `messenger` is absent when no bot
/// token is configured; notification jobs then skip their run.
pub struct JobContext {
    pub store: Arc<dyn Store>,
    pub market_data: Arc<dyn MarketDataProvider>,
    pub predictor: Arc<dyn PredictionProvider>,
    pub messenger: Option<Arc<dyn MessagingProvider>>,
    pub settings: Arc<Settings>,
    pub metrics: Option<Arc<Metrics>>,
    /// Newest price point already alerted on, per symbol id
    pub(crate) alerted: Mutex<HashMap<i64, DateTime<Utc>>>,
}

impl JobContext {
    pub fn new(
        store: Arc<dyn Store>,
        market_data: Arc<dyn MarketDataProvider>,
        predictor: Arc<dyn PredictionProvider>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            store,
            market_data,
            predictor,
            messenger: None,
            settings,
            metrics: None,
            alerted: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_messenger(mut self, messenger: Arc<dyn MessagingProvider>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
