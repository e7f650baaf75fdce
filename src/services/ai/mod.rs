//! Prediction providers and provider selection

pub mod openai;
pub mod rule_based;

use crate::config::ProviderSettings;
use crate::error::{AppError, AppResult};
use crate::models::{PredictionOutcome, PredictionRequest};
use async_trait::async_trait;
use tracing::info;

pub use openai::OpenAiPredictor;
pub use rule_based::RuleBasedPredictor;

/// Produces a directional prediction for one symbol. `None` means the
/// provider could not answer; the failure is logged by the provider.
#[async_trait]
pub trait PredictionProvider: Send + Sync {
    fn id(&self) -> &'static str;

    async fn generate(&self, request: &PredictionRequest) -> Option<PredictionOutcome>;
}

/// Configured prediction provider
pub enum Predictor {
    OpenAi(OpenAiPredictor),
    RuleBased(RuleBasedPredictor),
}

impl Predictor {
    /// Select by `ai_provider`. Without an API key the rule-based predictor is
    /// used whatever the configured name; an unknown name is an error.
    pub fn from_settings(settings: &ProviderSettings) -> AppResult<Self> {
        let provider = settings.ai_provider.as_str();
        match provider {
            "rule_based" | "rule-based" | "custom" => {
                return Ok(Predictor::RuleBased(RuleBasedPredictor::new()))
            }
            "openai" => {}
            other => {
                return Err(AppError::Configuration(format!(
                    "unknown AI provider '{}'",
                    other
                )))
            }
        }

        match &settings.ai_api_key {
            Some(key) => Ok(Predictor::OpenAi(OpenAiPredictor::new(
                key.clone(),
                settings.ai_model.clone(),
                settings.ai_base_url.clone(),
            )?)),
            None => {
                info!(
                    provider = %provider,
                    "No AI API key configured, using the rule-based predictor"
                );
                Ok(Predictor::RuleBased(RuleBasedPredictor::new()))
            }
        }
    }
}

#[async_trait]
impl PredictionProvider for Predictor {
    fn id(&self) -> &'static str {
        match self {
            Predictor::OpenAi(_) => "openai",
            Predictor::RuleBased(_) => "rule_based",
        }
    }

    async fn generate(&self, request: &PredictionRequest) -> Option<PredictionOutcome> {
        match self {
            Predictor::OpenAi(predictor) => match predictor.request_prediction(request).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    openai::log_failure(&request.symbol, &e);
                    None
                }
            },
            Predictor::RuleBased(predictor) => Some(predictor.predict(request)),
        }
    }
}
