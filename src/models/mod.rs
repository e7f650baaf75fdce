//! Shared data models spanning the service layers.

pub mod indicators;
pub mod market;
pub mod notification;
pub mod prediction;

pub use indicators::{MacdIndicator, RsiIndicator, SmaIndicator, TechnicalSnapshot};
pub use market::{Candle, HistoricalSeries, PricePoint, Quote, TrackedSymbol};
pub use notification::{ChatSubscription, NewChatSubscription, PriceMove};
pub use prediction::{
    NewPrediction, PredictionEvaluation, PredictionOutcome, PredictionRecord, PredictionRequest,
    PredictionSummary, PredictionType, Timeframe,
};
