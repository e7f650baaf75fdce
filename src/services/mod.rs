//! External collaborators: market data, prediction and messaging providers

pub mod ai;
pub mod http;
pub mod market_data;
pub mod messaging;
pub mod telegram;
pub mod yahoo;

pub use ai::{PredictionProvider, Predictor};
pub use market_data::{MarketDataProvider, MarketDataSource};
pub use messaging::{Messenger, MessagingProvider};
