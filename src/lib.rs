//! Stock data aggregation, AI predictions and Telegram notifications driven
//! by a scheduled job orchestrator.

pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod evaluation;
pub mod indicators;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

pub use error::{AppError, AppResult};
