//! Prediction accuracy evaluation

pub mod accuracy;
pub mod batch;
pub mod summary;

pub use accuracy::evaluate;
pub use batch::{evaluate_prediction, run_evaluation, EvaluationReport};
pub use summary::prediction_summary;
