//! Recurring stock jobs: refresh, predict, evaluate, notify, clean up

pub mod context;
pub mod handlers;
pub mod notifications;
pub mod registry;

pub use context::JobContext;
pub use handlers::{BatchReport, CleanupReport};
pub use registry::{register_default_jobs, DEFAULT_JOBS};
