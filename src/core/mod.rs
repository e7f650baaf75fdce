//! Core application primitives (scheduler, task runner, HTTP surface)

pub mod bootstrap;
pub mod http;
pub mod runtime;
pub mod scheduler;
pub mod trigger;

pub use bootstrap::App;
pub use http::*;
pub use runtime::*;
pub use scheduler::*;
pub use trigger::Trigger;
