//! dcabot - dollar-cost-averaging purchases on Coinbase
//!
//! Places one market order per run, watches it until it settles, and
//! publishes the outcome to SNS or the log.

pub mod api;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod exchange;
pub mod notify;
pub mod services;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use config::{AppConfig, RunSettings};
pub use error::{RunError, RunResult};
pub use events::{NotificationEvent, RunResponse, TriggerEvent};
pub use services::request::OrderRequest;
