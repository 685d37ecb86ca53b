//! Custom error types for the DCA runner
//!
//! Every way a run can end badly is a typed variant here; `main` is the only
//! place that turns one into a process exit code.

use serde_json::Value;
use thiserror::Error;

/// Top-level run errors. Each variant is terminal for the run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("User declined confirmation, no order submitted")]
    ConfirmationDeclined,

    #[error("Exchange API error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Order {order_id} still {status} after {waited_secs}s, stopped watching")]
    StuckOrder {
        order_id: String,
        status: String,
        waited_secs: u64,
    },

    #[error("Order {order_id} was {status} after submission")]
    OrderCancelledOrRejected { order_id: String, status: String },
}

impl RunError {
    /// Process exit code for this failure. Zero is reserved for success.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Validation(_) => 2,
            RunError::Config(_) => 3,
            RunError::ConfirmationDeclined => 4,
            RunError::Exchange(ExchangeError::OrderRejected { .. }) => 6,
            RunError::Exchange(_) => 5,
            RunError::StuckOrder { .. } => 7,
            RunError::OrderCancelledOrRejected { .. } => 8,
        }
    }

    /// HTTP status used when the run was triggered over the API.
    pub fn status_code(&self) -> u16 {
        match self {
            RunError::Validation(_) | RunError::ConfirmationDeclined => 400,
            RunError::Config(_) => 500,
            RunError::Exchange(ExchangeError::OrderRejected { .. }) => 422,
            RunError::Exchange(_) => 502,
            RunError::StuckOrder { .. } => 504,
            RunError::OrderCancelledOrRejected { .. } => 409,
        }
    }
}

/// Exchange adapter errors
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Exchange unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown market: {market}")]
    UnknownMarket { market: String },

    #[error("Order rejected: {message}")]
    OrderRejected { message: String, raw: Value },

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Exchange configuration: {0}")]
    Configuration(String),

    #[error("Malformed exchange payload: {0}")]
    Malformed(String),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        ExchangeError::Unavailable(err.to_string())
    }
}

/// Notification transport errors. Logged, never fatal.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notifier not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

pub type RunResult<T> = Result<T, RunError>;
