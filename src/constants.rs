//! Application-wide constants and defaults
//!
//! Centralizes the hardcoded values the runner falls back to when neither the
//! command line nor the trigger payload provides one.

use std::time::Duration;

/// CLI defaults for a run
pub mod defaults {
    pub const MARKET_NAME: &str = "BTC-USD";
    pub const ORDER_SIDE: &str = "BUY";
    pub const AMOUNT: &str = "4.00";
    pub const AMOUNT_CURRENCY: &str = "USD";
    pub const CONFIG_FILE: &str = "./settings-local.yaml";
    pub const PROFILE: &str = "production";
}

/// Order status polling
pub mod polling {
    use super::*;

    /// Fixed sleep between `get_order` calls
    pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

    /// Cumulative wait before a still-open order is reported as stuck
    pub const WARN_AFTER: Duration = Duration::from_secs(30);
}

/// Coinbase Advanced Trade endpoints
pub mod coinbase {
    use super::*;

    pub const PRODUCTION_URL: &str = "https://api.coinbase.com";
    pub const SANDBOX_URL: &str = "https://api-sandbox.coinbase.com";

    /// Per-request HTTP timeout
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
}

/// AWS SNS publishing
pub mod sns {
    use super::*;

    pub const SERVICE: &str = "sns";
    pub const API_VERSION: &str = "2010-03-31";

    /// SNS rejects subjects longer than this
    pub const MAX_SUBJECT_LEN: usize = 100;

    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Interactive confirmation gate
pub mod confirmation {
    pub const PROMPT: &str = "Production purchase! Confirm [Y]: ";
    pub const ACCEPT: &str = "Y";
}

/// HTTP trigger server
pub mod api {
    /// Environment variable holding the shared trigger secret
    pub const TRIGGER_TOKEN_ENV: &str = "TRIGGER_TOKEN";

    /// Header a caller presents the secret in
    pub const TRIGGER_TOKEN_HEADER: &str = "x-trigger-token";
}

/// Body returned on a successful run
pub const JOB_ENDED_BODY: &str = "DCA job ended";

/// Logging event names for structured logging
pub mod events {
    pub const RUN_STARTED: &str = "run_started";
    pub const ORDER_SUBMITTED: &str = "order_submitted";
    pub const ORDER_REJECTED: &str = "order_rejected";
    pub const ORDER_FILLED: &str = "order_filled";
    pub const ORDER_STUCK: &str = "order_stuck";
    pub const ORDER_CANCELLED: &str = "order_cancelled";
    pub const NOTIFY_FAILED: &str = "notify_failed";
}
