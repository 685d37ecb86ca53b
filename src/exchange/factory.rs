use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::error::{ExchangeError, RunError, RunResult};

use super::{coinbase::CoinbaseExchange, traits::TradingApi};

/// Coinbase is the only venue; `sandbox` picks the endpoint.
pub fn build_exchange(config: &AppConfig, sandbox: bool) -> RunResult<Arc<dyn TradingApi>> {
    let coinbase = config.coinbase(sandbox);
    if coinbase.api_key.is_empty() || coinbase.secret_key.is_empty() {
        return Err(RunError::Config(format!(
            "profile '{}' is missing API_KEY or SECRET_KEY",
            config.profile
        )));
    }

    info!("[EXCHANGE] Coinbase at {}", coinbase.base_url);
    let exchange = CoinbaseExchange::new(coinbase).map_err(|e| match e {
        ExchangeError::Configuration(msg) => RunError::Config(msg),
        other => RunError::Exchange(other),
    })?;
    info!(
        "[EXCHANGE] Signing with {} key",
        if exchange.uses_cdp_key() { "CDP" } else { "legacy" }
    );
    Ok(Arc::new(exchange))
}
