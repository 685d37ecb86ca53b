//! One DCA run from settings to a response: validate, confirm, connect,
//! then hand the order to the lifecycle driver.

use std::io::{BufRead, Write};
use std::sync::Arc;

use tracing::info;

use crate::config::{AppConfig, RunSettings};
use crate::constants::events;
use crate::error::RunResult;
use crate::events::RunResponse;
use crate::exchange::factory::build_exchange;
use crate::exchange::traits::TradingApi;
use crate::notify::{build_notifier, Notifier};
use crate::services::confirmation;
use crate::services::lifecycle::{LifecycleDriver, OrderOutcome, PollPolicy};
use crate::services::request::{generate_client_order_id, OrderRequest};

pub type Connection = (Arc<dyn TradingApi>, Arc<dyn Notifier>);

/// Runs the whole flow. `connect` is only called once the request is valid
/// and confirmed, so a declined run never touches the network.
pub async fn run<R, W, F>(settings: &RunSettings, input: &mut R, output: &mut W, connect: F) -> RunResult<RunResponse>
where
    R: BufRead,
    W: Write,
    F: FnOnce(&AppConfig, bool) -> RunResult<Connection>,
{
    let request = OrderRequest::from_settings(settings)?;
    let policy = PollPolicy::try_from(settings)?;
    info!(
        event = events::RUN_STARTED,
        "🚀 [RUN] {} (sandbox={}, job={}, profile={})",
        request.describe(),
        settings.sandbox,
        settings.job,
        settings.profile
    );

    if confirmation::gate_required(settings) {
        confirmation::confirm(input, output)?;
    }

    let config = AppConfig::load(&settings.config_file, &settings.profile)?;
    let (exchange, notifier) = connect(&config, settings.sandbox)?;
    info!(
        "[RUN] Connected: exchange={} notifier={}",
        exchange.name(),
        notifier.name()
    );

    execute_order(&request, exchange.as_ref(), notifier.as_ref(), policy).await?;
    Ok(RunResponse::success())
}

/// Looks up the market, sizes the order under a fresh client id, and drives
/// it to a terminal state.
pub async fn execute_order(
    request: &OrderRequest,
    exchange: &dyn TradingApi,
    notifier: &dyn Notifier,
    policy: PollPolicy,
) -> RunResult<OrderOutcome> {
    let product = exchange.get_product(&request.market_name).await?;
    let placed = request.place_order(&product, generate_client_order_id())?;

    LifecycleDriver::new(exchange, notifier, policy)
        .execute(request, &product, &placed)
        .await
}

/// Live Coinbase adapter plus whichever notifier the profile supports.
pub fn connect_live(config: &AppConfig, sandbox: bool) -> RunResult<Connection> {
    let exchange = build_exchange(config, sandbox)?;
    let notifier = build_notifier(config);
    Ok((exchange, notifier))
}
