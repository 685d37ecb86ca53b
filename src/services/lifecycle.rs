//! Order lifecycle: submit once, poll until the order settles or we give up.
//!
//! ```text
//! PENDING_SUBMIT -> OPEN | PENDING | UNKNOWN -> FILLED
//!                                            -> CANCELLED | REJECTED
//! ```
//!
//! The local `Order` is replaced by a fresh read on every poll. Nothing here
//! cancels or resubmits an order.

use std::time::Duration;

use rust_decimal::{Decimal, RoundingStrategy};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::RunSettings;
use crate::constants::{events, polling};
use crate::error::{ExchangeError, RunError, RunResult};
use crate::events::NotificationEvent;
use crate::exchange::traits::TradingApi;
use crate::exchange::types::{quantize, Order, OrderStatus, PlaceOrderRequest, ProductInfo};
use crate::notify::Notifier;
use crate::services::reporting;
use crate::services::request::OrderRequest;

/// Fixed-interval polling with a cumulative give-up threshold. The interval
/// is never zero, so `waited` always grows and the loop always ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    warn_after: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, warn_after: Duration) -> RunResult<Self> {
        if interval.is_zero() {
            return Err(RunError::Validation("poll interval must be at least one second".to_string()));
        }
        Ok(Self { interval, warn_after })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn warn_after(&self) -> Duration {
        self.warn_after
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: polling::POLL_INTERVAL,
            warn_after: polling::WARN_AFTER,
        }
    }
}

impl TryFrom<&RunSettings> for PollPolicy {
    type Error = RunError;

    fn try_from(settings: &RunSettings) -> RunResult<Self> {
        Self::new(settings.poll_interval, settings.warn_after)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    Filled,
    CancelledOrRejected,
}

/// `None` while the exchange is still working on the order.
///
/// A cancel or reject message is decisive unless the status is OPEN, FILLED
/// or UNKNOWN, whatever the status says otherwise.
pub fn classify(order: &Order) -> Option<Terminal> {
    let message_overrides = !matches!(
        order.status,
        OrderStatus::Open | OrderStatus::Filled | OrderStatus::Unknown
    );
    if order.has_cancel_or_reject_message() && message_overrides {
        return Some(Terminal::CancelledOrRejected);
    }

    if order.status.is_pending() {
        return None;
    }
    match order.status {
        OrderStatus::Filled => Some(Terminal::Filled),
        _ => Some(Terminal::CancelledOrRejected),
    }
}

/// How a filled order ended up.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderOutcome {
    pub order: Order,
    /// Average fill price on the quote increment grid.
    pub average_price: Option<Decimal>,
    pub waited: Duration,
}

pub struct LifecycleDriver<'a> {
    exchange: &'a dyn TradingApi,
    notifier: &'a dyn Notifier,
    policy: PollPolicy,
}

impl<'a> LifecycleDriver<'a> {
    pub fn new(exchange: &'a dyn TradingApi, notifier: &'a dyn Notifier, policy: PollPolicy) -> Self {
        Self {
            exchange,
            notifier,
            policy,
        }
    }

    pub async fn execute(
        &self,
        request: &OrderRequest,
        product: &ProductInfo,
        placed: &PlaceOrderRequest,
    ) -> RunResult<OrderOutcome> {
        info!("🚀 [ORDER] Submitting: {} (client id {})", request.describe(), placed.client_order_id);

        let submitted = match self.exchange.submit_market_order(placed).await {
            Ok(order) => order,
            Err(ExchangeError::OrderRejected { message, raw }) => {
                error!(event = events::ORDER_REJECTED, "❌ [ORDER] Rejected: {}", message);
                self.notify(reporting::submission_rejected(request, &raw)).await;
                return Err(ExchangeError::OrderRejected { message, raw }.into());
            }
            Err(e) => {
                error!("❌ [ORDER] Submission failed: {}", e);
                return Err(e.into());
            }
        };

        info!(
            event = events::ORDER_SUBMITTED,
            "✅ [ORDER] Placed: order_id={} client_order_id={}", submitted.order_id, submitted.client_order_id
        );

        let (order, terminal, waited) = self.watch(request, submitted).await?;
        self.finish(request, product, order, terminal, waited).await
    }

    /// Polls until the order settles. Exceeding `warn_after`, or losing the
    /// exchange mid-poll, abandons the order as stuck.
    async fn watch(&self, request: &OrderRequest, submitted: Order) -> RunResult<(Order, Terminal, Duration)> {
        let mut waited = Duration::ZERO;

        // Give the exchange a moment before the first read
        sleep(self.policy.interval).await;
        let mut order = match self.exchange.get_order(&submitted.order_id).await {
            Ok(order) => order,
            Err(e) => return Err(self.abandon(request, &submitted, waited, Some(e)).await),
        };
        info!("[POLL] Order {} status {}", order.order_id, order.status);

        loop {
            if let Some(terminal) = classify(&order) {
                return Ok((order, terminal, waited));
            }

            if waited > self.policy.warn_after {
                return Err(self.abandon(request, &order, waited, None).await);
            }

            info!(
                "[POLL] Order {} still {}. Sleeping for {}s (total {}s)",
                order.order_id,
                order.status,
                self.policy.interval.as_secs_f64(),
                waited.as_secs_f64()
            );
            sleep(self.policy.interval).await;
            waited += self.policy.interval;

            order = match self.exchange.get_order(&order.order_id).await {
                Ok(fresh) => fresh,
                Err(e) => return Err(self.abandon(request, &order, waited, Some(e)).await),
            };
        }
    }

    async fn abandon(
        &self,
        request: &OrderRequest,
        last_seen: &Order,
        waited: Duration,
        cause: Option<ExchangeError>,
    ) -> RunError {
        let cause_text = cause.as_ref().map(|e| e.to_string());
        warn!(
            event = events::ORDER_STUCK,
            "⚠️ [POLL] Giving up on order {} ({}) after {}s{}",
            last_seen.order_id,
            last_seen.status,
            waited.as_secs(),
            cause_text.as_deref().map(|c| format!(": {}", c)).unwrap_or_default()
        );

        self.notify(reporting::order_stuck(request, last_seen, cause_text.as_deref())).await;

        RunError::StuckOrder {
            order_id: last_seen.order_id.clone(),
            status: last_seen.status.to_string(),
            waited_secs: waited.as_secs(),
        }
    }

    async fn finish(
        &self,
        request: &OrderRequest,
        product: &ProductInfo,
        order: Order,
        terminal: Terminal,
        waited: Duration,
    ) -> RunResult<OrderOutcome> {
        match terminal {
            Terminal::CancelledOrRejected => {
                warn!(
                    event = events::ORDER_CANCELLED,
                    "⚠️ [ORDER] {} ended {} (cancel: {:?}, reject: {:?})",
                    order.order_id,
                    order.status,
                    order.cancel_message,
                    order.reject_message
                );
                self.notify(reporting::order_cancelled(request, &order)).await;
                Err(RunError::OrderCancelledOrRejected {
                    order_id: order.order_id,
                    status: order.status.to_string(),
                })
            }
            Terminal::Filled => {
                let average_price = order
                    .average_filled_price
                    .and_then(|p| quantize(p, product.quote_increment, RoundingStrategy::MidpointAwayFromZero));

                let event = reporting::order_filled(request, &order, average_price, &product.quote_currency);
                info!(event = events::ORDER_FILLED, "✅ [ORDER] {}", event.subject);
                self.notify(event).await;

                Ok(OrderOutcome {
                    order,
                    average_price,
                    waited,
                })
            }
        }
    }

    /// Delivery problems are logged; they never change how the run ends.
    async fn notify(&self, event: NotificationEvent) {
        if let Err(e) = self.notifier.publish(&event).await {
            error!(
                event = events::NOTIFY_FAILED,
                "❌ [NOTIFY] {} failed to publish '{}': {}",
                self.notifier.name(),
                event.subject,
                e
            );
        }
    }
}
