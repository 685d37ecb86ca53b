//! Builds the alerts published at each terminal point of a run.

use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::events::NotificationEvent;
use crate::exchange::types::Order;
use crate::services::request::OrderRequest;

/// The exchange refused the submission outright.
pub fn submission_rejected(request: &OrderRequest, raw: &Value) -> NotificationEvent {
    NotificationEvent::new(
        format!("Could not place {} {} order", request.market_name, request.side),
        raw.clone(),
    )
}

/// Still open after `warn_after`; we stopped watching but did not cancel.
pub fn order_stuck(request: &OrderRequest, last_seen: &Order, error: Option<&str>) -> NotificationEvent {
    let body = match error {
        Some(err) => json!({
            "error": err,
            "order": last_seen.raw,
        }),
        None => last_seen.raw.clone(),
    };
    NotificationEvent::new(format!("{} OPEN/UNFILLED", request.describe()), body)
}

/// Cancelled or rejected after it was accepted, usually by hand in the UI.
pub fn order_cancelled(request: &OrderRequest, order: &Order) -> NotificationEvent {
    NotificationEvent::new(format!("{} CANCELLED/REJECTED", request.describe()), order.raw.clone())
}

/// Filled. `price` is already quantized to the quote increment.
pub fn order_filled(
    request: &OrderRequest,
    order: &Order,
    price: Option<Decimal>,
    quote_currency: &str,
) -> NotificationEvent {
    let price_text = price.map(|p| p.to_string()).unwrap_or_else(|| "unknown".to_string());
    let subject = format!(
        "{} {} @ {} {}",
        request.describe(),
        order.status,
        price_text,
        quote_currency
    );

    let body = json!({
        "market_name": request.market_name,
        "order_side": request.side.as_str(),
        "amount": request.amount.to_string(),
        "amount_currency": request.amount_currency,
        "status": order.status.as_str(),
        "average_filled_price": price.map(|p| p.to_string()),
        "quote_currency": quote_currency,
        "order": order.raw,
    });

    NotificationEvent::new(subject, body)
}
