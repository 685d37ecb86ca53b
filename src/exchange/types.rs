use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    /// Case-sensitive, matching the exchange's own spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("order side must be BUY or SELL, got '{}'", other)),
        }
    }
}

/// Which side of the pair an order size is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeDenomination {
    Base,
    Quote,
}

/// Exchange metadata for one market.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_id: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub base_min_size: Decimal,
    pub base_increment: Decimal,
    pub quote_increment: Decimal,
}

impl ProductInfo {
    /// Increment that applies to a size in the given denomination.
    pub fn increment_for(&self, denomination: SizeDenomination) -> Decimal {
        match denomination {
            SizeDenomination::Base => self.base_increment,
            SizeDenomination::Quote => self.quote_increment,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Open,
    Pending,
    Unknown,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Maps an exchange status string. Anything unrecognised is `Unknown`,
    /// which keeps the order in the polling loop.
    pub fn from_exchange(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => OrderStatus::Open,
            "PENDING" | "QUEUED" | "CANCEL_QUEUED" => OrderStatus::Pending,
            "FILLED" => OrderStatus::Filled,
            "CANCELLED" | "CANCELED" | "EXPIRED" => OrderStatus::Cancelled,
            "FAILED" | "REJECTED" => OrderStatus::Rejected,
            _ => OrderStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::Pending => "PENDING",
            OrderStatus::Unknown => "UNKNOWN",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        }
    }

    /// Still processing on the exchange side.
    pub fn is_pending(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Pending | OrderStatus::Unknown)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exchange view of an order. Replaced wholesale on every poll.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub client_order_id: String,
    pub status: OrderStatus,
    pub average_filled_price: Option<Decimal>,
    pub cancel_message: Option<String>,
    pub reject_message: Option<String>,
    /// Exchange payload as received, forwarded in notifications.
    pub raw: Value,
}

impl Order {
    pub fn has_cancel_or_reject_message(&self) -> bool {
        let present = |m: &Option<String>| m.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.cancel_message) || present(&self.reject_message)
    }
}

/// A market order ready for submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub product_id: String,
    pub side: Side,
    pub denomination: SizeDenomination,
    /// Already quantized to the market's increment for `denomination`.
    pub size: Decimal,
    /// Idempotency key; the exchange executes at most one order per id.
    pub client_order_id: String,
}

/// Snaps `value` onto the grid defined by `increment` and keeps the
/// increment's scale, so 14 with increment 0.01 renders as 14.00.
/// A non-positive increment leaves the value untouched. `None` when the step
/// count does not fit in a `Decimal`.
pub fn quantize(value: Decimal, increment: Decimal, strategy: RoundingStrategy) -> Option<Decimal> {
    if increment <= Decimal::ZERO {
        return Some(value);
    }
    let increment = increment.normalize();
    let steps = value.checked_div(increment)?.round_dp_with_strategy(0, strategy);
    let mut quantized = steps.checked_mul(increment)?;
    quantized.rescale(increment.scale());
    Some(quantized)
}
