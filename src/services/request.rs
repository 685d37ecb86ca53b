use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::RunSettings;
use crate::error::{RunError, RunResult};
use crate::exchange::types::{quantize, PlaceOrderRequest, ProductInfo, Side, SizeDenomination};

/// What the caller asked for. Built once, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderRequest {
    pub market_name: String,
    pub side: Side,
    pub amount: Decimal,
    pub amount_currency: String,
}

impl OrderRequest {
    pub fn build(market_name: &str, side: &str, amount: &str, amount_currency: &str) -> RunResult<Self> {
        let market_name = market_name.trim();
        if market_name.is_empty() {
            return Err(RunError::Validation("market name is empty".to_string()));
        }

        let side = Side::from_str(side.trim()).map_err(RunError::Validation)?;

        let amount = Decimal::from_str(amount.trim())
            .map_err(|e| RunError::Validation(format!("amount '{}' is not a decimal: {}", amount, e)))?;
        if amount <= Decimal::ZERO {
            return Err(RunError::Validation(format!("amount must be positive, got {}", amount)));
        }

        let amount_currency = amount_currency.trim();
        if amount_currency.is_empty() {
            return Err(RunError::Validation("amount currency is empty".to_string()));
        }

        Ok(Self {
            market_name: market_name.to_string(),
            side,
            amount,
            amount_currency: amount_currency.to_string(),
        })
    }

    pub fn from_settings(settings: &RunSettings) -> RunResult<Self> {
        Self::build(
            &settings.market_name,
            &settings.order_side,
            &settings.amount,
            &settings.amount_currency,
        )
    }

    /// The amount currency must be one side of the market.
    pub fn denomination(&self, product: &ProductInfo) -> RunResult<SizeDenomination> {
        if self.amount_currency == product.quote_currency {
            Ok(SizeDenomination::Quote)
        } else if self.amount_currency == product.base_currency {
            Ok(SizeDenomination::Base)
        } else {
            Err(RunError::Validation(format!(
                "amount_currency {} not in market {}",
                self.amount_currency, self.market_name
            )))
        }
    }

    /// Size on the exchange's grid for the denomination, truncated so the
    /// order never exceeds the requested amount.
    pub fn place_order(&self, product: &ProductInfo, client_order_id: String) -> RunResult<PlaceOrderRequest> {
        let denomination = self.denomination(product)?;
        let increment = product.increment_for(denomination);
        let size = quantize(self.amount, increment, RoundingStrategy::ToZero).ok_or_else(|| {
            RunError::Validation(format!(
                "amount {} {} is too large for the increment {}",
                self.amount, self.amount_currency, increment
            ))
        })?;

        if size <= Decimal::ZERO {
            return Err(RunError::Validation(format!(
                "amount {} {} is below the increment {}",
                self.amount, self.amount_currency, increment
            )));
        }
        if denomination == SizeDenomination::Base && size < product.base_min_size {
            return Err(RunError::Validation(format!(
                "size {} {} is below the market minimum {}",
                size, self.amount_currency, product.base_min_size
            )));
        }

        info!(
            "[ORDER] {} {} {} {} (size {} {:?}, increment {})",
            self.market_name, self.side, self.amount, self.amount_currency, size, denomination, increment
        );

        Ok(PlaceOrderRequest {
            product_id: self.market_name.clone(),
            side: self.side,
            denomination,
            size,
            client_order_id,
        })
    }

    /// "{market} {side} order of {amount} {currency}", the prefix of every alert subject.
    pub fn describe(&self) -> String {
        format!(
            "{} {} order of {} {}",
            self.market_name, self.side, self.amount, self.amount_currency
        )
    }
}

/// Fresh idempotency key for one logical order intent.
pub fn generate_client_order_id() -> String {
    Uuid::new_v4().to_string()
}
