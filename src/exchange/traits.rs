use async_trait::async_trait;

use crate::error::ExchangeError;

use super::types::{Order, PlaceOrderRequest, ProductInfo};

pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// The only seam through which exchange state is read or mutated.
#[async_trait]
pub trait TradingApi: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_product(&self, market: &str) -> ExchangeResult<ProductInfo>;

    /// Must be idempotent on `order.client_order_id`.
    async fn submit_market_order(&self, order: &PlaceOrderRequest) -> ExchangeResult<Order>;

    async fn get_order(&self, order_id: &str) -> ExchangeResult<Order>;
}
