//! In-memory exchange and notifier for exercising a run without network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::error::{ExchangeError, NotifyError};
use crate::events::NotificationEvent;
use crate::exchange::traits::{ExchangeResult, TradingApi};
use crate::exchange::types::{Order, OrderStatus, PlaceOrderRequest, ProductInfo};
use crate::notify::Notifier;

/// BTC-USD with Coinbase's usual increments.
pub fn btc_usd_product() -> ProductInfo {
    ProductInfo {
        product_id: "BTC-USD".to_string(),
        base_currency: "BTC".to_string(),
        quote_currency: "USD".to_string(),
        base_min_size: Decimal::new(1, 8),
        base_increment: Decimal::new(1, 8),
        quote_increment: Decimal::new(1, 2),
    }
}

/// One scripted answer to `get_order`.
#[derive(Clone, Debug)]
pub enum PollStep {
    Status(OrderStatus),
    Filled(Decimal),
    WithMessage {
        status: OrderStatus,
        cancel_message: Option<String>,
        reject_message: Option<String>,
    },
    Unavailable(String),
}

pub struct FakeExchange {
    product: Option<ProductInfo>,
    reject_with: Option<String>,
    submit_unavailable: bool,
    script: Mutex<VecDeque<PollStep>>,
    last_step: Mutex<PollStep>,
    by_client_id: Mutex<HashMap<String, Order>>,
    pub product_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub get_order_calls: AtomicUsize,
}

impl FakeExchange {
    /// Orders stay OPEN forever unless scripted otherwise.
    pub fn new(product: ProductInfo) -> Self {
        Self {
            product: Some(product),
            reject_with: None,
            submit_unavailable: false,
            script: Mutex::new(VecDeque::new()),
            last_step: Mutex::new(PollStep::Status(OrderStatus::Open)),
            by_client_id: Mutex::new(HashMap::new()),
            product_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            get_order_calls: AtomicUsize::new(0),
        }
    }

    /// No market exists; `get_product` fails with `UnknownMarket`.
    pub fn without_product() -> Self {
        let mut fake = Self::new(btc_usd_product());
        fake.product = None;
        fake
    }

    /// Answers to successive `get_order` calls; the last one repeats.
    pub fn with_polls(self, steps: Vec<PollStep>) -> Self {
        if let Some(last) = steps.last() {
            *lock(&self.last_step) = last.clone();
        }
        *lock(&self.script) = steps.into();
        self
    }

    pub fn rejecting(mut self, message: &str) -> Self {
        self.reject_with = Some(message.to_string());
        self
    }

    pub fn unavailable_on_submit(mut self) -> Self {
        self.submit_unavailable = true;
        self
    }

    /// Distinct orders the exchange actually created.
    pub fn orders_created(&self) -> usize {
        lock(&self.by_client_id).len()
    }

    pub fn total_calls(&self) -> usize {
        self.product_calls.load(Ordering::SeqCst)
            + self.submit_calls.load(Ordering::SeqCst)
            + self.get_order_calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> PollStep {
        let mut script = lock(&self.script);
        match script.pop_front() {
            Some(step) => step,
            None => lock(&self.last_step).clone(),
        }
    }
}

#[async_trait]
impl TradingApi for FakeExchange {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn get_product(&self, market: &str) -> ExchangeResult<ProductInfo> {
        self.product_calls.fetch_add(1, Ordering::SeqCst);
        match &self.product {
            Some(p) if p.product_id == market => Ok(p.clone()),
            _ => Err(ExchangeError::UnknownMarket { market: market.to_string() }),
        }
    }

    async fn submit_market_order(&self, order: &PlaceOrderRequest) -> ExchangeResult<Order> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        if self.submit_unavailable {
            return Err(ExchangeError::Unavailable("connection reset".to_string()));
        }
        if let Some(message) = &self.reject_with {
            return Err(ExchangeError::OrderRejected {
                message: message.clone(),
                raw: json!({"success": false, "error_response": {"message": message}}),
            });
        }

        let mut orders = lock(&self.by_client_id);
        let next_id = format!("fake-order-{}", orders.len() + 1);
        let created = orders.entry(order.client_order_id.clone()).or_insert_with(|| Order {
            order_id: next_id.clone(),
            client_order_id: order.client_order_id.clone(),
            status: OrderStatus::Pending,
            average_filled_price: None,
            cancel_message: None,
            reject_message: None,
            raw: json!({"success": true, "success_response": {"order_id": next_id, "client_order_id": order.client_order_id}}),
        });
        Ok(created.clone())
    }

    async fn get_order(&self, order_id: &str) -> ExchangeResult<Order> {
        self.get_order_calls.fetch_add(1, Ordering::SeqCst);

        let client_order_id = lock(&self.by_client_id)
            .values()
            .find(|o| o.order_id == order_id)
            .map(|o| o.client_order_id.clone())
            .ok_or_else(|| ExchangeError::OrderNotFound { order_id: order_id.to_string() })?;

        let (status, price, cancel_message, reject_message) = match self.next_step() {
            PollStep::Status(s) => (s, None, None, None),
            PollStep::Filled(p) => (OrderStatus::Filled, Some(p), None, None),
            PollStep::WithMessage { status, cancel_message, reject_message } => {
                (status, None, cancel_message, reject_message)
            }
            PollStep::Unavailable(msg) => return Err(ExchangeError::Unavailable(msg)),
        };

        Ok(Order {
            order_id: order_id.to_string(),
            client_order_id: client_order_id.clone(),
            status,
            average_filled_price: price,
            cancel_message: cancel_message.clone(),
            reject_message: reject_message.clone(),
            raw: json!({
                "order_id": order_id,
                "client_order_id": client_order_id,
                "status": status.as_str(),
                "average_filled_price": price.map(|p| p.to_string()),
                "cancel_message": cancel_message.unwrap_or_default(),
                "reject_message": reject_message.unwrap_or_default(),
            }),
        })
    }
}

/// Keeps every published alert.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records, then reports a delivery failure.
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        lock(&self.events).clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        lock(&self.events).iter().map(|e| e.subject.clone()).collect()
    }

    pub fn bodies(&self) -> Vec<Value> {
        lock(&self.events).iter().map(|e| e.body.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        lock(&self.events).push(event.clone());
        if self.fail {
            return Err(NotifyError::NotConfigured("recording notifier set to fail".to_string()));
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
