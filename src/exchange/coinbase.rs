use std::str::FromStr;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::{
    auth::RequestSigner,
    traits::{ExchangeResult, TradingApi},
    types::{Order, OrderStatus, PlaceOrderRequest, ProductInfo, SizeDenomination},
};

use crate::config::CoinbaseConfig;
use crate::constants::coinbase::REQUEST_TIMEOUT;
use crate::error::ExchangeError;

const PRODUCTS_PATH: &[&str] = &["api", "v3", "brokerage", "products"];
const ORDERS_PATH: &[&str] = &["api", "v3", "brokerage", "orders"];
const HISTORICAL_ORDERS_PATH: &[&str] = &["api", "v3", "brokerage", "orders", "historical"];

/// Coinbase Advanced Trade adapter.
#[derive(Clone)]
pub struct CoinbaseExchange {
    client: Client,
    base_url: Url,
    signer: RequestSigner,
}

impl CoinbaseExchange {
    pub fn new(config: CoinbaseConfig) -> ExchangeResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ExchangeError::Configuration(format!("invalid BASE_URL '{}': {}", config.base_url, e)))?;
        let signer = RequestSigner::new(config.api_key, config.secret_key)?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url,
            signer,
        })
    }

    pub fn uses_cdp_key(&self) -> bool {
        self.signer.is_cdp()
    }

    async fn send(&self, method: Method, segments: &[&str], body: Option<&Value>) -> ExchangeResult<(StatusCode, String)> {
        let body_text = match body {
            Some(b) => serde_json::to_string(b)?,
            None => String::new(),
        };

        let url = endpoint(&self.base_url, segments)?;
        let path = url.path().to_string();
        let host = url.host_str().unwrap_or_default().to_string();

        let mut req = self.client.request(method.clone(), url);
        req = self.signer.apply(req, method.as_str(), &host, &path, &body_text)?;
        if body.is_some() {
            req = req.header(CONTENT_TYPE, "application/json").body(body_text);
        }

        debug!("[COINBASE] {} {}", method, path);
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        Ok((status, text))
    }
}

/// Appends `segments` to the base URL, percent-encoding each one so an id
/// can never alter the request path.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> ExchangeResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ExchangeError::Configuration(format!("BASE_URL '{}' cannot carry a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[async_trait]
impl TradingApi for CoinbaseExchange {
    fn name(&self) -> &'static str {
        "coinbase"
    }

    async fn get_product(&self, market: &str) -> ExchangeResult<ProductInfo> {
        let path: Vec<&str> = PRODUCTS_PATH.iter().copied().chain([market]).collect();
        let (status, text) = self.send(Method::GET, &path, None).await?;

        if status == StatusCode::NOT_FOUND || (status.is_client_error() && text.contains("NOT_FOUND")) {
            return Err(ExchangeError::UnknownMarket { market: market.to_string() });
        }
        if !status.is_success() {
            return Err(http_error(status, text));
        }

        parse_product(&serde_json::from_str(&text)?)
    }

    async fn submit_market_order(&self, order: &PlaceOrderRequest) -> ExchangeResult<Order> {
        let body = order_body(order);
        let (status, text) = self.send(Method::POST, ORDERS_PATH, Some(&body)).await?;

        if !status.is_success() {
            return Err(match http_error(status, text) {
                ExchangeError::Http { body, .. } => {
                    let raw = serde_json::from_str(&body).unwrap_or_else(|_| Value::String(body.clone()));
                    ExchangeError::OrderRejected { message: error_message(&raw), raw }
                }
                other => other,
            });
        }

        parse_submit_response(&serde_json::from_str(&text)?, order)
    }

    async fn get_order(&self, order_id: &str) -> ExchangeResult<Order> {
        let path: Vec<&str> = HISTORICAL_ORDERS_PATH.iter().copied().chain([order_id]).collect();
        let (status, text) = self.send(Method::GET, &path, None).await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ExchangeError::OrderNotFound { order_id: order_id.to_string() });
        }
        if !status.is_success() {
            return Err(http_error(status, text));
        }

        let raw: Value = serde_json::from_str(&text)?;
        parse_order(raw.get("order").unwrap_or(&raw))
    }
}

/// Auth, throttling and server failures mean the exchange can't be trusted
/// right now; anything else is passed through as a plain HTTP error.
fn http_error(status: StatusCode, body: String) -> ExchangeError {
    if status.is_server_error()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        ExchangeError::Unavailable(format!("HTTP {}: {}", status.as_u16(), body))
    } else {
        ExchangeError::Http { status: status.as_u16(), body }
    }
}

pub(crate) fn order_body(order: &PlaceOrderRequest) -> Value {
    let size_key = match order.denomination {
        SizeDenomination::Quote => "quote_size",
        SizeDenomination::Base => "base_size",
    };

    let mut market_ioc = serde_json::Map::new();
    market_ioc.insert(size_key.to_string(), Value::String(order.size.to_string()));

    json!({
        "client_order_id": order.client_order_id,
        "product_id": order.product_id,
        "side": order.side.as_str(),
        "order_configuration": {
            "market_market_ioc": market_ioc
        }
    })
}

pub(crate) fn parse_product(raw: &Value) -> ExchangeResult<ProductInfo> {
    let required = |key: &str| {
        decimal_field(raw, key).ok_or_else(|| ExchangeError::Malformed(format!("product missing '{}'", key)))
    };

    Ok(ProductInfo {
        product_id: string_field(raw, "product_id").unwrap_or_default(),
        base_currency: string_field(raw, "base_currency_id")
            .ok_or_else(|| ExchangeError::Malformed("product missing 'base_currency_id'".to_string()))?,
        quote_currency: string_field(raw, "quote_currency_id")
            .ok_or_else(|| ExchangeError::Malformed("product missing 'quote_currency_id'".to_string()))?,
        base_min_size: required("base_min_size")?.normalize(),
        base_increment: required("base_increment")?.normalize(),
        quote_increment: required("quote_increment")?.normalize(),
    })
}

pub(crate) fn parse_submit_response(raw: &Value, request: &PlaceOrderRequest) -> ExchangeResult<Order> {
    let success = raw.get("success").and_then(|v| v.as_bool()).unwrap_or(false);
    let order_id = raw.pointer("/success_response/order_id").and_then(|v| v.as_str());

    match (success, order_id) {
        (true, Some(order_id)) => Ok(Order {
            order_id: order_id.to_string(),
            client_order_id: raw
                .pointer("/success_response/client_order_id")
                .and_then(|v| v.as_str())
                .unwrap_or(&request.client_order_id)
                .to_string(),
            status: OrderStatus::Pending,
            average_filled_price: None,
            cancel_message: None,
            reject_message: None,
            raw: raw.clone(),
        }),
        _ => Err(ExchangeError::OrderRejected {
            message: error_message(raw),
            raw: raw.clone(),
        }),
    }
}

pub(crate) fn parse_order(raw: &Value) -> ExchangeResult<Order> {
    let order_id = string_field(raw, "order_id")
        .ok_or_else(|| ExchangeError::Malformed("order missing 'order_id'".to_string()))?;
    let status = OrderStatus::from_exchange(&string_field(raw, "status").unwrap_or_default());

    // Coinbase reports "0" until the order fills
    let average_filled_price = if status == OrderStatus::Filled {
        decimal_field(raw, "average_filled_price")
    } else {
        None
    };

    Ok(Order {
        order_id,
        client_order_id: string_field(raw, "client_order_id").unwrap_or_default(),
        status,
        average_filled_price,
        cancel_message: string_field(raw, "cancel_message").filter(|s| !s.is_empty()),
        reject_message: string_field(raw, "reject_message").filter(|s| !s.is_empty()),
        raw: raw.clone(),
    })
}

fn error_message(raw: &Value) -> String {
    ["/error_response/message", "/error_response/error", "/failure_reason", "/message", "/error"]
        .iter()
        .filter_map(|p| raw.pointer(p).and_then(|v| v.as_str()))
        .find(|s| !s.is_empty())
        .unwrap_or("order rejected without a message")
        .to_string()
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn decimal_field(raw: &Value, key: &str) -> Option<Decimal> {
    match raw.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::types::Side;
    use rust_decimal_macros::dec;

    fn request() -> PlaceOrderRequest {
        PlaceOrderRequest {
            product_id: "BTC-USD".to_string(),
            side: Side::Buy,
            denomination: SizeDenomination::Quote,
            size: dec!(14.00),
            client_order_id: "cid-1".to_string(),
        }
    }

    #[test]
    fn test_order_body_quote_size() {
        let body = order_body(&request());
        assert_eq!(body["side"], "BUY");
        assert_eq!(body["client_order_id"], "cid-1");
        assert_eq!(body["order_configuration"]["market_market_ioc"]["quote_size"], "14.00");
        assert!(body["order_configuration"]["market_market_ioc"].get("base_size").is_none());
    }

    #[test]
    fn test_order_body_base_size() {
        let mut req = request();
        req.side = Side::Sell;
        req.denomination = SizeDenomination::Base;
        req.size = dec!(0.00125);
        let body = order_body(&req);
        assert_eq!(body["side"], "SELL");
        assert_eq!(body["order_configuration"]["market_market_ioc"]["base_size"], "0.00125");
    }

    #[test]
    fn test_parse_product() {
        let raw = json!({
            "product_id": "BTC-USD",
            "base_currency_id": "BTC",
            "quote_currency_id": "USD",
            "base_min_size": "0.00000001",
            "base_increment": "0.00000001",
            "quote_increment": "0.01000000"
        });
        let product = parse_product(&raw).unwrap();
        assert_eq!(product.base_currency, "BTC");
        assert_eq!(product.quote_currency, "USD");
        assert_eq!(product.quote_increment, dec!(0.01));
        assert_eq!(product.quote_increment.scale(), 2);
    }

    #[test]
    fn test_parse_product_missing_field() {
        let raw = json!({"product_id": "BTC-USD", "base_currency_id": "BTC"});
        assert!(matches!(parse_product(&raw), Err(ExchangeError::Malformed(_))));
    }

    #[test]
    fn test_parse_submit_success() {
        let raw = json!({
            "success": true,
            "success_response": {"order_id": "abc", "client_order_id": "cid-1", "product_id": "BTC-USD", "side": "BUY"}
        });
        let order = parse_submit_response(&raw, &request()).unwrap();
        assert_eq!(order.order_id, "abc");
        assert_eq!(order.client_order_id, "cid-1");
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_parse_submit_failure_carries_message() {
        let raw = json!({
            "success": false,
            "error_response": {"error": "INSUFFICIENT_FUND", "message": "Insufficient balance in source account"}
        });
        match parse_submit_response(&raw, &request()) {
            Err(ExchangeError::OrderRejected { message, raw: payload }) => {
                assert_eq!(message, "Insufficient balance in source account");
                assert_eq!(payload, raw);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_order_filled() {
        let raw = json!({
            "order_id": "abc",
            "client_order_id": "cid-1",
            "status": "FILLED",
            "average_filled_price": "50000.125",
            "cancel_message": "",
            "reject_message": ""
        });
        let order = parse_order(&raw).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.average_filled_price, Some(dec!(50000.125)));
        assert!(!order.has_cancel_or_reject_message());
    }

    #[test]
    fn test_parse_order_open_has_no_price() {
        let raw = json!({"order_id": "abc", "status": "OPEN", "average_filled_price": "0"});
        let order = parse_order(&raw).unwrap();
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.average_filled_price, None);
    }

    #[test]
    fn test_parse_order_unknown_status() {
        let raw = json!({"order_id": "abc", "status": "UNKNOWN_ORDER_STATUS"});
        assert_eq!(parse_order(&raw).unwrap().status, OrderStatus::Unknown);
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let base = Url::parse("https://api.coinbase.com").unwrap();

        let path: Vec<&str> = PRODUCTS_PATH.iter().copied().chain(["BTC-USD"]).collect();
        let url = endpoint(&base, &path).unwrap();
        assert_eq!(url.as_str(), "https://api.coinbase.com/api/v3/brokerage/products/BTC-USD");

        let path: Vec<&str> = HISTORICAL_ORDERS_PATH
            .iter()
            .copied()
            .chain(["../../accounts?limit=1#x"])
            .collect();
        let url = endpoint(&base, &path).unwrap();
        assert_eq!(url.path(), "/api/v3/brokerage/orders/historical/..%2F..%2Faccounts%3Flimit=1%23x");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = Url::parse("http://localhost:8080/proxy/").unwrap();
        let url = endpoint(&base, ORDERS_PATH).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/proxy/api/v3/brokerage/orders");
    }

    #[test]
    fn test_invalid_base_url_is_configuration_error() {
        let result = CoinbaseExchange::new(CoinbaseConfig {
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            base_url: "not a url".to_string(),
        });
        assert!(matches!(result, Err(ExchangeError::Configuration(_))));
    }

    #[test]
    fn test_http_error_classification() {
        assert!(matches!(
            http_error(StatusCode::UNAUTHORIZED, "nope".to_string()),
            ExchangeError::Unavailable(_)
        ));
        assert!(matches!(
            http_error(StatusCode::BAD_GATEWAY, String::new()),
            ExchangeError::Unavailable(_)
        ));
        assert!(matches!(
            http_error(StatusCode::BAD_REQUEST, "bad".to_string()),
            ExchangeError::Http { status: 400, .. }
        ));
    }
}
