//! Unit tests for alert subjects and bodies.

#[cfg(test)]
mod reporting_tests {
    use crate::exchange::types::{Order, OrderStatus};
    use crate::services::reporting::*;
    use crate::services::request::OrderRequest;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request() -> OrderRequest {
        OrderRequest::build("BTC-USD", "BUY", "14", "USD").unwrap()
    }

    fn order(status: OrderStatus) -> Order {
        Order {
            order_id: "o-1".to_string(),
            client_order_id: "c-1".to_string(),
            status,
            average_filled_price: None,
            cancel_message: None,
            reject_message: None,
            raw: json!({"order_id": "o-1", "status": status.as_str()}),
        }
    }

    #[test]
    fn test_submission_rejected_subject() {
        let raw = json!({"success": false, "error_response": {"message": "Insufficient balance"}});
        let event = submission_rejected(&request(), &raw);

        assert_eq!(event.subject, "Could not place BTC-USD BUY order");
        assert_eq!(event.body, raw);
    }

    #[test]
    fn test_order_stuck_subject_and_body() {
        let event = order_stuck(&request(), &order(OrderStatus::Open), None);
        assert_eq!(event.subject, "BTC-USD BUY order of 14 USD OPEN/UNFILLED");
        assert_eq!(event.body["status"], "OPEN");
    }

    #[test]
    fn test_order_stuck_with_error_wraps_last_seen() {
        let event = order_stuck(&request(), &order(OrderStatus::Pending), Some("Exchange unavailable: timeout"));
        assert_eq!(event.body["error"], "Exchange unavailable: timeout");
        assert_eq!(event.body["order"]["order_id"], "o-1");
    }

    #[test]
    fn test_order_cancelled_subject() {
        let event = order_cancelled(&request(), &order(OrderStatus::Cancelled));
        assert_eq!(event.subject, "BTC-USD BUY order of 14 USD CANCELLED/REJECTED");
        assert_eq!(event.body["status"], "CANCELLED");
    }

    #[test]
    fn test_order_filled_subject_contains_price() {
        let event = order_filled(&request(), &order(OrderStatus::Filled), Some(dec!(50000.13)), "USD");

        assert_eq!(event.subject, "BTC-USD BUY order of 14 USD FILLED @ 50000.13 USD");
        assert_eq!(event.body["market_name"], "BTC-USD");
        assert_eq!(event.body["order_side"], "BUY");
        assert_eq!(event.body["amount"], "14");
        assert_eq!(event.body["amount_currency"], "USD");
        assert_eq!(event.body["status"], "FILLED");
        assert_eq!(event.body["average_filled_price"], "50000.13");
    }

    #[test]
    fn test_order_filled_without_price() {
        let event = order_filled(&request(), &order(OrderStatus::Filled), None, "USD");
        assert!(event.subject.ends_with("@ unknown USD"));
        assert!(event.body["average_filled_price"].is_null());
    }
}
