//! Unit tests for order request validation and sizing.

#[cfg(test)]
mod request_tests {
    use crate::error::RunError;
    use crate::exchange::types::{ProductInfo, Side, SizeDenomination};
    use crate::services::request::*;
    use crate::testing::btc_usd_product;
    use rust_decimal_macros::dec;

    fn validation_message(result: Result<impl std::fmt::Debug, RunError>) -> String {
        match result {
            Err(RunError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_build_valid_request() {
        let req = OrderRequest::build("BTC-USD", "BUY", "4.00", "USD").unwrap();
        assert_eq!(req.market_name, "BTC-USD");
        assert_eq!(req.side, Side::Buy);
        assert_eq!(req.amount, dec!(4.00));
        assert_eq!(req.amount_currency, "USD");
        assert_eq!(req.describe(), "BTC-USD BUY order of 4.00 USD");
    }

    #[test]
    fn test_build_rejects_bad_input() {
        assert!(validation_message(OrderRequest::build("", "BUY", "4", "USD")).contains("market"));
        assert!(validation_message(OrderRequest::build("BTC-USD", "HOLD", "4", "USD")).contains("HOLD"));
        assert!(validation_message(OrderRequest::build("BTC-USD", "BUY", "four", "USD")).contains("four"));
        assert!(validation_message(OrderRequest::build("BTC-USD", "BUY", "0", "USD")).contains("positive"));
        assert!(validation_message(OrderRequest::build("BTC-USD", "BUY", "-1", "USD")).contains("positive"));
        assert!(validation_message(OrderRequest::build("BTC-USD", "BUY", "4", " ")).contains("currency"));
    }

    #[test]
    fn test_side_is_case_sensitive() {
        assert!(OrderRequest::build("BTC-USD", "buy", "4", "USD").is_err());
        assert_eq!(
            OrderRequest::build("BTC-USD", "SELL", "4", "USD").unwrap().side,
            Side::Sell
        );
    }

    #[test]
    fn test_denomination_follows_currency() {
        let product = btc_usd_product();
        let quote = OrderRequest::build("BTC-USD", "BUY", "14", "USD").unwrap();
        let base = OrderRequest::build("BTC-USD", "SELL", "0.001", "BTC").unwrap();

        assert_eq!(quote.denomination(&product).unwrap(), SizeDenomination::Quote);
        assert_eq!(base.denomination(&product).unwrap(), SizeDenomination::Base);
    }

    #[test]
    fn test_currency_outside_market_is_rejected() {
        let req = OrderRequest::build("BTC-USD", "BUY", "14", "EUR").unwrap();
        let msg = validation_message(req.place_order(&btc_usd_product(), "c".to_string()));
        assert_eq!(msg, "amount_currency EUR not in market BTC-USD");
    }

    #[test]
    fn test_quote_size_truncates_to_increment() {
        let req = OrderRequest::build("BTC-USD", "BUY", "14.999", "USD").unwrap();
        let placed = req.place_order(&btc_usd_product(), "c-1".to_string()).unwrap();

        assert_eq!(placed.size, dec!(14.99));
        assert_eq!(placed.size.to_string(), "14.99");
        assert_eq!(placed.denomination, SizeDenomination::Quote);
        assert_eq!(placed.client_order_id, "c-1");
        assert_eq!(placed.product_id, "BTC-USD");
    }

    #[test]
    fn test_base_size_truncates_to_increment() {
        let req = OrderRequest::build("BTC-USD", "SELL", "0.123456789", "BTC").unwrap();
        let placed = req.place_order(&btc_usd_product(), "c-1".to_string()).unwrap();
        assert_eq!(placed.size, dec!(0.12345678));
        assert_eq!(placed.side, Side::Sell);
    }

    #[test]
    fn test_amount_below_increment_is_rejected() {
        let req = OrderRequest::build("BTC-USD", "BUY", "0.004", "USD").unwrap();
        let msg = validation_message(req.place_order(&btc_usd_product(), "c".to_string()));
        assert!(msg.contains("below the increment"));
    }

    #[test]
    fn test_amount_too_large_for_increment_is_rejected() {
        let req = OrderRequest::build("BTC-USD", "BUY", "1000000000000000000000000000", "USD").unwrap();
        let msg = validation_message(req.place_order(&btc_usd_product(), "c".to_string()));
        assert!(msg.contains("too large"));

        let req = OrderRequest::build("BTC-USD", "SELL", "79228162514264337593543950335", "BTC").unwrap();
        assert!(matches!(
            req.place_order(&btc_usd_product(), "c".to_string()),
            Err(RunError::Validation(_))
        ));
    }

    #[test]
    fn test_base_size_below_minimum_is_rejected() {
        let product = ProductInfo {
            base_min_size: dec!(0.001),
            ..btc_usd_product()
        };
        let req = OrderRequest::build("BTC-USD", "SELL", "0.0005", "BTC").unwrap();
        let msg = validation_message(req.place_order(&product, "c".to_string()));
        assert!(msg.contains("market minimum"));
    }

    #[test]
    fn test_client_order_ids_are_unique() {
        let a = generate_client_order_id();
        let b = generate_client_order_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
