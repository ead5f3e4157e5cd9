use super::*;
use serde_json::json;

fn reader() -> LogReader {
    LogReader::new("shoptet")
}

#[test]
fn test_non_matching_records() {
    let reader = reader();
    assert!(reader.extract(&json!("gtm.js")).is_none());
    assert!(reader.extract(&json!({"event": "gtm.dom"})).is_none());
    assert!(reader.extract(&json!({"shoptet": "not an object"})).is_none());
}

#[test]
fn test_flatten_top_level_and_currency() {
    let patch = reader()
        .extract(&json!({
            "shoptet": {
                "pageType": "productDetail",
                "currency": "CZK",
                "language": "cs",
                "projectId": 4321,
                "traffic_type": "direct",
                "currencyInfo": {
                    "decimalSeparator": ",",
                    "exchangeRate": "1",
                    "priceDecimalPlaces": 2,
                    "symbol": "Kč"
                }
            }
        }))
        .unwrap();

    assert_eq!(patch.get(CONTEXT_KIND_KEY).and_then(Value::as_str), Some("productDetail"));
    assert_eq!(patch.get("trafficType").and_then(Value::as_str), Some("direct"));
    assert_eq!(patch.get("projectId").and_then(Value::as_f64), Some(4321.0));
    assert_eq!(patch.get("currencyInfoExchangeRate").and_then(Value::as_f64), Some(1.0));
    assert_eq!(patch.get("currencyInfoPriceDecimalPlaces").and_then(Value::as_f64), Some(2.0));
    assert_eq!(patch.get("currencyInfoSymbol").and_then(Value::as_str), Some("Kč"));
}

#[test]
fn test_missing_sections_are_omitted() {
    let patch = reader()
        .extract(&json!({"shoptet": {"pageType": "homepage"}}))
        .unwrap();

    assert_eq!(patch.len(), 1);
    assert!(!patch.contains_key("cartInfoId"));
    assert!(!patch.contains_key("cartInfoDiscountCoupon"));
    assert!(!patch.contains_key(CART_ITEMS_KEY));
    assert!(!patch.contains_key("customerEmail"));
}

#[test]
fn test_cart_info_flattening() {
    let patch = reader()
        .extract(&json!({
            "shoptet": {
                "cartInfo": {
                    "id": "c-1",
                    "freeShipping": false,
                    "leftToFreeGift": {"priceLeft": "250.5", "formattedPrice": "250,50 Kč"},
                    "leftToFreeShipping": {"priceLeft": 0},
                    "getNoBillingShippingPrice": {"withoutVat": 100, "withVat": "121", "vat": "21"},
                    "taxMode": "ORDINARY",
                    "cartItems": [
                        {"code": "A1", "quantity": "2", "priceWithVat": 121, "name": "Mug", "weight": "0,35"},
                        {"code": "B2", "quantity": "lots"}
                    ]
                }
            }
        }))
        .unwrap();

    assert_eq!(patch.get("cartInfoId").and_then(Value::as_str), Some("c-1"));
    assert_eq!(patch.get("cartInfoFreeShipping").and_then(Value::as_bool), Some(false));
    assert_eq!(patch.get("cartInfoLeftToFreeGift").and_then(Value::as_f64), Some(250.5));
    assert_eq!(
        patch.get("cartInfoLeftToFreeGiftFormatted").and_then(Value::as_str),
        Some("250,50 Kč")
    );
    assert_eq!(patch.get("cartInfoLeftToFreeShipping").and_then(Value::as_f64), Some(0.0));
    assert!(!patch.contains_key("cartInfoLeftToFreeShippingFormatted"));
    assert_eq!(
        patch.get("cartInfoNoBillingShippingPriceWithVat").and_then(Value::as_f64),
        Some(121.0)
    );
    assert_eq!(patch.get("cartInfoDiscountCoupon").and_then(Value::as_list).map(<[Value]>::len), Some(0));

    let items = patch.get(CART_ITEMS_KEY).and_then(Value::as_list).unwrap();
    assert_eq!(items.len(), 2);
    let first = items[0].as_record().unwrap();
    assert_eq!(first["code"].as_str(), Some("A1"));
    assert_eq!(first["quantity"].as_f64(), Some(2.0));
    assert_eq!(first["weight"].as_f64(), Some(0.35));
    assert!(!first.contains_key("guid"));

    let second = items[1].as_record().unwrap();
    assert!(second["quantity"].is_undefined());
}

#[test]
fn test_customer_flattening() {
    let patch = reader()
        .extract(&json!({
            "shoptet": {
                "customer": {
                    "guid": "g-1",
                    "email": "a@b.cz",
                    "priceRatio": "0.9",
                    "groupId": 3,
                    "registered": true
                }
            }
        }))
        .unwrap();

    assert_eq!(patch.get("customerEmail").and_then(Value::as_str), Some("a@b.cz"));
    assert_eq!(patch.get("customerPriceRatio").and_then(Value::as_f64), Some(0.9));
    assert_eq!(patch.get("customerGroupId").and_then(Value::as_f64), Some(3.0));
    assert_eq!(patch.get("customerRegistered").and_then(Value::as_bool), Some(true));
    assert!(!patch.contains_key("customerMainAccount"));
}

#[test]
fn test_scan_keeps_last_match() {
    let records = vec![
        json!({"shoptet": {"pageType": "category", "currency": "CZK"}}),
        json!({"event": "noise"}),
        json!({"shoptet": {"pageType": "productDetail"}}),
    ];
    let patch = reader().scan(&records).unwrap();
    assert_eq!(patch.get(CONTEXT_KIND_KEY).and_then(Value::as_str), Some("productDetail"));
    assert_eq!(patch.get("currency").and_then(Value::as_str), Some("CZK"));
}

#[test]
fn test_scan_without_match() {
    let records = vec![json!({"event": "gtm.js"})];
    assert!(reader().scan(&records).is_none());
}

#[test]
fn test_coerce_number() {
    assert_eq!(coerce_number(&json!(5)), Value::Number(5.0));
    assert_eq!(coerce_number(&json!(" 12.5 ")), Value::Number(12.5));
    assert_eq!(coerce_number(&json!("12,5")), Value::Number(12.5));
    assert!(coerce_number(&json!("1,234.5")).is_undefined());
    assert!(coerce_number(&json!("1,2,3")).is_undefined());
    assert!(coerce_number(&json!("")).is_undefined());
    assert!(coerce_number(&json!("NaN")).is_undefined());
    assert!(coerce_number(&json!(true)).is_undefined());
    assert!(coerce_number(&json!(null)).is_undefined());
}
