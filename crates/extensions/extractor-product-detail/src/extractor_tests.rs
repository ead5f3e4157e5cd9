use super::*;
use serde_json::json;

fn card(id: &str, name: &str, flags: &[&str]) -> Node {
    let mut node = Node::new("div")
        .with_class("product")
        .with_attr("data-micro-product-id", id)
        .with_child(
            Node::new("a")
                .with_class("image")
                .with_attr("href", format!("/p/{id}"))
                .with_child(
                    Node::new("img")
                        .with_attr("src", format!("/img/{id}.jpg"))
                        .with_attr("data-micro-image", format!("/img/{id}-big.jpg")),
                ),
        )
        .with_child(
            Node::new("span")
                .with_attr("data-testid", "productCardName")
                .with_text(format!(" {name} ")),
        )
        .with_child(
            Node::new("div")
                .with_class("price-final")
                .with_child(Node::new("strong").with_text("199 Kč")),
        )
        .with_child(
            Node::new("span")
                .with_attr("data-micro-rating-value", "4.5"),
        )
        .with_child(
            Node::new("div")
                .with_class("availability")
                .with_child(
                    Node::new("span")
                        .with_class("show-tooltip")
                        .with_attr("data-original-title", "Ships in 24h")
                        .with_text("In stock"),
                ),
        )
        .with_child(
            Node::new("div").with_class("p-code").with_child(
                Node::new("span")
                    .with_attr("data-micro", "sku")
                    .with_text(format!("SKU-{id}")),
            ),
        )
        .with_child(Node::new("input").with_attr("name", "priceId").with_value("77"));
    for flag in flags {
        node = node.with_child(Node::new("span").with_attr("class", format!("flag {flag}")));
    }
    node
}

fn param_row(label: &str, value: &str) -> Node {
    Node::new("tr")
        .with_child(
            Node::new("th").with_child(
                Node::new("span")
                    .with_class("row-header-label")
                    .with_text(label),
            ),
        )
        .with_child(Node::new("td").with_text(value))
}

fn product_page(amount: &str) -> Node {
    Node::new("body")
        .with_child(
            Node::new("div")
                .with_class("p-final-price-wrapper")
                .with_child(
                    Node::new("span")
                        .with_class("price-standard")
                        .with_child(Node::new("span").with_text("1 299 Kč")),
                )
                .with_child(Node::new("span").with_class("price-save").with_text("-23 %"))
                .with_child(Node::new("strong").with_class("price-final").with_text("999 Kč")),
        )
        .with_child(
            Node::new("div")
                .with_attr("data-testid", "deliveryTime")
                .with_child(
                    Node::new("span")
                        .with_class("show-tooltip")
                        .with_text(" Tomorrow "),
                ),
        )
        .with_child(
            Node::new("form").with_child(
                Node::new("input")
                    .with_attr("name", "amount")
                    .with_attr("data-testid", "cartAmount")
                    .with_value(amount),
            ),
        )
        .with_child(
            Node::new("div")
                .with_class("p-short-description")
                .with_text(" Hand-made ")
                .with_child(Node::new("strong").with_text("stoneware"))
                .with_child(Node::new("br")),
        )
        .with_child(
            Node::new("div")
                .with_class("products-related")
                .with_child(card("11", "Saucer", &["flag-discount", "flag-new"]))
                .with_child(card("12", "Spoon", &["flag-tip"])),
        )
        .with_child(
            Node::new("table").with_class("detail-parameters").with_child(
                Node::new("tbody")
                    .with_child(param_row("Materiál:", "kamenina"))
                    .with_child(param_row(
                        "Barva:",
                        "modrá,          bílá,          modrá",
                    ))
                    .with_child(param_row("Rozměry:", "10 cm, 12 cm"))
                    .with_child(param_row(":", "ignored")),
            ),
        )
}

fn extract(root: &Node) -> (Patch, ExtractionContext) {
    let mut cx = ExtractionContext::new(8);
    let patch = ProductDetailExtractor::new().extract(root, &mut cx).unwrap();
    (patch, cx)
}

fn str_of<'a>(patch: &'a Patch, key: &str) -> Option<&'a str> {
    patch.get(key).and_then(Value::as_str)
}

#[test]
fn test_kind() {
    assert_eq!(ProductDetailExtractor.kind(), "productDetail");
}

#[test]
fn test_prices_delivery_and_description() {
    let (patch, _) = extract(&product_page("2"));
    assert_eq!(str_of(&patch, "standardPrice"), Some("1 299 Kč"));
    assert_eq!(str_of(&patch, "priceSave"), Some("-23 %"));
    assert_eq!(str_of(&patch, "finalPrice"), Some("999 Kč"));
    assert!(patch.get("additionalPrice").unwrap().is_undefined());
    assert_eq!(str_of(&patch, "deliveryEstimate"), Some("Tomorrow"));
    assert_eq!(
        str_of(&patch, "shortDescription"),
        Some("Hand-made <strong>stoneware</strong><br>")
    );
    assert_eq!(patch.get("cartAmount").and_then(Value::as_f64), Some(2.0));
}

#[test]
fn test_cart_amount_parsing() {
    for (raw, expected) in [("3 ks", 3.0), ("", 0.0), ("abc", 0.0), (" 12", 12.0), ("-1", -1.0)] {
        let (patch, _) = extract(&product_page(raw));
        assert_eq!(patch.get("cartAmount").and_then(Value::as_f64), Some(expected), "{raw:?}");
    }
}

#[test]
fn test_watches_cart_amount_input() {
    let (_, cx) = extract(&product_page("1"));
    assert_eq!(cx.watched().len(), 1);
    assert_eq!(
        cx.watched()[0].as_str(),
        r#"input[name="amount"][data-testid="cartAmount"]"#
    );
}

#[test]
fn test_parameters_and_split_values() {
    let (patch, _) = extract(&product_page("1"));
    assert_eq!(str_of(&patch, "parametr_material"), Some("kamenina"));
    assert_eq!(str_of(&patch, "parametr_rozmery"), Some("10 cm, 12 cm"));
    assert!(!patch.contains_key("parametr_rozmeryValues"));
    assert!(!patch.contains_key("parametr_"));

    let colors: Vec<&str> = patch
        .get("parametr_barvaValues")
        .and_then(Value::as_list)
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(colors, vec!["modrá", "bílá"]);
}

#[test]
fn test_product_grids() {
    let (patch, _) = extract(&product_page("1"));
    let related = patch.get("relatedProducts").and_then(Value::as_list).unwrap();
    assert_eq!(related.len(), 2);
    assert!(patch.get("alternativeProducts").and_then(Value::as_list).unwrap().is_empty());

    let first = related[0].to_json();
    assert_eq!(
        first,
        json!({
            "url": "/p/11",
            "img": "/img/11.jpg",
            "imgBig": "/img/11-big.jpg",
            "name": "Saucer",
            "flags": ["flag-discount", "flag-new"],
            "finalPrice": "199 Kč",
            "standardPrice": null,
            "priceSave": null,
            "additionalPrice": null,
            "rating": 4.5,
            "availability": "In stock",
            "availabilityTooltip": "Ships in 24h",
            "code": "SKU-11",
            "productId": "11",
            "priceId": "77"
        })
    );
}

#[test]
fn test_missing_sections() {
    let (patch, cx) = extract(&Node::new("body"));
    assert!(!patch.contains_key("finalPrice"));
    assert!(patch.get("deliveryEstimate").unwrap().is_undefined());
    assert!(patch.get("shortDescription").unwrap().is_undefined());
    assert_eq!(patch.get("cartAmount").and_then(Value::as_f64), Some(0.0));
    assert!(patch.get("relatedProducts").and_then(Value::as_list).unwrap().is_empty());
    assert_eq!(cx.watched().len(), 1);
}

#[test]
fn test_leading_integer() {
    assert_eq!(leading_integer("42"), 42);
    assert_eq!(leading_integer("+7x"), 7);
    assert_eq!(leading_integer("x7"), 0);
    assert_eq!(leading_integer("-"), 0);
}
