//! Product grid (product cards inside a listing block).

use harvester_core::{ExtractError, Node, Patch, Value};

/// Read every `.product` card under the first node matching `grid`.
///
/// Returns an empty list when the grid is absent.
pub fn read_product_grid(root: &Node, grid: &str) -> Result<Value, ExtractError> {
    let Some(grid) = root.select_first(grid)? else {
        return Ok(Value::list(Vec::new()));
    };
    let cards = grid
        .select_all(".product")?
        .into_iter()
        .map(read_card)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::list(cards))
}

fn read_card(card: &Node) -> Result<Value, ExtractError> {
    let mut out = Patch::new();
    let link = card.select_first("a.image")?;
    let img = match link {
        Some(link) => link.select_first("img")?,
        None => None,
    };

    out.insert("url", attr_value(link, "href"));
    out.insert("img", img.and_then(|i| i.attr("src")).unwrap_or_default());
    out.insert(
        "imgBig",
        img.and_then(|i| i.attr("data-micro-image")).unwrap_or_default(),
    );
    out.insert("name", text_value(card, r#"[data-testid="productCardName"]"#)?);

    let flags = card.select_all("span.flag")?.into_iter().map(|flag| {
        if flag.has_class("flag-discount") {
            Value::from("flag-discount")
        } else {
            let class = flag.attr("class").unwrap_or_default();
            Value::from(class.replacen("flag ", "", 1).trim())
        }
    });
    out.insert("flags", Value::list(flags));

    out.insert("finalPrice", text_value(card, ".price-final strong")?);
    out.insert("standardPrice", text_value(card, ".price-standard span")?);
    out.insert("priceSave", text_value(card, ".price-save")?);
    out.insert("additionalPrice", text_value(card, ".price-additional")?);

    let rating = card
        .select_first("[data-micro-rating-value]")?
        .and_then(|n| n.attr("data-micro-rating-value"))
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);
    out.insert("rating", rating);

    out.insert("availability", text_value(card, ".availability")?);
    out.insert(
        "availabilityTooltip",
        card.select_first(".availability .show-tooltip")?
            .and_then(|n| n.attr("data-original-title"))
            .unwrap_or_default(),
    );
    out.insert("code", text_value(card, r#".p-code span[data-micro="sku"]"#)?);
    out.insert("productId", attr_value(Some(card), "data-micro-product-id"));
    out.insert(
        "priceId",
        card.select_first(r#"input[name="priceId"]"#)?
            .and_then(|n| n.value.as_deref())
            .map(Value::from)
            .unwrap_or_default(),
    );

    Ok(Value::record(out))
}

/// Trimmed text of the first match, `Undefined` when absent.
pub(crate) fn text_value(root: &Node, css: &str) -> Result<Value, ExtractError> {
    Ok(root
        .select_first(css)?
        .map(|n| Value::from(n.text()))
        .unwrap_or_default())
}

fn attr_value(node: Option<&Node>, name: &str) -> Value {
    node.and_then(|n| n.attr(name))
        .map(Value::from)
        .unwrap_or_default()
}
