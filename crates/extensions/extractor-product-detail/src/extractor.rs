//! Product detail page extractor.

use harvester_core::{slugify, ExtractError, ExtractionContext, Extractor, Node, Patch, Value};
use tracing::debug;

use crate::grid::{read_product_grid, text_value};

/// Context kind handled by [`ProductDetailExtractor`].
pub const PRODUCT_DETAIL_KIND: &str = "productDetail";

const PRICE_WRAPPER: &str = ".p-final-price-wrapper";
const CART_AMOUNT: &str = r#"input[name="amount"][data-testid="cartAmount"]"#;
const PARAMETERS: &str = ".detail-parameters";

/// Reads a product detail page.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProductDetailExtractor;

impl ProductDetailExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for ProductDetailExtractor {
    fn kind(&self) -> &str {
        PRODUCT_DETAIL_KIND
    }

    fn extract(&self, root: &Node, cx: &mut ExtractionContext) -> Result<Patch, ExtractError> {
        let mut out = Patch::new();

        if let Some(wrapper) = root.select_first(PRICE_WRAPPER)? {
            out.insert("standardPrice", text_value(wrapper, ".price-standard span")?);
            out.insert("priceSave", text_value(wrapper, ".price-save")?);
            out.insert("finalPrice", text_value(wrapper, ".price-final")?);
            out.insert("additionalPrice", text_value(wrapper, ".price-additional")?);
        }

        out.insert(
            "deliveryEstimate",
            text_value(root, r#"[data-testid="deliveryTime"] .show-tooltip"#)?,
        );

        cx.watch_control(CART_AMOUNT)?;
        let amount = root
            .select_first(CART_AMOUNT)?
            .and_then(|input| input.value.as_deref())
            .map(leading_integer)
            .unwrap_or(0);
        out.insert("cartAmount", amount);

        out.insert(
            "shortDescription",
            root.select_first(".p-short-description")?
                .map(|n| Value::from(n.inner_html().trim()))
                .unwrap_or_default(),
        );
        out.insert("relatedProducts", read_product_grid(root, ".products-related")?);
        out.insert(
            "alternativeProducts",
            read_product_grid(root, ".products-alternative")?,
        );

        let params = read_parameters(root, cx, &mut out)?;
        debug!(keys = out.len(), params, "Product detail extracted");
        Ok(out)
    }
}

/// Parameter table rows become `parametr_<slug>` keys. Values the splitter
/// breaks into several parts are also listed under `<key>Values`.
fn read_parameters(
    root: &Node,
    cx: &ExtractionContext,
    out: &mut Patch,
) -> Result<usize, ExtractError> {
    let Some(table) = root.select_first(PARAMETERS)? else {
        return Ok(0);
    };

    let mut count = 0;
    for row in table.select_all("tr")? {
        let Some(label) = row.select_first("th .row-header-label")? else {
            continue;
        };
        let header = label.text().replacen(':', "", 1);
        let header = header.trim();
        if header.is_empty() {
            continue;
        }

        let key = slugify(&format!("parametr_{header}"));
        let value = row.select_first("td")?.map(Node::text);
        if let Some(text) = &value {
            let parts = cx.split_values(text);
            if parts.len() > 1 {
                out.insert(
                    format!("{key}Values"),
                    Value::list(parts.into_iter().map(Value::from)),
                );
            }
        }
        out.insert(key, value.map(Value::from).unwrap_or_default());
        count += 1;
    }
    Ok(count)
}

/// Integer prefix of `text`, 0 when there is none.
fn leading_integer(text: &str) -> i64 {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod tests;
