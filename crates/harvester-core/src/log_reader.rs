//! Log reader: turns namespaced log records into flat patches.
//!
//! A record matches when it is an object carrying an object under the
//! configured namespace key. Nested sections of that object are flattened
//! with fixed prefixes (`cartInfo.leftToFreeGift.priceLeft` becomes
//! `cartInfoLeftToFreeGift`); the cart item list stays a list of flat
//! records.

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::value::{Patch, Value};

/// Snapshot key holding the context kind.
pub const CONTEXT_KIND_KEY: &str = "pageType";

/// Snapshot key holding the cart item list.
pub const CART_ITEMS_KEY: &str = "cartItems";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coerce {
    Raw,
    Number,
}

struct FieldRule {
    path: &'static str,
    key: &'static str,
    coerce: Coerce,
}

const fn raw(path: &'static str, key: &'static str) -> FieldRule {
    FieldRule {
        path,
        key,
        coerce: Coerce::Raw,
    }
}

const fn num(path: &'static str, key: &'static str) -> FieldRule {
    FieldRule {
        path,
        key,
        coerce: Coerce::Number,
    }
}

struct SectionRule {
    section: &'static str,
    fields: &'static [FieldRule],
}

const TOP_LEVEL: &[FieldRule] = &[
    raw("pageType", CONTEXT_KIND_KEY),
    raw("currency", "currency"),
    raw("language", "language"),
    raw("projectId", "projectId"),
    raw("traffic_type", "trafficType"),
];

const SECTIONS: &[SectionRule] = &[
    SectionRule {
        section: "currencyInfo",
        fields: &[
            raw("decimalSeparator", "currencyInfoDecimalSeparator"),
            num("exchangeRate", "currencyInfoExchangeRate"),
            num("priceDecimalPlaces", "currencyInfoPriceDecimalPlaces"),
            raw("symbol", "currencyInfoSymbol"),
        ],
    },
    SectionRule {
        section: "customer",
        fields: &[
            raw("guid", "customerGuid"),
            raw("email", "customerEmail"),
            raw("fullName", "customerFullName"),
            num("priceRatio", "customerPriceRatio"),
            num("priceListId", "customerPriceListId"),
            num("groupId", "customerGroupId"),
            raw("registered", "customerRegistered"),
            raw("mainAccount", "customerMainAccount"),
        ],
    },
    SectionRule {
        section: "cartInfo",
        fields: &[
            raw("id", "cartInfoId"),
            raw("freeShipping", "cartInfoFreeShipping"),
            num("leftToFreeGift.priceLeft", "cartInfoLeftToFreeGift"),
            raw("leftToFreeGift.formattedPrice", "cartInfoLeftToFreeGiftFormatted"),
            raw("freeGift", "cartInfoFreeGift"),
            num("leftToFreeShipping.priceLeft", "cartInfoLeftToFreeShipping"),
            raw(
                "leftToFreeShipping.formattedPrice",
                "cartInfoLeftToFreeShippingFormatted",
            ),
            num(
                "getNoBillingShippingPrice.withoutVat",
                "cartInfoNoBillingShippingPriceWithoutVat",
            ),
            num(
                "getNoBillingShippingPrice.withVat",
                "cartInfoNoBillingShippingPriceWithVat",
            ),
            num("getNoBillingShippingPrice.vat", "cartInfoNoBillingShippingPriceVat"),
            raw("taxMode", "cartInfoTaxMode"),
        ],
    },
];

const CART_ITEM_FIELDS: &[FieldRule] = &[
    raw("code", "code"),
    raw("guid", "guid"),
    raw("priceId", "priceId"),
    num("quantity", "quantity"),
    num("priceWithVat", "priceWithVat"),
    num("priceWithoutDiscount", "priceWithoutDiscount"),
    raw("itemId", "itemId"),
    raw("name", "name"),
    num("weight", "weight"),
];

/// Extracts patches from append-log records.
#[derive(Debug, Clone)]
pub struct LogReader {
    namespace: String,
}

impl LogReader {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The namespaced object of `record`, if the record matches.
    pub fn matches<'a>(&self, record: &'a JsonValue) -> Option<&'a Map<String, JsonValue>> {
        record.as_object()?.get(&self.namespace)?.as_object()
    }

    /// Patch for a single record, `None` if it does not match.
    pub fn extract(&self, record: &JsonValue) -> Option<Patch> {
        self.matches(record).map(flatten)
    }

    /// Combined patch of every matching record, in order.
    ///
    /// Later records override earlier ones key by key. `None` when nothing
    /// matched.
    pub fn scan<'a, I>(&self, records: I) -> Option<Patch>
    where
        I: IntoIterator<Item = &'a JsonValue>,
    {
        let mut combined: Option<Patch> = None;
        let mut matched = 0usize;
        for patch in records.into_iter().filter_map(|r| self.extract(r)) {
            matched += 1;
            combined.get_or_insert_with(Patch::new).overlay(patch);
        }
        if matched > 0 {
            debug!(namespace = %self.namespace, matched, "Log records matched");
        }
        combined
    }
}

fn flatten(src: &Map<String, JsonValue>) -> Patch {
    let mut out = Patch::new();
    apply_rules(src, TOP_LEVEL, &mut out);

    for rule in SECTIONS {
        if let Some(section) = src.get(rule.section).and_then(JsonValue::as_object) {
            apply_rules(section, rule.fields, &mut out);
        }
    }

    if let Some(cart) = src.get("cartInfo").and_then(JsonValue::as_object) {
        let coupons = match cart.get("discountCoupon") {
            Some(JsonValue::Array(items)) if !items.is_empty() => {
                Value::list(items.iter().map(Value::from))
            }
            _ => Value::list(Vec::new()),
        };
        out.insert("cartInfoDiscountCoupon", coupons);

        if let Some(items) = cart.get("cartItems").and_then(JsonValue::as_array) {
            let rows = items.iter().filter_map(JsonValue::as_object).map(|item| {
                let mut row = Patch::new();
                apply_rules(item, CART_ITEM_FIELDS, &mut row);
                Value::record(row)
            });
            out.insert(CART_ITEMS_KEY, Value::list(rows));
        }
    }

    out
}

fn apply_rules(src: &Map<String, JsonValue>, rules: &[FieldRule], out: &mut Patch) {
    for rule in rules {
        if let Some(raw) = lookup(src, rule.path) {
            let value = match rule.coerce {
                Coerce::Raw => Value::from(raw),
                Coerce::Number => coerce_number(raw),
            };
            out.insert(rule.key, value);
        }
    }
}

fn lookup<'a>(src: &'a Map<String, JsonValue>, path: &str) -> Option<&'a JsonValue> {
    let mut parts = path.split('.');
    let mut current = src.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Coerce a numeric-looking field.
///
/// Numbers pass through. Strings are trimmed and parsed; a single decimal
/// comma is accepted when no dot is present. Anything else, including
/// non-finite results, becomes `Undefined`.
pub fn coerce_number(raw: &JsonValue) -> Value {
    match raw {
        JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or_default(),
        JsonValue::String(s) => parse_number(s).map(Value::Number).unwrap_or_default(),
        _ => Value::Undefined,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let parsed = match text.parse::<f64>() {
        Ok(n) => n,
        Err(_) if !text.contains('.') && text.matches(',').count() == 1 => {
            text.replace(',', ".").parse::<f64>().ok()?
        }
        Err(_) => return None,
    };
    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
#[path = "log_reader_tests.rs"]
mod tests;
