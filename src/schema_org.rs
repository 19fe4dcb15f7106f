//! Extracts the schema.org Organization record embedded in a page as JSON-LD.

use crate::error::AppError;
use crate::models::OrganizationInfo;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

static JSON_LD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

const ORGANIZATION_TYPE: &str = "Organization";

/// Returns the first JSON-LD block whose `@type` is `Organization`, verbatim.
///
/// Blocks that fail to parse are logged and skipped. Top-level arrays and
/// `@graph` containers are searched in order. Returns an empty map when no
/// Organization is present.
pub(crate) fn parse_organization_schema(html: &str) -> OrganizationInfo {
    let document = Html::parse_document(html);

    for (index, block) in document.select(&JSON_LD_SELECTOR).enumerate() {
        let raw: String = block.text().collect();
        if raw.trim().is_empty() {
            continue;
        }
        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                let err = AppError::Parse(format!("JSON-LD block #{}: {}", index, e));
                tracing::warn!(target: "schema_org", "{}", err);
                continue;
            }
        };
        if let Some(org) = find_organization(value) {
            tracing::debug!(target: "schema_org", "Found Organization schema in block #{}", index);
            return org;
        }
    }

    OrganizationInfo::new()
}

fn find_organization(value: Value) -> Option<OrganizationInfo> {
    match value {
        Value::Array(items) => items.into_iter().find_map(find_organization),
        Value::Object(mut map) => {
            if map.get("@type").and_then(Value::as_str) == Some(ORGANIZATION_TYPE) {
                return Some(map);
            }
            match map.remove("@graph") {
                Some(graph @ Value::Array(_)) => find_organization(graph),
                _ => None,
            }
        }
        _ => None,
    }
}
