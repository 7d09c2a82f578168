//! Primark: products read from the Next.js page object
//!
//! The listing hydrates from `__NEXT_DATA__`, so the adapter evaluates a
//! script that digs the product array out of it instead of parsing cards.

use scraper::ElementRef;
use serde_json::Value;

use crate::crawling::adapter::{NavigationStrategy, PageContext, SiteAdapter, SiteProfile};
use crate::domain::{RawItem, SiteName};

const START_URLS: &[&str] = &[
    "https://www.primark.com/fr-fr/c/homme/vetements/t-shirts",
    "https://www.primark.com/fr-fr/c/homme/vetements/jeans",
    "https://www.primark.com/fr-fr/c/femme/vetements/robes",
];

/// Waited on before the script runs
const CARD_SELECTOR: &str = "script#__NEXT_DATA__";

/// First array of objects carrying both a name and a link-ish field
const PRODUCTS_SCRIPT: &str = r#"(() => {
  const el = document.getElementById('__NEXT_DATA__');
  if (!el) return [];
  const seen = new Set();
  const looksLikeProducts = (arr) => arr.length > 0 && arr.every(
    (p) => p && typeof p === 'object' && 'name' in p && ('url' in p || 'slug' in p));
  const walk = (node) => {
    if (!node || typeof node !== 'object' || seen.has(node)) return null;
    seen.add(node);
    if (Array.isArray(node) && looksLikeProducts(node)) return node;
    for (const child of Object.values(node)) {
      const found = walk(child);
      if (found) return found;
    }
    return null;
  };
  try {
    return walk(JSON.parse(el.textContent)) || [];
  } catch (e) {
    return [];
  }
})()"#;

pub struct PrimarkAdapter;

impl PrimarkAdapter {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for PrimarkAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn text_field(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match entry.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Strings, or objects carrying the string under `key`
fn string_list(entry: &Value, field: &str, key: &str) -> Vec<String> {
    entry
        .get(field)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(_) => v.get(key).and_then(Value::as_str).map(ToString::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

impl SiteAdapter for PrimarkAdapter {
    fn site(&self) -> SiteName {
        SiteName::Primark
    }

    fn default_profile(&self) -> SiteProfile {
        SiteProfile::new(
            START_URLS,
            CARD_SELECTOR,
            NavigationStrategy::PageObjectJson { script: PRODUCTS_SCRIPT.to_string() },
        )
    }

    /// Never used for page-object sites, the card is the data script itself
    fn extract(&self, _card: ElementRef<'_>, _ctx: &PageContext) -> RawItem {
        RawItem::default()
    }

    fn extract_json(&self, entry: &Value, _ctx: &PageContext) -> RawItem {
        // price is either a plain value or { formattedValue, value }
        let price_text = match entry.get("price") {
            Some(price @ Value::Object(_)) => text_field(price, &["formattedValue", "formatted", "value"]),
            Some(_) => text_field(entry, &["price"]),
            None => None,
        };

        RawItem {
            name: text_field(entry, &["name"]),
            link: text_field(entry, &["url", "slug"]),
            price_text,
            description: text_field(entry, &["description"]),
            image_refs: string_list(entry, "images", "url"),
            colors: string_list(entry, "colors", "name"),
            sizes: string_list(entry, "sizes", "name"),
        }
    }
}
