//! Normalizer: raw card strings to canonical product values
//!
//! Pure, no I/O. The same rules apply to every adapter so stored rows stay
//! comparable across retailers:
//! - price: first numeric token, `,` or `.` as decimal separator, `None` when unparseable
//! - URLs: resolved against the page, placeholders dropped, images de-duplicated in order
//! - text: trimmed with inner whitespace collapsed, empties dropped
//! - colors/sizes: de-duplicated case-insensitively, first spelling kept
//! - missing name or link: rejected, never stored

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use url::Url;

use super::adapter::PageContext;
use crate::domain::{NewProduct, RawItem, SiteName};

// "1 299,00" with space grouping first, then any digit run with separators
static PRICE_TOKEN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"[0-9]{1,3}(?:[ \u{a0}\u{202f}][0-9]{3})+(?:[.,][0-9]+)?|[0-9][0-9.,']*").ok()
});

/// A card that could not become a product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub site: SiteName,
    pub card_index: usize,
    pub page_url: String,
    /// `name` or `product_link`
    pub field: &'static str,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} card #{} on {}: missing {}",
            self.site, self.card_index, self.page_url, self.field
        )
    }
}

impl std::error::Error for Rejection {}

pub struct Normalizer;

impl Normalizer {
    /// Validate and canonicalize one raw item
    pub fn normalize(raw: &RawItem, ctx: &PageContext, card_index: usize) -> Result<NewProduct, Rejection> {
        let reject = |field| Rejection {
            site: ctx.site,
            card_index,
            page_url: ctx.page_url.clone(),
            field,
        };

        let name = raw.name.as_deref().and_then(clean_text).ok_or_else(|| reject("name"))?;
        let product_link = raw
            .link
            .as_deref()
            .and_then(|link| resolve_url(&ctx.base_url, link))
            .ok_or_else(|| reject("product_link"))?;

        Ok(NewProduct {
            name,
            description: raw.description.as_deref().and_then(clean_text),
            price: parse_price(raw.price_text.as_deref()),
            sizes: dedup_labels(&raw.sizes),
            colors: dedup_labels(&raw.colors),
            image_urls: resolve_images(&ctx.base_url, &raw.image_refs),
            product_link,
        })
    }
}

/// Trim and collapse inner whitespace, `None` when nothing is left
pub fn clean_text(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Locale tolerant price parsing
///
/// `"19,99 €"` → 19.99, `"1.234,56"` → 1234.56, `"€1,299"` → 1299, `""` → `None`
pub fn parse_price(text: Option<&str>) -> Option<Decimal> {
    let text = text?;
    let token = PRICE_TOKEN.as_ref()?.find(text)?.as_str();
    let token: String = token
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '\''))
        .collect();
    let token = token.trim_end_matches(['.', ',']);
    if token.is_empty() {
        return None;
    }

    let canonical = canonical_number(token)?;
    Decimal::from_str(&canonical).ok()
}

/// Digits plus `.`/`,` → digits with at most one `.`
fn canonical_number(token: &str) -> Option<String> {
    let last_dot = token.rfind('.');
    let last_comma = token.rfind(',');

    let decimal_at = match (last_dot, last_comma) {
        (None, None) => None,
        // both present: the later one separates decimals
        (Some(dot), Some(comma)) => Some(dot.max(comma)),
        (Some(pos), None) | (None, Some(pos)) => {
            let sep = token.as_bytes()[pos];
            let occurrences = token.bytes().filter(|b| *b == sep).count();
            let digits_after = token.len() - pos - 1;
            // a repeated separator or a 3 digit tail is digit grouping
            if occurrences > 1 || digits_after == 3 || digits_after == 0 {
                None
            } else {
                Some(pos)
            }
        }
    };

    let mut canonical = String::with_capacity(token.len());
    for (i, c) in token.char_indices() {
        if c.is_ascii_digit() {
            canonical.push(c);
        } else if Some(i) == decimal_at {
            canonical.push('.');
        }
    }
    (!canonical.is_empty() && canonical != ".").then_some(canonical)
}

/// Absolute http(s) URL for `reference`, resolved against `base`
///
/// Absolute references pass through untouched; `data:`/`javascript:` refs
/// and anything that does not resolve to http(s) are dropped.
pub fn resolve_url(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    let lower = reference.to_ascii_lowercase();
    if lower.starts_with("data:") || lower.starts_with("javascript:") || lower.starts_with('#') {
        return None;
    }

    if let Ok(absolute) = Url::parse(reference) {
        return matches!(absolute.scheme(), "http" | "https").then(|| reference.to_string());
    }

    base.join(reference)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(String::from)
}

/// Resolve every image reference, keep first-seen order, drop repeats
pub fn resolve_images(base: &Url, refs: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    refs.iter()
        .filter_map(|r| resolve_url(base, r))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Clean labels and drop case-insensitive repeats, first spelling wins
pub fn dedup_labels(labels: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .iter()
        .filter_map(|label| clean_text(label))
        .filter(|label| seen.insert(label.to_lowercase()))
        .collect()
}
