//! Product entities
//!
//! `product_link` is the natural key of a product. The crawl path only ever
//! inserts (first write wins); explicit updates go through [`ProductPatch`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A stored product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Surrogate key assigned by the store
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Currency agnostic price
    #[serde(with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub image_urls: Vec<String>,
    /// Canonical absolute URL, unique across the table
    pub product_link: String,
    /// Set by the store at ingestion time
    pub scraped_at: DateTime<Utc>,
}

/// A validated product ready to be stored.
///
/// Produced by the normalizer in the crawl path and by the admin API on create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub image_urls: Vec<String>,
    pub product_link: String,
}

impl NewProduct {
    /// Minimal product with only the required fields set
    pub fn new(name: impl Into<String>, product_link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            price: None,
            sizes: Vec::new(),
            colors: Vec::new(),
            image_urls: Vec::new(),
            product_link: product_link.into(),
        }
    }

    #[must_use]
    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }
}

/// Explicit administrative update. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub sizes: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub image_urls: Option<Vec<String>>,
    pub product_link: Option<String>,
}

impl ProductPatch {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.sizes.is_none()
            && self.colors.is_none()
            && self.image_urls.is_none()
            && self.product_link.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_price_serializes_as_number() {
        let product = NewProduct::new("Tee", "https://shop.example/p/1")
            .with_price(Decimal::from_str("9.00").unwrap());
        let json = serde_json::to_value(&product).unwrap();
        assert!(json["price"].is_number());
        assert_eq!(json["price"].as_f64(), Some(9.0));
    }

    #[test]
    fn test_patch_empty() {
        assert!(ProductPatch::default().is_empty());
        let patch = ProductPatch { name: Some("Jean".into()), ..Default::default() };
        assert!(!patch.is_empty());
    }
}
