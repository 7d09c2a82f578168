//! Raw, unvalidated field bag extracted from a single product card.
//!
//! Never persisted. Always goes through the normalizer first.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub name: Option<String>,
    /// Product link as found in the markup, possibly relative
    pub link: Option<String>,
    /// Locale formatted price text, e.g. "19,99 €"
    pub price_text: Option<String>,
    pub description: Option<String>,
    /// Image references, possibly relative or lazy-load placeholders
    pub image_refs: Vec<String>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
}

impl RawItem {
    /// Shortcut used by adapters and tests to seed the required fields.
    pub fn with_name_and_link(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            link: Some(link.into()),
            ..Self::default()
        }
    }
}
