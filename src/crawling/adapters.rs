//! Built-in retailer adapters and the registry the orchestrator looks them up in

pub mod bershka;
pub mod canda;
pub mod celio;
pub mod hm;
pub mod jules;
pub mod nike;
pub mod primark;
pub mod pullandbear;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::adapter::{SiteAdapter, SiteProfile};
use crate::domain::SiteName;
use crate::infrastructure::config::SiteOverride;
use crate::infrastructure::errors::CrawlResult;

/// `SiteName` → adapter
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<SiteName, Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in retailer. Fails only when an adapter
    /// selector does not compile.
    pub fn with_builtin() -> CrawlResult<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(bershka::BershkaAdapter::new()?));
        registry.register(Arc::new(canda::CandaAdapter::new()?));
        registry.register(Arc::new(celio::CelioAdapter::new()?));
        registry.register(Arc::new(hm::HmAdapter::new()?));
        registry.register(Arc::new(jules::JulesAdapter::new()?));
        registry.register(Arc::new(nike::NikeAdapter::new()?));
        registry.register(Arc::new(primark::PrimarkAdapter::new()));
        registry.register(Arc::new(pullandbear::PullAndBearAdapter::new()?));
        Ok(registry)
    }

    /// Adds or replaces the adapter for its site
    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        self.adapters.insert(adapter.site(), adapter);
    }

    pub fn get(&self, site: SiteName) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters.get(&site).cloned()
    }

    pub fn sites(&self) -> Vec<SiteName> {
        let mut sites: Vec<_> = self.adapters.keys().copied().collect();
        sites.sort();
        sites
    }

    /// Adapter defaults with the configured per-site overrides applied
    pub fn profile_for(&self, site: SiteName, overrides: &BTreeMap<SiteName, SiteOverride>) -> Option<SiteProfile> {
        let profile = self.get(site)?.default_profile();
        Some(match overrides.get(&site) {
            Some(over) => profile.with_overrides(over),
            None => profile,
        })
    }
}
