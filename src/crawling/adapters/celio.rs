//! Celio: server-rendered listing behind DataDome
//!
//! The grid is complete in the first document, but the site is the one most
//! likely to serve a CAPTCHA wall, so it is paced slower and may escalate to
//! the solver when one is configured.

use scraper::{ElementRef, Selector};
use std::time::Duration;

use crate::crawling::adapter::{NavigationStrategy, PageContext, SiteAdapter, SiteProfile};
use crate::domain::{RawItem, SiteName};
use crate::infrastructure::errors::CrawlResult;
use crate::infrastructure::html_extract::{self, compile};

const START_URLS: &[&str] = &[
    "https://www.celio.com/fr-fr/c/chemises-chemises-en-lin",
    "https://www.celio.com/fr-fr/c/chemises-chemises-blanches",
    "https://www.celio.com/fr-fr/c/chemises-chemises-en-jean",
    "https://www.celio.com/fr-fr/c/chemises-chemises-manches-courtes",
];

const CARD_SELECTOR: &str = ".product-grid__item .product";
const REQUEST_DELAY: Duration = Duration::from_secs(10);

pub struct CelioAdapter {
    name: Selector,
    link: Selector,
    image: Selector,
    price: Selector,
    color: Selector,
}

impl CelioAdapter {
    pub fn new() -> CrawlResult<Self> {
        Ok(Self {
            name: compile(".product-tile__name")?,
            link: compile("a.product-tile__name")?,
            image: compile(".product-tile__image img.tile-image")?,
            price: compile(".product-tile__price .value")?,
            color: compile(".color-swatches .swatches__item")?,
        })
    }
}

impl SiteAdapter for CelioAdapter {
    fn site(&self) -> SiteName {
        SiteName::Celio
    }

    fn default_profile(&self) -> SiteProfile {
        let mut profile = SiteProfile::new(START_URLS, CARD_SELECTOR, NavigationStrategy::StaticHtml);
        profile.request_delay = REQUEST_DELAY;
        profile.captcha_escalation = true;
        profile
    }

    fn extract(&self, card: ElementRef<'_>, _ctx: &PageContext) -> RawItem {
        RawItem {
            name: html_extract::first_text(card, &self.name),
            link: html_extract::first_attr(card, &self.link, "href"),
            price_text: html_extract::first_text(card, &self.price),
            description: None,
            image_refs: html_extract::image_sources(card, &self.image),
            colors: html_extract::all_attrs(card, &self.color, "title"),
            sizes: Vec::new(),
        }
    }
}
