//! Pull&Bear: infinite scroll with a slow lazy loader

use scraper::{ElementRef, Selector};
use std::time::Duration;

use crate::crawling::adapter::{NavigationStrategy, PageContext, SiteAdapter, SiteProfile};
use crate::domain::{RawItem, SiteName};
use crate::infrastructure::errors::CrawlResult;
use crate::infrastructure::html_extract::{self, compile};

const START_URLS: &[&str] = &["https://www.pullandbear.com/fr/homme/soldes/vetements/jeans-n7818"];

/// Cards are custom elements
const CARD_SELECTOR: &str = "legacy-product";
const SCROLL_WAIT: Duration = Duration::from_millis(7000);
const STALL_THRESHOLD: u32 = 20;

pub struct PullAndBearAdapter {
    name: Selector,
    link: Selector,
    image: Selector,
    price: Selector,
    size: Selector,
    color: Selector,
}

impl PullAndBearAdapter {
    pub fn new() -> CrawlResult<Self> {
        Ok(Self {
            name: compile(".product-name")?,
            link: compile(".carousel-item-container")?,
            image: compile(".carousel-item img")?,
            price: compile(".price-container price-element")?,
            size: compile(".c-quick-item--size input")?,
            color: compile(".item-color input")?,
        })
    }
}

impl SiteAdapter for PullAndBearAdapter {
    fn site(&self) -> SiteName {
        SiteName::Pullandbear
    }

    fn default_profile(&self) -> SiteProfile {
        let mut profile = SiteProfile::new(START_URLS, CARD_SELECTOR, NavigationStrategy::InfiniteScroll);
        profile.scroll.scroll_wait = SCROLL_WAIT;
        profile.scroll.stall_threshold = STALL_THRESHOLD;
        profile
    }

    fn extract(&self, card: ElementRef<'_>, _ctx: &PageContext) -> RawItem {
        RawItem {
            name: html_extract::first_text(card, &self.name),
            link: html_extract::first_attr(card, &self.link, "href"),
            // sale cards render the old and new price, the current one comes first
            price_text: html_extract::first_text(card, &self.price),
            description: None,
            image_refs: html_extract::image_sources(card, &self.image),
            colors: html_extract::all_attrs(card, &self.color, "title"),
            sizes: html_extract::all_attrs(card, &self.size, "value"),
        }
    }
}
