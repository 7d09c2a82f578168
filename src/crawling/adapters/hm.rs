//! H&M: static listing

use scraper::{ElementRef, Selector};

use crate::crawling::adapter::{NavigationStrategy, PageContext, SiteAdapter, SiteProfile};
use crate::domain::{RawItem, SiteName};
use crate::infrastructure::errors::CrawlResult;
use crate::infrastructure::html_extract::{self, compile};

const START_URLS: &[&str] = &["https://www2.hm.com/fr_fr/index.html"];
const CARD_SELECTOR: &str = "li.product-item";

pub struct HmAdapter {
    name: Selector,
    link: Selector,
    price: Selector,
    image: Selector,
    swatch: Selector,
}

impl HmAdapter {
    pub fn new() -> CrawlResult<Self> {
        Ok(Self {
            name: compile(".product-item-name")?,
            link: compile("a.product-item-link")?,
            price: compile(".price-value")?,
            image: compile("img.product-item-image")?,
            swatch: compile(".list-swatches .swatch")?,
        })
    }
}

impl SiteAdapter for HmAdapter {
    fn site(&self) -> SiteName {
        SiteName::Hm
    }

    fn default_profile(&self) -> SiteProfile {
        SiteProfile::new(START_URLS, CARD_SELECTOR, NavigationStrategy::StaticHtml)
    }

    fn extract(&self, card: ElementRef<'_>, _ctx: &PageContext) -> RawItem {
        RawItem {
            name: html_extract::first_text(card, &self.name),
            link: html_extract::first_attr(card, &self.link, "href"),
            price_text: html_extract::first_text(card, &self.price),
            description: None,
            image_refs: html_extract::image_sources(card, &self.image),
            colors: html_extract::all_attrs(card, &self.swatch, "title"),
            sizes: Vec::new(),
        }
    }
}
