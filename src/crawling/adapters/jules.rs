//! Jules: static listing

use scraper::{ElementRef, Selector};

use crate::crawling::adapter::{NavigationStrategy, PageContext, SiteAdapter, SiteProfile};
use crate::domain::{RawItem, SiteName};
use crate::infrastructure::errors::CrawlResult;
use crate::infrastructure::html_extract::{self, compile};

const START_URLS: &[&str] = &["https://www.jules.com/"];
const CARD_SELECTOR: &str = "div.product-tile";

pub struct JulesAdapter {
    name: Selector,
    link: Selector,
    price: Selector,
    image: Selector,
    size: Selector,
}

impl JulesAdapter {
    pub fn new() -> CrawlResult<Self> {
        Ok(Self {
            name: compile(".product-tile__name")?,
            link: compile("a.product-tile__link")?,
            price: compile(".product-tile__price")?,
            image: compile("img.product-tile__image")?,
            size: compile(".product-tile__sizes li")?,
        })
    }
}

impl SiteAdapter for JulesAdapter {
    fn site(&self) -> SiteName {
        SiteName::Jules
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
            colors: Vec::new(),
            sizes: html_extract::all_texts(card, &self.size),
        }
    }
}
