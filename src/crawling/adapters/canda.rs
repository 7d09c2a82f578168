//! C&A: product grid grown by a "load more" button

use scraper::{ElementRef, Selector};

use crate::crawling::adapter::{NavigationStrategy, PageContext, SiteAdapter, SiteProfile};
use crate::domain::{RawItem, SiteName};
use crate::infrastructure::errors::CrawlResult;
use crate::infrastructure::html_extract::{self, compile};

const START_URLS: &[&str] = &[
    "https://www.c-and-a.com/fr/fr/shop/femme-vetements-t-shirts-hauts-t-shirts",
    "https://www.c-and-a.com/fr/fr/shop/femme-vetements-pantalons",
    "https://www.c-and-a.com/fr/fr/shop/femme-vetements-robes",
    "https://www.c-and-a.com/fr/fr/shop/homme-vetements-t-shirts-polos",
    "https://www.c-and-a.com/fr/fr/shop/homme-vetements-jeans",
    "https://www.c-and-a.com/fr/fr/shop/homme-vetements-shorts",
];

const CARD_SELECTOR: &str = r#"li[data-qa="ProductTile"]"#;
const LOAD_MORE_BUTTON: &str = r#"button[data-qa="LoadMoreButton"]"#;

pub struct CandaAdapter {
    name: Selector,
    link: Selector,
    price: Selector,
    image: Selector,
    color: Selector,
}

impl CandaAdapter {
    pub fn new() -> CrawlResult<Self> {
        Ok(Self {
            name: compile(r#"div[data-qa="ProductName"]"#)?,
            link: compile(r#"a[data-qa="Link"]"#)?,
            price: compile(r#"div[data-qa="ProductPrice"]"#)?,
            image: compile("picture img")?,
            color: compile(r#"span[data-qa="ColorSwatch"] img"#)?,
        })
    }
}

impl SiteAdapter for CandaAdapter {
    fn site(&self) -> SiteName {
        SiteName::Canda
    }

    fn default_profile(&self) -> SiteProfile {
        SiteProfile::new(
            START_URLS,
            CARD_SELECTOR,
            NavigationStrategy::LoadMoreButton { button_selector: LOAD_MORE_BUTTON.to_string() },
        )
    }

    fn extract(&self, card: ElementRef<'_>, _ctx: &PageContext) -> RawItem {
        RawItem {
            name: html_extract::first_text(card, &self.name),
            link: html_extract::first_attr(card, &self.link, "href"),
            price_text: html_extract::first_text(card, &self.price),
            description: None,
            // first picture only, the others are hover variants
            image_refs: card.select(&self.image).find_map(html_extract::image_source).into_iter().collect(),
            colors: html_extract::all_attrs(card, &self.color, "alt"),
            sizes: Vec::new(),
        }
    }
}
