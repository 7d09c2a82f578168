//! Nike: infinite scroll listing

use scraper::{ElementRef, Selector};

use crate::crawling::adapter::{NavigationStrategy, PageContext, SiteAdapter, SiteProfile};
use crate::domain::{RawItem, SiteName};
use crate::infrastructure::errors::CrawlResult;
use crate::infrastructure::html_extract::{self, compile};

const START_URLS: &[&str] = &[
    "https://www.nike.com/fr/w/hommes-chaussures-nik1zy7ok",
    "https://www.nike.com/fr/w/hommes-vetements-6ymx6znik1",
    "https://www.nike.com/fr/w/hommes-meilleures-ventes-76m50znik1",
    "https://www.nike.com/fr/w/nouveau-hommes-3n82yznik1",
];

const CARD_SELECTOR: &str = ".product-card";

pub struct NikeAdapter {
    title: Selector,
    subtitle: Selector,
    link: Selector,
    image: Selector,
    price: Selector,
    colors: Selector,
}

impl NikeAdapter {
    pub fn new() -> CrawlResult<Self> {
        Ok(Self {
            title: compile(".product-card__title")?,
            subtitle: compile(".product-card__subtitle")?,
            link: compile(".product-card__link-overlay")?,
            image: compile(".product-card__hero-image")?,
            price: compile(".product-price.is--current-price")?,
            colors: compile(".product-card__product-count")?,
        })
    }
}

impl SiteAdapter for NikeAdapter {
    fn site(&self) -> SiteName {
        SiteName::Nike
    }

    fn default_profile(&self) -> SiteProfile {
        SiteProfile::new(START_URLS, CARD_SELECTOR, NavigationStrategy::InfiniteScroll)
    }

    fn extract(&self, card: ElementRef<'_>, _ctx: &PageContext) -> RawItem {
        RawItem {
            name: html_extract::first_text(card, &self.title),
            link: html_extract::first_attr(card, &self.link, "href"),
            price_text: html_extract::first_text(card, &self.price),
            // "Chaussure pour homme" style category line
            description: html_extract::first_text(card, &self.subtitle),
            image_refs: html_extract::image_sources(card, &self.image),
            // only a "3 couleurs" summary is rendered, no names
            colors: html_extract::first_text(card, &self.colors).into_iter().collect(),
            sizes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawling::adapter::extract_cards;

    #[test]
    fn test_extracts_card() {
        let html = r#"
            <div class="product-grid__items">
              <div class="product-card">
                <a class="product-card__link-overlay" href="https://www.nike.com/fr/t/air-max-90-abc/CN8490-002">Nike Air Max 90</a>
                <img class="product-card__hero-image" src="https://static.nike.com/a/images/am90.png">
                <div class="product-card__title">Nike Air Max 90</div>
                <div class="product-card__subtitle">Chaussure pour homme</div>
                <div class="product-card__product-count">3 couleurs</div>
                <div class="product-price is--current-price">149,99 €</div>
                <div class="product-price is--striked-out">169,99 €</div>
              </div>
            </div>
        "#;
        let adapter = NikeAdapter::new().unwrap();
        let ctx = PageContext::new(SiteName::Nike, START_URLS[0]).unwrap();
        let items = extract_cards(&adapter, html, CARD_SELECTOR, &ctx).unwrap();

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.name.as_deref(), Some("Nike Air Max 90"));
        assert_eq!(item.link.as_deref(), Some("https://www.nike.com/fr/t/air-max-90-abc/CN8490-002"));
        assert_eq!(item.price_text.as_deref(), Some("149,99 €"));
        assert_eq!(item.description.as_deref(), Some("Chaussure pour homme"));
        assert_eq!(item.image_refs, vec!["https://static.nike.com/a/images/am90.png"]);
    }
}
