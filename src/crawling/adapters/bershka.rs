//! Bershka: infinite scroll listing

use scraper::{ElementRef, Selector};

use crate::crawling::adapter::{NavigationStrategy, PageContext, SiteAdapter, SiteProfile};
use crate::domain::{RawItem, SiteName};
use crate::infrastructure::errors::CrawlResult;
use crate::infrastructure::html_extract::{self, compile};

const START_URLS: &[&str] = &[
    "https://www.bershka.com/fr/homme/vetements/t-shirts-n3294.html",
    "https://www.bershka.com/fr/homme/vetements/shorts-n3705.html",
    "https://www.bershka.com/fr/homme/vetements/jeans-n3676.html",
    "https://www.bershka.com/fr/homme/vetements/chemises-n3700.html",
    "https://www.bershka.com/fr/homme/vetements/pantalons-n3288.html",
    "https://www.bershka.com/fr/homme/accessoires/maillots-de-bain-n5476.html",
];

const CARD_SELECTOR: &str = ".category-product-card";

pub struct BershkaAdapter {
    main_image: Selector,
    link: Selector,
    price: Selector,
    color_input: Selector,
    color_image: Selector,
    size: Selector,
}

impl BershkaAdapter {
    pub fn new() -> CrawlResult<Self> {
        Ok(Self {
            main_image: compile(r#".product-image img[data-qa-anchor="productGridMainImage"]"#)?,
            link: compile(".grid-card-link")?,
            price: compile(".current-price-elem")?,
            color_input: compile(".color-cut input")?,
            color_image: compile(".color-cut img")?,
            size: compile(".ui--size-dot-list .text__label")?,
        })
    }
}

impl SiteAdapter for BershkaAdapter {
    fn site(&self) -> SiteName {
        SiteName::Bershka
    }

    fn default_profile(&self) -> SiteProfile {
        SiteProfile::new(START_URLS, CARD_SELECTOR, NavigationStrategy::InfiniteScroll)
    }

    fn extract(&self, card: ElementRef<'_>, _ctx: &PageContext) -> RawItem {
        // the product name only lives in the main image alt text
        let name = html_extract::first_attr(card, &self.main_image, "alt");

        // swatches are either named radio inputs or thumbnails with an alt
        let mut colors = html_extract::all_attrs(card, &self.color_input, "name");
        if colors.is_empty() {
            colors = html_extract::all_attrs(card, &self.color_image, "alt");
        }

        RawItem {
            name,
            link: html_extract::first_attr(card, &self.link, "href"),
            price_text: html_extract::first_text(card, &self.price),
            description: None,
            image_refs: html_extract::image_sources(card, &self.main_image),
            colors,
            sizes: html_extract::all_texts(card, &self.size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawling::adapter::extract_cards;

    const LISTING: &str = r#"
        <div class="grid">
          <div class="category-product-card">
            <a class="grid-card-link" href="/fr/t-shirt-boxy-c0p1.html">
              <div class="product-image">
                <img data-qa-anchor="productGridMainImage" alt="T-shirt boxy"
                     src="data:image/gif;base64,AAAA" data-original="https://static.bershka.net/t1.jpg">
              </div>
            </a>
            <span class="current-price-elem">12,99 €</span>
            <ul><li class="color-cut"><input name="Noir"></li><li class="color-cut"><input name="Blanc"></li></ul>
            <div class="ui--size-dot-list"><span class="text__label">S</span><span class="text__label">M</span></div>
          </div>
          <div class="category-product-card">
            <a class="grid-card-link" href="/fr/short-c0p2.html">
              <div class="product-image">
                <img data-qa-anchor="productGridMainImage" alt="Short" src="/img/s.jpg">
              </div>
            </a>
            <ul><li class="color-cut"><img alt="Beige" src="/sw.jpg"></li></ul>
          </div>
        </div>
    "#;

    #[test]
    fn test_extracts_cards() {
        let adapter = BershkaAdapter::new().unwrap();
        let ctx = PageContext::new(SiteName::Bershka, START_URLS[0]).unwrap();
        let items = extract_cards(&adapter, LISTING, CARD_SELECTOR, &ctx).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name.as_deref(), Some("T-shirt boxy"));
        assert_eq!(items[0].link.as_deref(), Some("/fr/t-shirt-boxy-c0p1.html"));
        assert_eq!(items[0].price_text.as_deref(), Some("12,99 €"));
        assert_eq!(items[0].image_refs, vec!["https://static.bershka.net/t1.jpg"]);
        assert_eq!(items[0].colors, vec!["Noir", "Blanc"]);
        assert_eq!(items[0].sizes, vec!["S", "M"]);

        assert_eq!(items[1].colors, vec!["Beige"]);
        assert_eq!(items[1].price_text, None);
    }
}
