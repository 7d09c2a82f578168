//! Shared extraction helpers over `scraper` element trees
//!
//! Adapters compile their selectors once and use these helpers to read the
//! card subtree. Every helper returns trimmed, non-empty values only.

use scraper::{ElementRef, Html, Selector};

use crate::infrastructure::errors::{CrawlError, CrawlResult};

pub fn compile(selector: &str) -> CrawlResult<Selector> {
    Selector::parse(selector).map_err(|e| CrawlError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Count matches in a serialized document
pub fn count_matches(html: &str, selector: &str) -> CrawlResult<usize> {
    let selector = compile(selector)?;
    let document = Html::parse_document(html);
    Ok(document.select(&selector).count())
}

/// Visible text of an element, whitespace collapsed
pub fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

pub fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector).find_map(element_text)
}

pub fn all_texts(card: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    card.select(selector).filter_map(element_text).collect()
}

pub fn own_attr(element: ElementRef<'_>, attr: &str) -> Option<String> {
    element
        .value()
        .attr(attr)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// First non-empty `attr` among the matches
pub fn first_attr(card: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    card.select(selector).find_map(|el| own_attr(el, attr))
}

pub fn all_attrs(card: ElementRef<'_>, selector: &Selector, attr: &str) -> Vec<String> {
    card.select(selector).filter_map(|el| own_attr(el, attr)).collect()
}

/// Lazy-loaded images keep the real URL in a data attribute and a placeholder in `src`
pub fn image_source(element: ElementRef<'_>) -> Option<String> {
    ["data-original", "data-src", "data-lazy-src", "src"]
        .into_iter()
        .filter_map(|attr| own_attr(element, attr))
        .find(|value| !value.starts_with("data:"))
        .or_else(|| own_attr(element, "srcset").and_then(|s| first_srcset_url(&s)))
}

pub fn image_sources(card: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    card.select(selector).filter_map(image_source).collect()
}

/// `"a.jpg 1x, b.jpg 2x"` → `a.jpg`
pub fn first_srcset_url(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .find(|url| !url.is_empty() && !url.starts_with("data:"))
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = r#"
        <div class="card">
            <a class="link" href="/p/1">  Tee
               shirt </a>
            <img class="img" src="data:image/gif;base64,AAAA" data-original="/img/a.jpg">
            <img class="img" src="/img/b.jpg">
            <span class="color" title="Noir"></span><span class="color" title=" "></span>
            <ul><li class="size">S</li><li class="size"> </li><li class="size">M</li></ul>
        </div>"#;

    fn with_card<F: FnOnce(ElementRef<'_>)>(f: F) {
        let doc = Html::parse_fragment(CARD);
        let sel = compile(".card").unwrap();
        let card = doc.select(&sel).next().unwrap();
        f(card);
    }

    #[test]
    fn test_text_and_attrs() {
        with_card(|card| {
            assert_eq!(first_text(card, &compile(".link").unwrap()).as_deref(), Some("Tee shirt"));
            assert_eq!(first_attr(card, &compile(".link").unwrap(), "href").as_deref(), Some("/p/1"));
            assert_eq!(all_attrs(card, &compile(".color").unwrap(), "title"), vec!["Noir"]);
            assert_eq!(all_texts(card, &compile(".size").unwrap()), vec!["S", "M"]);
        });
    }

    #[test]
    fn test_lazy_images_skip_placeholders() {
        with_card(|card| {
            assert_eq!(image_sources(card, &compile(".img").unwrap()), vec!["/img/a.jpg", "/img/b.jpg"]);
        });
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(compile("div[[").unwrap_err(), CrawlError::InvalidSelector { .. }));
    }

    #[test]
    fn test_count_matches() {
        assert_eq!(count_matches(CARD, ".size").unwrap(), 3);
        assert_eq!(first_srcset_url("a.jpg 1x, b.jpg 2x").as_deref(), Some("a.jpg"));
    }
}
