use scraper::{ElementRef, Selector};

use crate::config::selectors as css;
use crate::error::{AppError, Result};
use crate::types::ListingType;

/// Ordered fallback chain: each entry pairs a selector with the value it
/// stands for when it is the first one to match.
pub type Chain<T> = Vec<(Selector, T)>;

/// Compiled selectors for one listing node.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub listing: Selector,
    /// Title variants, multi-line first.
    pub name: Vec<Selector>,
    pub discount: Selector,
    pub currency: Selector,
    pub integer: Selector,
    pub decimal: Selector,
    pub badges: Chain<ListingType>,
}

impl ListingSelectors {
    pub fn new() -> Result<Self> {
        Ok(Self {
            listing: compile(css::LISTING)?,
            name: vec![compile(css::NAME_MULTI_LINE)?, compile(css::NAME_SINGLE_LINE)?],
            discount: compile(css::DISCOUNT)?,
            currency: compile(css::CURRENCY)?,
            integer: compile(css::INTEGER)?,
            decimal: compile(css::DECIMAL)?,
            badges: vec![
                (compile(css::BADGE_PREORDER)?, ListingType::Preorder),
                (compile(css::BADGE_DLC)?, ListingType::Dlc),
                (compile(css::BADGE_BUNDLE)?, ListingType::Bundle),
            ],
        })
    }
}

fn compile(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|_| AppError::Selector(s.to_string()))
}

/// Whitespace-normalized text of the first element matching `selector`
/// under `node`. Elements with no visible text count as absent.
pub fn text_of(node: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let el = node.select(selector).next()?;
    let text = el.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Text of the first selector in `chain` that produces any.
pub fn first_text(node: ElementRef<'_>, chain: &[Selector]) -> Option<String> {
    chain.iter().find_map(|selector| text_of(node, selector))
}

/// Value of the first entry whose element exists. Badges may be rendered
/// as icons with no text, so text is not required.
pub fn first_present<T: Copy>(node: ElementRef<'_>, chain: &[(Selector, T)]) -> Option<T> {
    chain
        .iter()
        .find(|(selector, _)| node.select(selector).next().is_some())
        .map(|(_, tag)| *tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn first_node<'a>(doc: &'a Html, sel: &ListingSelectors) -> ElementRef<'a> {
        doc.select(&sel.listing).next().expect("listing node")
    }

    #[test]
    fn default_selectors_compile() {
        let sel = ListingSelectors::new().unwrap();
        assert_eq!(sel.name.len(), 2);
        assert_eq!(sel.badges.len(), 3);
    }

    #[test]
    fn first_text_prefers_earlier_entry() {
        let sel = ListingSelectors::new().unwrap();
        let doc = Html::parse_fragment(
            r#"<div class="product-card--grid">
                 <span class="single-line-name">Short</span>
                 <span class="double-line-name">Long
                    Title</span>
               </div>"#,
        );
        let node = first_node(&doc, &sel);
        assert_eq!(first_text(node, &sel.name).as_deref(), Some("Long Title"));
    }

    #[test]
    fn blank_element_falls_through() {
        let sel = ListingSelectors::new().unwrap();
        let doc = Html::parse_fragment(
            r#"<div class="product-card--grid">
                 <span class="double-line-name">   </span>
                 <span class="single-line-name">Fallback</span>
               </div>"#,
        );
        let node = first_node(&doc, &sel);
        assert_eq!(first_text(node, &sel.name).as_deref(), Some("Fallback"));
    }

    #[test]
    fn badge_priority_order() {
        let sel = ListingSelectors::new().unwrap();
        let doc = Html::parse_fragment(
            r#"<div class="product-card--grid">
                 <span class="product-badge__package">Pacote</span>
                 <span class="product-badge__dlc"></span>
               </div>"#,
        );
        let node = first_node(&doc, &sel);
        assert_eq!(first_present(node, &sel.badges), Some(ListingType::Dlc));
    }
}
