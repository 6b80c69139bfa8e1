use scraper::{ElementRef, Html};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::selectors::{first_present, first_text, text_of, ListingSelectors};
use crate::types::{ListingRecord, ListingType, Price};

/// Node-level failure. Contained to the node; never aborts a page.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("discount text '{0}' has no digits")]
    DiscountNotNumeric(String),

    #[error("discount {0}% is out of range")]
    DiscountOutOfRange(u32),

    #[error("discount text '{0}' is not a whole percentage")]
    DiscountFractional(String),
}

/// Result of parsing one page of listings.
#[derive(Debug, Default)]
pub struct PageParse {
    pub records: Vec<ListingRecord>,
    /// Nodes that failed field extraction and were dropped.
    pub skipped_nodes: usize,
}

/// Parse every listing node on a page. A malformed node is logged and
/// skipped; the rest of the page still parses.
pub fn parse_page(html: &str, selectors: &ListingSelectors, page: usize) -> PageParse {
    let doc = Html::parse_document(html);
    let mut out = PageParse::default();

    for (idx, node) in doc.select(&selectors.listing).enumerate() {
        match parse_listing(node, selectors) {
            Ok(record) => {
                if record.name.is_none() {
                    warn!(page, node = idx, "listing has no title; keeping unnamed record");
                }
                out.records.push(record);
            }
            Err(e) => {
                warn!(page, node = idx, "skipping listing: {e}");
                out.skipped_nodes += 1;
            }
        }
    }

    debug!(
        page,
        parsed = out.records.len(),
        skipped = out.skipped_nodes,
        "page parsed"
    );
    out
}

pub fn parse_listing(
    node: ElementRef<'_>,
    selectors: &ListingSelectors,
) -> Result<ListingRecord, ParseError> {
    let name = first_text(node, &selectors.name);

    let discount_percent = match text_of(node, &selectors.discount) {
        Some(text) => parse_discount(&text)?,
        None => 0,
    };

    let price = assemble_price(
        text_of(node, &selectors.currency).as_deref(),
        text_of(node, &selectors.integer).as_deref(),
        text_of(node, &selectors.decimal).as_deref(),
    );

    let listing_type = first_present(node, &selectors.badges).unwrap_or(ListingType::Standard);

    Ok(ListingRecord {
        name,
        discount_percent,
        price,
        listing_type,
    })
}

/// `"-20%"` → 20. The first run of digits is the value; a fractional part
/// (`"-7.5%"`, `"-12,5%"`) or anything above 100 is rejected.
pub fn parse_discount(text: &str) -> Result<u8, ParseError> {
    let start = text
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| ParseError::DiscountNotNumeric(text.to_string()))?;
    let rest = &text[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let (digits, tail) = rest.split_at(end);

    let mut tail_chars = tail.chars();
    if matches!(tail_chars.next(), Some('.' | ',')) && tail_chars.next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(ParseError::DiscountFractional(text.to_string()));
    }

    let value: u32 = digits
        .parse()
        .map_err(|_| ParseError::DiscountNotNumeric(text.to_string()))?;
    if value > 100 {
        return Err(ParseError::DiscountOutOfRange(value));
    }
    Ok(value as u8)
}

/// Join the three rendered fragments (currency, integer, decimal) into one
/// display string and parse it. Any missing fragment, or a joined string that
/// is not a well-formed amount, yields `Price::Unavailable`.
pub fn assemble_price(currency: Option<&str>, integer: Option<&str>, decimal: Option<&str>) -> Price {
    let (Some(currency), Some(integer), Some(decimal)) = (currency, integer, decimal) else {
        return Price::Unavailable;
    };
    let joined = format!("{currency}{integer}{decimal}");
    match parse_display_price(&joined, currency) {
        Some(v) => Price::Amount(v),
        None => {
            debug!(price_text = %joined, "price fragments did not form an amount");
            Price::Unavailable
        }
    }
}

/// `"R$79,99"` → 79.99, `"R$1.299,90"` → 1299.9, `"$19.99"` → 19.99.
/// The last `,` or `.` followed by at most two digits is the decimal mark;
/// other separators are grouping.
pub fn parse_display_price(display: &str, currency: &str) -> Option<f64> {
    let numeric = display.strip_prefix(currency)?.trim();
    let (whole, frac) = match numeric.rfind([',', '.']) {
        Some(i) if numeric.len() - i - 1 <= 2 => (&numeric[..i], &numeric[i + 1..]),
        _ => (numeric, ""),
    };

    let whole: String = whole
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | ' ' | '\u{a0}'))
        .collect();
    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let text = if frac.is_empty() {
        whole
    } else {
        format!("{whole}.{frac}")
    };
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}
