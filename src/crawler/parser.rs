//! HTML parser for the listing site's markup
//!
//! Every CSS selector the pipeline depends on lives in this module, behind the
//! `ListingPageParser` trait. When the site changes its markup, this is the
//! only component that needs to change.
//!
//! Each extracted field is either required (missing markup is a `ParseError`)
//! or optional (missing markup is `None`); nothing is silently defaulted.

use crate::record::{ListingRecord, ListingReference, MILEAGE_KEY, MILEAGE_MEASUREMENT_KEY};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised when expected markup is missing or malformed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing element for {field}")]
    MissingElement { field: &'static str },

    #[error("missing attribute '{attribute}' for {field}")]
    MissingAttribute {
        field: &'static str,
        attribute: &'static str,
    },

    #[error("expected at least {expected} entries for {field}, found {found}")]
    TooFewEntries {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("malformed {field}: '{value}'")]
    Malformed { field: &'static str, value: String },
}

/// Page count as read from a search result's pagination control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// The control exists but lists no further pages
    SinglePage,
    /// The control names the last page
    Pages(u32),
}

impl Pagination {
    /// Total number of result pages, always at least 1
    pub fn page_count(&self) -> u32 {
        match self {
            Self::SinglePage => 1,
            Self::Pages(count) => *count,
        }
    }
}

/// Site-specific extraction of everything the pipeline reads from HTML
pub trait ListingPageParser: Send + Sync {
    /// Anti-forgery token embedded in the handshake page, if any
    fn anti_forgery_token(&self, html: &str) -> Option<String>;

    /// Reads the pagination control of a search result page
    fn pagination(&self, html: &str) -> Result<Pagination, ParseError>;

    /// Listing references of a search result page, in card order
    ///
    /// Cards without a usable anchor are skipped.
    fn listing_references(&self, html: &str) -> Vec<ListingReference>;

    /// Parses one listing page into a record keyed by the reference's listing id
    fn listing(
        &self,
        html: &str,
        reference: &ListingReference,
    ) -> Result<ListingRecord, ParseError>;
}

const TOKEN_SELECTOR: &str = r#"meta[name="csrf-token"]"#;
const PAGINATION_SELECTOR: &str = ".pagination";
const PAGINATION_LINK_SELECTOR: &str = ".pagination li a";
const CARD_SELECTOR: &str = ".card";
const CARD_ANCHOR_SELECTOR: &str = ".card-image a";
const HEADING_LINK_SELECTOR: &str = "h1 a";
const ATTRS_SELECTOR: &str = ".attrs span";
const PRICE_SELECTOR: &str = ".offer-top-price .price span, .offer-top-price .price small";
const PRICE_ATTRS_SELECTOR: &str = ".offer-top-price .price-attrs";
const SELLER_SELECTOR: &str = ".ad-seller-details a.call-seller";
const SELLER_ID_ATTRIBUTE: &str = "data-sellerid";
// the site's own spelling
const URGENT_SELECTOR: &str = ".urgent-stiker";
const VIN_SELECTOR: &str = ".pad-left-6";
const DETAILS_ROW_SELECTOR: &str = ".ad-det tr";
const OPTIONS_SELECTOR: &str = ".ad-options";

/// Date layouts seen in the attributes strip
const NUMERIC_DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y.%m.%d"];
const WORDED_DATE_FORMATS: &[&str] = &["%d %B %Y", "%B %d %Y", "%d %b %Y", "%b %d %Y"];

/// `ListingPageParser` for the live site's markup
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlListingParser;

impl HtmlListingParser {
    pub fn new() -> Self {
        Self
    }
}

impl ListingPageParser for HtmlListingParser {
    fn anti_forgery_token(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);

        select_all(&document, TOKEN_SELECTOR)
            .into_iter()
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
    }

    fn pagination(&self, html: &str) -> Result<Pagination, ParseError> {
        let document = Html::parse_document(html);

        if select_all(&document, PAGINATION_SELECTOR).is_empty() {
            return Err(ParseError::MissingElement {
                field: "pagination",
            });
        }

        // The last entry is the "next" control, so the page count is the one before it
        let links = select_all(&document, PAGINATION_LINK_SELECTOR);
        if links.len() < 2 {
            return Ok(Pagination::SinglePage);
        }

        let text = text_of(links[links.len() - 2]);
        let count: u32 = text.parse().map_err(|_| ParseError::Malformed {
            field: "pagination",
            value: text.clone(),
        })?;

        match count {
            0 => Err(ParseError::Malformed {
                field: "pagination",
                value: text,
            }),
            1 => Ok(Pagination::SinglePage),
            n => Ok(Pagination::Pages(n)),
        }
    }

    fn listing_references(&self, html: &str) -> Vec<ListingReference> {
        let document = Html::parse_document(html);
        let mut references = Vec::new();

        for (index, card) in select_all(&document, CARD_SELECTOR).into_iter().enumerate() {
            let href = select_in(card, CARD_ANCHOR_SELECTOR)
                .into_iter()
                .next()
                .and_then(|anchor| anchor.value().attr("href"));

            let Some(href) = href else {
                tracing::debug!("Card {} has no listing anchor, skipping", index);
                continue;
            };

            match ListingReference::parse(href) {
                Ok(reference) => references.push(reference),
                Err(e) => tracing::warn!("Skipping card {}: {}", index, e),
            }
        }

        references
    }

    fn listing(
        &self,
        html: &str,
        reference: &ListingReference,
    ) -> Result<ListingRecord, ParseError> {
        let document = Html::parse_document(html);

        let (year, make, model) = parse_vehicle_identity(&document)?;

        let attrs = select_all(&document, ATTRS_SELECTOR);
        let insert_date_text = attrs
            .first()
            .map(|span| text_of(*span))
            .ok_or(ParseError::MissingElement {
                field: "insert_date",
            })?;
        let insert_date =
            parse_insert_date(&insert_date_text).ok_or_else(|| ParseError::Malformed {
                field: "insert_date",
                value: insert_date_text.clone(),
            })?;
        let location = attrs
            .get(1)
            .and_then(|span| parse_location(&text_of(*span)));

        let price = parse_price(&document)?;
        let seller_id = parse_seller_id(&document)?;

        let pricing_attributes = first_text(&document, PRICE_ATTRS_SELECTOR)
            .map(|text| text.to_lowercase())
            .unwrap_or_default();
        let is_urgent = !select_all(&document, URGENT_SELECTOR).is_empty();

        let vin = first_text(&document, VIN_SELECTOR);
        let options = first_text(&document, OPTIONS_SELECTOR);
        let details = parse_details(&document);

        Ok(ListingRecord {
            listing_id: reference.listing_id().to_string(),
            year,
            make,
            model,
            vin,
            price,
            is_exchangeable: pricing_attributes.contains("exchange"),
            pay_with_installments: pricing_attributes.contains("installments"),
            is_urgent,
            insert_date,
            location,
            seller_id,
            details,
            options,
        })
    }
}

/// Year, make and model from the last three linked heading segments
fn parse_vehicle_identity(document: &Html) -> Result<(u16, String, String), ParseError> {
    let segments = select_all(document, HEADING_LINK_SELECTOR);
    if segments.len() < 3 {
        return Err(ParseError::TooFewEntries {
            field: "year/make/model",
            expected: 3,
            found: segments.len(),
        });
    }

    let tail = &segments[segments.len() - 3..];
    let year_text = text_of(tail[0]);
    let year = year_text.parse().map_err(|_| ParseError::Malformed {
        field: "year",
        value: year_text.clone(),
    })?;

    Ok((year, text_of(tail[1]), text_of(tail[2])))
}

fn parse_price(document: &Html) -> Result<String, ParseError> {
    let raw = select_all(document, PRICE_SELECTOR)
        .into_iter()
        .next()
        .map(|element| element.text().collect::<String>())
        .ok_or(ParseError::MissingElement { field: "price" })?;

    let price: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if price.is_empty() {
        return Err(ParseError::Malformed {
            field: "price",
            value: raw,
        });
    }

    Ok(price)
}

fn parse_seller_id(document: &Html) -> Result<String, ParseError> {
    let seller = select_all(document, SELLER_SELECTOR)
        .into_iter()
        .next()
        .ok_or(ParseError::MissingElement { field: "seller_id" })?;

    seller
        .value()
        .attr(SELLER_ID_ATTRIBUTE)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(ParseError::MissingAttribute {
            field: "seller_id",
            attribute: SELLER_ID_ATTRIBUTE,
        })
}

/// Location is the part after the first comma ("Armenia, Yerevan" -> "Yerevan")
fn parse_location(text: &str) -> Option<String> {
    text.split_once(',')
        .map(|(_, rest)| rest.trim().to_string())
        .filter(|location| !location.is_empty())
}

/// Normalizes the insert date, accepting a label around the date ("Added 07.03.2024")
fn parse_insert_date(text: &str) -> Option<NaiveDate> {
    let cleaned = text.replace(',', " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();

    for token in &tokens {
        for format in NUMERIC_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(token, format) {
                return Some(date);
            }
        }
    }

    for window in tokens.windows(3) {
        let candidate = window.join(" ");
        for format in WORDED_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(&candidate, format) {
                return Some(date);
            }
        }
    }

    None
}

/// Reads the details table into lower-snake-case keys
fn parse_details(document: &Html) -> BTreeMap<String, String> {
    let mut details = BTreeMap::new();

    for row in select_all(document, DETAILS_ROW_SELECTOR) {
        let cells = select_in(row, "td");
        if cells.len() < 2 {
            continue;
        }

        let key = normalize_detail_key(&cells[0].text().collect::<String>());
        if key.is_empty() {
            continue;
        }

        // Prefer the nested value element over the cell's full text
        let value = select_in(cells[1], "span")
            .into_iter()
            .next()
            .map(|span| span.text().collect::<String>())
            .unwrap_or_else(|| cells[1].text().collect::<String>());

        details.insert(key, normalize_detail_value(&value));
    }

    split_mileage(&mut details);
    details
}

fn normalize_detail_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

fn normalize_detail_value(raw: &str) -> String {
    raw.trim().to_lowercase().trim_matches('"').trim().to_string()
}

/// Splits "125000 km" into `mileage` = "125000" and `mileage_measurement` = "km"
///
/// Does nothing when the details table has no mileage row.
pub(crate) fn split_mileage(details: &mut BTreeMap<String, String>) {
    let Some(raw) = details.get(MILEAGE_KEY).cloned() else {
        return;
    };

    let mut tokens = raw.split_whitespace().peekable();
    let mut number = String::new();
    while let Some(token) = tokens.peek() {
        if !token.starts_with(|c: char| c.is_ascii_digit()) {
            break;
        }
        number.push_str(token);
        tokens.next();
    }

    if number.is_empty() {
        tracing::debug!("Mileage '{}' has no numeric part, leaving as is", raw);
        return;
    }

    details.insert(MILEAGE_KEY.to_string(), number);
    if let Some(unit) = tokens.next() {
        details.insert(MILEAGE_MEASUREMENT_KEY.to_string(), unit.to_string());
    }
}

fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn select_in<'a>(element: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => element.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Trimmed text of the first match, `None` when absent or blank
fn first_text(document: &Html, css: &str) -> Option<String> {
    select_all(document, css)
        .into_iter()
        .next()
        .map(text_of)
        .filter(|text| !text.is_empty())
}
