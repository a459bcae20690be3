//! Numeric field extraction from quote pages.
//!
//! Each field owns an ordered list of lookups. The first lookup that finds
//! a node whose text parses as a number wins; a node with junk text just
//! hands over to the next lookup.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CurrentPrice,
    PreviousClose,
    Week52High,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::CurrentPrice => "current_price",
            Field::PreviousClose => "previous_close",
            Field::Week52High => "52_week_high",
        })
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// "1,234.56" → 1234.56 | "N/A" → None
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "N/A" || s == "-" || s == "—" {
        return None;
    }
    s.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn compile(selector: &str) -> Result<Selector, ExtractorError> {
    Selector::parse(selector).map_err(|e| ExtractorError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

// ── Lookups ───────────────────────────────────────────────────────────────────

/// One way of locating a field's node in a document.
pub trait Lookup: Send + Sync {
    /// Text of the located node, if the lookup finds one.
    fn locate(&self, doc: &Html) -> Option<String>;

    fn describe(&self) -> String;
}

/// First element matching a CSS selector.
pub struct CssLookup {
    raw: String,
    selector: Selector,
}

impl CssLookup {
    pub fn new(selector: &str) -> Result<Self, ExtractorError> {
        Ok(Self {
            raw: selector.to_string(),
            selector: compile(selector)?,
        })
    }
}

impl Lookup for CssLookup {
    fn locate(&self, doc: &Html) -> Option<String> {
        doc.select(&self.selector).next().map(text_of)
    }

    fn describe(&self) -> String {
        self.raw.clone()
    }
}

/// Value element that follows a label, e.g. `<dt>Prev. Close</dt><dd>9.10</dd>`.
///
/// A label matches when every term of at least one group occurs in its text.
pub struct LabelledLookup {
    raw: String,
    label: Selector,
    value_tag: String,
    term_groups: Vec<Vec<String>>,
}

impl LabelledLookup {
    pub fn new(label: &str, value_tag: &str, term_groups: &[&[&str]]) -> Result<Self, ExtractorError> {
        Ok(Self {
            raw: format!("{} + {} {:?}", label, value_tag, term_groups),
            label: compile(label)?,
            value_tag: value_tag.to_string(),
            term_groups: term_groups
                .iter()
                .map(|g| g.iter().map(|t| t.to_string()).collect())
                .collect(),
        })
    }

    fn matches(&self, label_text: &str) -> bool {
        self.term_groups
            .iter()
            .any(|group| group.iter().all(|term| label_text.contains(term.as_str())))
    }
}

impl Lookup for LabelledLookup {
    fn locate(&self, doc: &Html) -> Option<String> {
        doc.select(&self.label)
            .filter(|label| self.matches(&text_of(*label)))
            .find_map(|label| {
                label
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|sib| sib.value().name() == self.value_tag)
            })
            .map(text_of)
    }

    fn describe(&self) -> String {
        self.raw.clone()
    }
}

// ── Extractor ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtractedFields {
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub week_52_high: Option<f64>,
}

#[derive(Default)]
pub struct Extractor {
    strategies: HashMap<Field, Vec<Box<dyn Lookup>>>,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a lookup at the lowest priority for `field`.
    pub fn with_lookup(mut self, field: Field, lookup: impl Lookup + 'static) -> Self {
        self.strategies.entry(field).or_default().push(Box::new(lookup));
        self
    }

    /// Lookups for investing.com equity pages, most specific first.
    pub fn investing_com() -> Result<Self, ExtractorError> {
        let dt = "dt.text-left";
        Ok(Self::new()
            .with_lookup(Field::CurrentPrice, CssLookup::new(r#"span[data-test="instrument-price-last"]"#)?)
            .with_lookup(Field::CurrentPrice, CssLookup::new("span.text-2xl")?)
            .with_lookup(Field::CurrentPrice, CssLookup::new(r#"[class*="instrument-price"]"#)?)
            .with_lookup(
                Field::PreviousClose,
                LabelledLookup::new(dt, "dd", &[&["Prev. Close"], &["Previous Close"]])?,
            )
            .with_lookup(Field::PreviousClose, CssLookup::new(r#"[data-test="prevClose"]"#)?)
            .with_lookup(Field::Week52High, LabelledLookup::new(dt, "dd", &[&["52", "High"]])?))
    }

    pub fn extract(&self, doc: &Html, field: Field) -> Option<f64> {
        let lookups = self.strategies.get(&field)?;

        for lookup in lookups {
            let Some(text) = lookup.locate(doc) else {
                continue;
            };
            match parse_number(&text) {
                Some(v) => return Some(v),
                None => debug!(
                    "{}: `{}` matched unparseable text {:?}",
                    field,
                    lookup.describe(),
                    text.trim()
                ),
            }
        }
        None
    }

    pub fn extract_page(&self, html: &str) -> ExtractedFields {
        let doc = Html::parse_document(html);
        ExtractedFields {
            current_price: self.extract(&doc, Field::CurrentPrice),
            previous_close: self.extract(&doc, Field::PreviousClose),
            week_52_high: self.extract(&doc, Field::Week52High),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
