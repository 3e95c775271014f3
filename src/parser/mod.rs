//! Positional extraction from HTML pages without stable ids.
//!
//! A value is located by a chain of steps: select a node set by CSS class,
//! take the node at a fixed ordinal, optionally descend to the Nth child
//! element, take its text, pull the first numeric token. Every step can come
//! up empty and the chain then yields an extraction error for that field
//! only. Indexing past the end of a node set is never a panic.

use crate::constants::{
    SKISTAR_LATEST_FRAME, SKISTAR_THUMBNAIL_SUFFIX_LEN, SKISTAR_WEBCAM_FRAME_SELECTOR,
    SKISTAR_WEBCAM_IMAGE_ATTR, SKISTAR_WEBCAM_RANGE_ATTR,
};
use crate::error::{Result, ScraperError};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+\.?\d*").expect("numeric pattern is valid"));

const UNICODE_MINUS: char = '\u{2212}';

/// First numeric token in `text`, e.g. `"-2.3°C"` gives `-2.3`.
pub fn extract_number(text: &str) -> Option<f64> {
    let normalized = text.replace(UNICODE_MINUS, "-");
    NUMBER_RE
        .find(&normalized)
        .and_then(|m| m.as_str().trim_end_matches('.').parse::<f64>().ok())
}

pub fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScraperError::Config(format!("invalid selector {}: {:?}", css, e)))
}

/// Where one value sits on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPosition {
    pub selector: &'static str,
    pub ordinal: usize,
    /// Child element index inside the selected node, when the value is nested
    pub child: Option<usize>,
}

impl FieldPosition {
    pub const fn nth(selector: &'static str, ordinal: usize) -> Self {
        Self {
            selector,
            ordinal,
            child: None,
        }
    }

    pub const fn nth_child(selector: &'static str, ordinal: usize, child: usize) -> Self {
        Self {
            selector,
            ordinal,
            child: Some(child),
        }
    }
}

/// Nth element matching `selector`, or `None` when there are fewer.
pub fn nth_element<'a>(document: &'a Html, selector: &Selector, ordinal: usize) -> Option<ElementRef<'a>> {
    document.select(selector).nth(ordinal)
}

/// Nth child element of `parent`, skipping text nodes.
pub fn nth_child_element<'a>(parent: ElementRef<'a>, index: usize) -> Option<ElementRef<'a>> {
    parent.children().filter_map(ElementRef::wrap).nth(index)
}

pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text at `position`, if every step of the chain finds its node.
pub fn text_at(document: &Html, position: &FieldPosition) -> Result<Option<String>> {
    let selector = parse_selector(position.selector)?;
    let Some(element) = nth_element(document, &selector, position.ordinal) else {
        return Ok(None);
    };
    let element = match position.child {
        Some(index) => match nth_child_element(element, index) {
            Some(child) => child,
            None => return Ok(None),
        },
        None => element,
    };
    Ok(Some(element_text(element)))
}

/// Numeric value at `position`. Fails with `FieldExtraction` naming the
/// step that came up empty.
pub fn number_at(document: &Html, field: &str, position: &FieldPosition) -> Result<f64> {
    let text = text_at(document, position)?.ok_or_else(|| ScraperError::FieldExtraction {
        field: field.to_string(),
        message: format!(
            "no element at {}[{}]{}",
            position.selector,
            position.ordinal,
            position.child.map(|c| format!(" child {}", c)).unwrap_or_default()
        ),
    })?;

    extract_number(&text).ok_or_else(|| ScraperError::FieldExtraction {
        field: field.to_string(),
        message: format!("no numeric token in {:?}", text),
    })
}

/// Full-size URL of the newest frame on a SkiStar webcam page.
///
/// The slider carries one hidden input per hourly frame; the newest one is
/// marked by its range value and its image URL ends in a thumbnail suffix.
pub fn latest_webcam_image_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = parse_selector(SKISTAR_WEBCAM_FRAME_SELECTOR).ok()?;

    let url = document
        .select(&selector)
        .find(|el| el.value().attr(SKISTAR_WEBCAM_RANGE_ATTR) == Some(SKISTAR_LATEST_FRAME))?
        .value()
        .attr(SKISTAR_WEBCAM_IMAGE_ATTR)?;

    let keep = url.chars().count().checked_sub(SKISTAR_THUMBNAIL_SUFFIX_LEN)?;
    let full: String = url.chars().take(keep).collect();
    if full.is_empty() {
        None
    } else {
        Some(full)
    }
}
