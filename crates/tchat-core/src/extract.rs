//! Parsing of a single chatbox `<li>` entry.

use crate::error::ExtractionError;
use crate::markup::normalize;
use crate::record::{ChatRecord, RawFragment, UNKNOWN_TIME};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

pub const DEFAULT_MAX_FRAGMENT_BYTES: usize = 256 * 1024;

const AUTHOR_SELECTOR: &str = "header address a span";
const TIME_SELECTOR: &str = "header time";
const BODY_SELECTOR: &str = "section.chatbox-message__content";
const TIME_ATTR: &str = "title";

const DISPLAY_FORMAT: &str = "%H:%M:%S";
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

struct EntrySelectors {
    author: Selector,
    time: Selector,
    body: Selector,
}

fn selectors() -> Result<&'static EntrySelectors, ExtractionError> {
    static SELECTORS: OnceLock<Result<EntrySelectors, String>> = OnceLock::new();
    SELECTORS
        .get_or_init(|| {
            let parse = |css: &str| Selector::parse(css).map_err(|err| format!("{css}: {err}"));
            Ok(EntrySelectors {
                author: parse(AUTHOR_SELECTOR)?,
                time: parse(TIME_SELECTOR)?,
                body: parse(BODY_SELECTOR)?,
            })
        })
        .as_ref()
        .map_err(|err| ExtractionError::Selector(err.clone()))
}

/// Fields pulled out of a fragment, before markup normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub display_time: String,
    pub author: String,
    pub body: String,
}

impl RawEntry {
    pub fn into_record(self) -> ChatRecord {
        let body = normalize(&self.body);
        ChatRecord::new(self.display_time, self.author, body)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    max_fragment_bytes: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAGMENT_BYTES)
    }
}

impl Extractor {
    pub fn new(max_fragment_bytes: usize) -> Self {
        Self { max_fragment_bytes }
    }

    /// `Ok(None)` means the entry has no visible body and should be skipped.
    pub fn extract(&self, fragment: &RawFragment) -> Result<Option<RawEntry>, ExtractionError> {
        if fragment.len() > self.max_fragment_bytes {
            return Err(ExtractionError::Oversized {
                size: fragment.len(),
                max: self.max_fragment_bytes,
            });
        }
        if fragment.is_empty() {
            return Ok(None);
        }

        let selectors = selectors()?;
        let doc = Html::parse_fragment(fragment.as_str());

        let body = match doc.select(&selectors.body).next() {
            Some(el) => element_text(el),
            None => return Ok(None),
        };
        if body.is_empty() {
            return Ok(None);
        }

        let author = doc
            .select(&selectors.author)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let display_time = doc
            .select(&selectors.time)
            .next()
            .and_then(|el| el.value().attr(TIME_ATTR))
            .map(|raw| display_time(raw.trim()))
            .unwrap_or_else(|| UNKNOWN_TIME.to_string());

        Ok(Some(RawEntry {
            display_time,
            author,
            body,
        }))
    }
}

pub fn extract(fragment: &RawFragment) -> Result<Option<RawEntry>, ExtractionError> {
    Extractor::default().extract(fragment)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// `HH:MM:SS` of an ISO-8601 timestamp as written, or the input verbatim
/// when it does not parse.
pub fn display_time(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(DISPLAY_FORMAT).to_string();
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return dt.format(DISPLAY_FORMAT).to_string();
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return dt.format(DISPLAY_FORMAT).to_string();
        }
    }
    if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() {
        return "00:00:00".to_string();
    }
    raw.to_string()
}
