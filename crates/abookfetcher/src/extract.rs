//! Build a `BookDescriptor` from a rendered book page.
//!
//! Two inputs come from the page: the rendered HTML and the `bookData`
//! payload the page scripts publish. Only the payload is mandatory; every
//! HTML-derived field degrades to empty or absent when its markup is missing.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::types::{BookDescriptor, Chapter, ContentRef, Series, NANOS_PER_SECOND};

const COVER_SELECTOR: &str = "img.loaded";
const TITLE_SELECTOR: &str = "[itemprop=\"name\"]";
const AUTHOR_SELECTOR: &str = "[itemprop=\"author\"]";
const DESCRIPTION_SELECTOR: &str = "[itemprop=\"description\"]";
const NARRATOR_SELECTOR: &str = "a[href*=\"/performer/\"]";
const GENRE_SELECTOR: &str = "a.section__title, a[href*=\"/section/\"]";
const SERIES_SELECTOR: &str = "a[href*=\"/series/\"]";

/// One entry of the page's `bookData` map.
#[derive(Debug, Deserialize)]
struct BookData {
    #[serde(default)]
    items: Vec<BookItem>,
    preview: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BookItem {
    #[serde(default)]
    title: Option<String>,
    time_from_start: Seconds,
    time_finish: Seconds,
}

/// A second count as the payload encodes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Whole(u64),
    Fractional(f64),
    Text(String),
}

impl Seconds {
    fn to_nanos(&self) -> Option<u64> {
        match self {
            Seconds::Whole(s) => s.checked_mul(NANOS_PER_SECOND),
            Seconds::Fractional(f) => fractional_to_nanos(*f),
            Seconds::Text(t) => {
                let t = t.trim();
                match t.parse::<u64>() {
                    Ok(s) => s.checked_mul(NANOS_PER_SECOND),
                    Err(_) => t.parse::<f64>().ok().and_then(fractional_to_nanos),
                }
            }
        }
    }
}

fn fractional_to_nanos(secs: f64) -> Option<u64> {
    let nanos = (secs * NANOS_PER_SECOND as f64).round();
    (nanos.is_finite() && nanos >= 0.0 && nanos <= u64::MAX as f64).then_some(nanos as u64)
}

/// Everything the extractor needs from one page load.
#[derive(Debug, Clone)]
pub struct PageCapture {
    pub html: String,
    pub payload: String,
    pub locator: Url,
    pub source_url: Url,
}

/// Parse a captured page into a descriptor.
///
/// Fails with `NoResponse` when the payload is not a JSON map of book
/// records and with `NoBookData` when the map is empty.
pub fn extract_descriptor(capture: &PageCapture) -> FetchResult<BookDescriptor> {
    let book = decode_payload(&capture.payload)?;
    let document = Html::parse_document(&capture.html);

    let cover_url = select_cover(&document, &capture.source_url).unwrap_or_else(|| {
        resolve_url(&capture.source_url, &book.preview)
            .unwrap_or_else(|| capture.source_url.clone())
    });

    let title = select_texts(&document, TITLE_SELECTOR)
        .into_iter()
        .find(|t| !t.is_empty())
        .or_else(|| book.title.as_deref().map(|t| t.trim().to_string()))
        .unwrap_or_default();
    if title.is_empty() {
        warn!("no title found on {}", capture.source_url);
    }

    let authors = unique(select_texts(&document, AUTHOR_SELECTOR));
    let narrators = unique(select_texts(&document, NARRATOR_SELECTOR));
    let genres = unique(select_texts(&document, GENRE_SELECTOR));
    let description = select_block_texts(&document, DESCRIPTION_SELECTOR).join("\n");
    let series = select_texts(&document, SERIES_SELECTOR)
        .iter()
        .find_map(|text| parse_series(text));

    Ok(BookDescriptor {
        title,
        authors,
        narrators,
        description,
        chapters: build_chapters(&book.items),
        cover_url,
        content: ContentRef::Playlist {
            url: capture.locator.clone(),
        },
        source_url: capture.source_url.clone(),
        genres,
        series,
    })
}

fn decode_payload(payload: &str) -> FetchResult<BookData> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(payload.trim())
        .map_err(|e| FetchError::NoResponse(e.to_string()))?;
    let (key, first) = map.into_iter().next().ok_or(FetchError::NoBookData)?;
    serde_json::from_value(first).map_err(|e| FetchError::NoResponse(format!("entry {key}: {e}")))
}

fn build_chapters(items: &[BookItem]) -> Vec<Chapter> {
    let mut chapters = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match (item.time_from_start.to_nanos(), item.time_finish.to_nanos()) {
            (Some(start), Some(end)) => chapters.push(Chapter {
                title: item
                    .title
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
                start,
                end,
            }),
            _ => warn!("skipping chapter {i}: offsets out of range"),
        }
    }
    chapters
}

/// Parse "Name (Number)" into a series. Anything else yields `None`.
pub fn parse_series(text: &str) -> Option<Series> {
    static SERIES_RE: OnceLock<Regex> = OnceLock::new();
    let re = SERIES_RE
        .get_or_init(|| Regex::new(r"^\s*(.*?\S)\s*\((\d+)\)\s*$").expect("series regex is valid"));
    let caps = re.captures(text)?;
    Some(Series {
        name: caps[1].to_string(),
        number: caps[2].parse().ok()?,
    })
}

fn select_cover(document: &Html, base: &Url) -> Option<Url> {
    let sel = Selector::parse(COVER_SELECTOR).ok()?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("src"))
        .find_map(|src| resolve_url(base, src))
}

/// Parse `raw` as an absolute URL, or relative to `base`.
fn resolve_url(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => base.join(raw).ok(),
        Err(_) => None,
    }
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace-collapsed text of every element matching `selector`.
fn select_texts(document: &Html, selector: &str) -> Vec<String> {
    match Selector::parse(selector) {
        Ok(sel) => document.select(&sel).map(|el| element_text(&el)).collect(),
        Err(_) => Vec::new(),
    }
}

/// Like `select_texts` but keeps line structure inside each element.
fn select_block_texts(document: &Html, selector: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse(selector) else {
        return Vec::new();
    };
    document
        .select(&sel)
        .map(|el| {
            el.text()
                .collect::<String>()
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn unique(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}
