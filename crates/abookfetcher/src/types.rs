//! Core data types for a fetched audiobook.

use serde::{Deserialize, Serialize};
use url::Url;

/// Chapter offsets are stored in nanoseconds, the ffmetadata default timebase.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Normalized description of one audiobook, built once by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDescriptor {
    pub title: String,
    pub authors: Vec<String>,
    pub narrators: Vec<String>,
    pub description: String,
    pub chapters: Vec<Chapter>,
    pub cover_url: Url,
    pub content: ContentRef,
    pub source_url: Url,
    pub genres: Vec<String>,
    pub series: Option<Series>,
}

impl BookDescriptor {
    /// First listed author, if the page named any.
    pub fn primary_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    /// First listed narrator, if the page named any.
    pub fn primary_narrator(&self) -> Option<&str> {
        self.narrators.first().map(String::as_str)
    }
}

/// A chapter marker. Offsets are in nanoseconds from the start of the media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: Option<String>,
    pub start: u64,
    pub end: u64,
}

/// Series membership parsed from a "Name (Number)" link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub number: u32,
}

/// Where the primary audio content lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ContentRef {
    /// An HLS playlist (`.m3u8`) that ffmpeg can remux directly.
    Playlist { url: Url },
}

/// A sub-resource request observed while a page renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub url: String,
    pub method: String,
    pub resource_type: Option<String>,
}

impl InterceptedRequest {
    /// True when the request URL path ends in the given extension.
    pub fn has_extension(&self, ext: &str) -> bool {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .and_then(|last| {
                last.rsplit_once('.')
                    .map(|(_, e)| e.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}
