//! abookfetcher: download an audiobook from its web page into a tagged,
//! chaptered m4b.
//!
//! A headless browser renders the book page while a request interceptor
//! waits for the stream manifest; the page's scripted payload and markup are
//! turned into a [`BookDescriptor`], and ffmpeg does the remux, cover
//! transcode and final mux.

pub mod config;
pub mod doctor;
pub mod error;
pub mod extract;
pub mod http;
pub mod loader;
pub mod orchestrator;
pub mod pipeline;
pub mod process;
pub mod renderer;
pub mod types;

pub use config::FetcherConfig;
pub use error::{FetchError, FetchResult};
pub use loader::{BookLoader, SiteLoader};
pub use pipeline::{fetch_descriptor, Fetcher, PipelineStage};
pub use process::{FfmpegRunner, ToolRunner};
pub use types::{BookDescriptor, Chapter, ContentRef, Series};
