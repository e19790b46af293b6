//! Error type shared by every stage of the fetcher.

use std::path::PathBuf;

/// All errors that can occur while acquiring or assembling a book.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// Bad input from the caller (unparsable URL, empty template).
    #[error("Usage error: {0}")]
    Usage(String),

    /// The page failed to load (network, certificate, or protocol failure).
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// A script ran in the page but its result could not be decoded.
    #[error("Script error: {0}")]
    Script(String),

    /// A deadline expired before the operation finished.
    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// The book payload decoded but held no entries.
    #[error("Page payload contains no book data")]
    NoBookData,

    /// The book payload could not be decoded.
    #[error("Page payload is not a valid book response: {0}")]
    NoResponse(String),

    /// No stream manifest was observed while the page rendered.
    #[error("No content locator was intercepted")]
    NoLocator,

    /// The output path is already occupied.
    #[error("File already exists: {}", .0.display())]
    FileExists(PathBuf),

    /// An external tool exited unsuccessfully.
    #[error("External tool failed with exit code {}", exit_code_label(.code))]
    ProcessFailure { code: Option<i32> },

    /// The run was interrupted.
    #[error("Cancelled")]
    Cancelled,

    #[error("Browser not available: {0}")]
    BrowserUnavailable(String),

    #[error("External tool not available: {0}")]
    ToolUnavailable(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FetchError {
    /// Page-level failures that a reload or a pause may fix.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Navigation(_) | FetchError::Script(_) | FetchError::Timeout(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Http(e.to_string())
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none (killed by signal)".to_string(),
    }
}

/// Convenience result type.
pub type FetchResult<T> = Result<T, FetchError>;
