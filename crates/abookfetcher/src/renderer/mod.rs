//! Renderer abstraction for script-driven book pages.
//!
//! Defines the `PageRenderer` trait that abstracts over the browser engine
//! (currently Chromium via chromiumoxide). Methods take `&mut self`: one
//! renderer is driven by one caller at a time.

pub mod chromium;
pub mod interceptor;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{FetchError, FetchResult};

/// Script returning the fully rendered document.
pub const OUTER_HTML_SCRIPT: &str = "document.documentElement.outerHTML.toString()";

/// Launch options for a browser-backed renderer.
#[derive(Debug, Clone)]
pub struct RendererOptions {
    /// Explicit browser executable; discovered when `None`.
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    /// Deadline for a single navigation or reload.
    pub navigation_timeout: Duration,
    /// Directory that holds the throwaway browser profile.
    pub profile_root: PathBuf,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            chromium_path: None,
            headless: true,
            navigation_timeout: Duration::from_secs(60),
            profile_root: std::env::temp_dir(),
        }
    }
}

/// A loaded page that can be queried through scripts.
#[async_trait]
pub trait PageRenderer: Send {
    /// Navigate to `url` and wait for the navigation to finish.
    async fn load(&mut self, url: &Url) -> FetchResult<()>;
    /// Reload the current page in place.
    async fn reload(&mut self) -> FetchResult<()>;
    /// Run a script in the page and return its JSON-decoded result.
    async fn evaluate(&mut self, script: &str) -> FetchResult<serde_json::Value>;
    /// Tear down the page and its browser.
    async fn close(self: Box<Self>) -> FetchResult<()>;
}

/// Run a script that must produce a string.
pub async fn evaluate_string<R>(renderer: &mut R, script: &str) -> FetchResult<String>
where
    R: PageRenderer + ?Sized,
{
    match renderer.evaluate(script).await? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(FetchError::Script(format!(
            "expected a string from `{script}`, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
