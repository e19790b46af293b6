//! Chromium-based renderer using chromiumoxide.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use super::interceptor::{Interceptor, RequestCallback};
use super::{PageRenderer, RendererOptions};
use crate::error::{FetchError, FetchResult};

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. ~/.abookfetcher/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".abookfetcher/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".abookfetcher/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".abookfetcher/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".abookfetcher/chromium/chrome-linux64/chrome"),
                home.join(".abookfetcher/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A single Chromium page with request interception attached.
///
/// Each renderer launches its own incognito browser with a throwaway profile
/// directory, so nothing persists between runs.
pub struct ChromiumRenderer {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    interceptor: Option<Interceptor>,
    profile_dir: PathBuf,
    navigation_timeout: Duration,
}

impl ChromiumRenderer {
    /// Launch a browser and open a blank page that reports every
    /// sub-resource request to `on_request`.
    pub async fn launch(options: &RendererOptions, on_request: RequestCallback) -> FetchResult<Self> {
        let chrome_path = options
            .chromium_path
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| {
                FetchError::BrowserUnavailable(
                    "Chromium not found. Install Chrome/Chromium or set ABOOK_CHROMIUM_PATH."
                        .to_string(),
                )
            })?;

        let profile_dir = profile_dir_in(&options.profile_root);

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&profile_dir)
            .incognito()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--mute-audio");
        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| FetchError::BrowserUnavailable(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::BrowserUnavailable(format!("failed to launch Chromium: {e}")))?;

        // Spawn the handler task
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(FetchError::BrowserUnavailable(format!(
                    "failed to create new page: {e}"
                )));
            }
        };

        let interceptor = match Interceptor::attach(&page, on_request).await {
            Ok(i) => i,
            Err(e) => {
                handler.abort();
                return Err(e);
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
            interceptor: Some(interceptor),
            profile_dir,
            navigation_timeout: options.navigation_timeout,
        })
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn load(&mut self, url: &Url) -> FetchResult<()> {
        debug!("navigating to {url}");
        let page = &self.page;
        let navigation = async {
            page.goto(url.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(self.navigation_timeout, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(FetchError::Navigation(format!("{url}: {e}"))),
            Err(_) => Err(FetchError::Timeout(self.navigation_timeout)),
        }
    }

    async fn reload(&mut self) -> FetchResult<()> {
        debug!("reloading page");
        match tokio::time::timeout(self.navigation_timeout, self.page.reload()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(FetchError::Navigation(format!("reload failed: {e}"))),
            Err(_) => Err(FetchError::Timeout(self.navigation_timeout)),
        }
    }

    async fn evaluate(&mut self, script: &str) -> FetchResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| FetchError::Script(format!("JS execution failed: {e}")))?;

        result
            .into_value()
            .map_err(|e| FetchError::Script(format!("failed to convert JS result: {e}")))
    }

    async fn close(mut self: Box<Self>) -> FetchResult<()> {
        self.interceptor.take();
        let _ = self.page.clone().close().await;
        if let Err(e) = self.browser.close().await {
            debug!("browser close: {e}");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        remove_profile(&self.profile_dir);
        Ok(())
    }
}

impl Drop for ChromiumRenderer {
    fn drop(&mut self) {
        self.handler.abort();
        remove_profile(&self.profile_dir);
    }
}

/// A fresh, uniquely named profile directory under `root`.
fn profile_dir_in(root: &Path) -> PathBuf {
    root.join(format!("abookfetcher-profile-{}", uuid::Uuid::new_v4()))
}

fn remove_profile(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove browser profile {}: {e}", dir.display());
        }
    }
}
