//! Page acquisition: render the book page, intercept the stream manifest,
//! read the scripted payload, and hand everything to the extractor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::extract::{extract_descriptor, PageCapture};
use crate::orchestrator::{pause, retry_loop, wait, RetryPolicy};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::interceptor::RequestCallback;
use crate::renderer::{evaluate_string, PageRenderer, RendererOptions, OUTER_HTML_SCRIPT};
use crate::types::{BookDescriptor, InterceptedRequest};

/// Script serializing the page's book payload.
pub const BOOK_DATA_SCRIPT: &str = "JSON.stringify(bookData)";

/// Extension of the streaming manifest requested by the page player.
pub const LOCATOR_EXTENSION: &str = "m3u8";

/// A renderer shared between retry bodies and corrective hooks.
///
/// The mutex serializes every call: attempts and hooks never overlap.
pub type SharedRenderer = Arc<Mutex<Box<dyn PageRenderer>>>;

/// Produces a descriptor for a book URL.
#[async_trait]
pub trait BookLoader: Send + Sync {
    async fn load(&self, url: &Url, cancel: &CancellationToken) -> FetchResult<BookDescriptor>;
}

/// Retry settings for the acquisition phase.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    /// Attempts and per-attempt wait for the intercepted manifest.
    pub locator: RetryPolicy,
    /// Attempts and per-attempt deadline for reading the payload.
    pub payload: RetryPolicy,
    /// Pause between payload attempts.
    pub payload_backoff: Duration,
    /// Payloads shorter than this are treated as not yet populated.
    pub min_payload_len: usize,
    /// Page loads attempted before navigation fails for good.
    pub navigation_attempts: u32,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            locator: RetryPolicy::new(3, Duration::from_secs(30)),
            payload: RetryPolicy::new(3, Duration::from_secs(10)),
            payload_backoff: Duration::from_secs(1),
            min_payload_len: 32,
            navigation_attempts: 3,
        }
    }
}

/// Build the request callback that publishes the first manifest URL seen.
pub fn locator_channel() -> (RequestCallback, watch::Receiver<Option<Url>>) {
    let (tx, rx) = watch::channel(None);
    let callback: RequestCallback = Arc::new(move |request: InterceptedRequest| {
        debug!("got {}", request.url);
        if !request.has_extension(LOCATOR_EXTENSION) {
            return;
        }
        let Ok(url) = Url::parse(&request.url) else {
            return;
        };
        tx.send_if_modified(|current| {
            if current.is_none() {
                info!("intercepted content locator {url}");
                *current = Some(url);
                true
            } else {
                false
            }
        });
    });
    (callback, rx)
}

/// Drive a loaded renderer through the acquisition sequence.
pub async fn capture_page(
    renderer: &SharedRenderer,
    locators: watch::Receiver<Option<Url>>,
    url: &Url,
    settings: &LoaderSettings,
    cancel: &CancellationToken,
) -> FetchResult<PageCapture> {
    info!("Loading {url}");
    retry_loop(
        settings.navigation_attempts,
        cancel,
        FetchError::is_retryable,
        |_| {
            let renderer = Arc::clone(renderer);
            let url = url.clone();
            async move {
                let mut guard = renderer.lock().await;
                let loaded = guard.load(&url).await;
                loaded
            }
        },
        |_| pause(settings.payload_backoff, cancel),
    )
    .await?;

    info!("Getting book data");
    let payload = retry_loop(
        settings.payload.max_attempts,
        cancel,
        FetchError::is_retryable,
        |_| read_payload(renderer, settings, cancel),
        |_| pause(settings.payload_backoff, cancel),
    )
    .await?;

    info!("Getting html");
    let html = retry_loop(
        settings.payload.max_attempts,
        cancel,
        FetchError::is_retryable,
        |_| read_html(renderer, settings, cancel),
        |_| pause(settings.payload_backoff, cancel),
    )
    .await?;

    info!("Getting content locator");
    let locator = retry_loop(
        settings.locator.max_attempts,
        cancel,
        |e| matches!(e, FetchError::Timeout(_)),
        |_| {
            let mut locators = locators.clone();
            wait(settings.locator.timeout, cancel, |_| async move {
                let found = locators
                    .wait_for(Option::is_some)
                    .await
                    .map_err(|_| FetchError::NoLocator)?;
                found.clone().ok_or(FetchError::NoLocator)
            })
        },
        |_| {
            let renderer = Arc::clone(renderer);
            async move {
                info!("Retrying content locator...");
                let mut guard = renderer.lock().await;
                let reloaded = guard.reload().await;
                reloaded
            }
        },
    )
    .await?;

    Ok(PageCapture {
        html,
        payload,
        locator,
        source_url: url.clone(),
    })
}

async fn read_payload(
    renderer: &SharedRenderer,
    settings: &LoaderSettings,
    cancel: &CancellationToken,
) -> FetchResult<String> {
    let min_len = settings.min_payload_len;
    let renderer = Arc::clone(renderer);
    wait(settings.payload.timeout, cancel, |_| async move {
        let mut guard = renderer.lock().await;
        let payload = evaluate_string(&mut **guard, BOOK_DATA_SCRIPT).await?;
        if payload.len() < min_len {
            return Err(FetchError::Script(format!(
                "book data too short ({} bytes, need {min_len})",
                payload.len()
            )));
        }
        Ok(payload)
    })
    .await
}

async fn read_html(
    renderer: &SharedRenderer,
    settings: &LoaderSettings,
    cancel: &CancellationToken,
) -> FetchResult<String> {
    let renderer = Arc::clone(renderer);
    wait(settings.payload.timeout, cancel, |_| async move {
        let mut guard = renderer.lock().await;
        let html = evaluate_string(&mut **guard, OUTER_HTML_SCRIPT).await;
        html
    })
    .await
}

/// Close a shared renderer once every borrower is gone.
pub async fn close_renderer(renderer: SharedRenderer) {
    match Arc::try_unwrap(renderer) {
        Ok(mutex) => {
            if let Err(e) = mutex.into_inner().close().await {
                warn!("failed to close renderer: {e}");
            }
        }
        Err(_) => warn!("renderer still shared; leaving it to drop"),
    }
}

/// Loader backed by a headless Chromium instance per book.
pub struct SiteLoader {
    renderer_options: RendererOptions,
    settings: LoaderSettings,
}

impl SiteLoader {
    pub fn new(renderer_options: RendererOptions, settings: LoaderSettings) -> Self {
        Self {
            renderer_options,
            settings,
        }
    }
}

#[async_trait]
impl BookLoader for SiteLoader {
    async fn load(&self, url: &Url, cancel: &CancellationToken) -> FetchResult<BookDescriptor> {
        let (callback, locators) = locator_channel();
        let renderer = ChromiumRenderer::launch(&self.renderer_options, callback).await?;
        let renderer: Box<dyn PageRenderer> = Box::new(renderer);
        let shared: SharedRenderer = Arc::new(Mutex::new(renderer));

        let capture = capture_page(&shared, locators, url, &self.settings, cancel).await;
        close_renderer(shared).await;

        extract_descriptor(&capture?)
    }
}
