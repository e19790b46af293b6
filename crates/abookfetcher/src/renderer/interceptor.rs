//! Passive observation of sub-resource requests.
//!
//! The interceptor listens to `Network.requestWillBeSent` and hands each
//! request to a callback supplied with the renderer. It never pauses,
//! rewrites, or blocks requests; the Fetch domain is left disabled.

use std::collections::HashSet;
use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::error::{FetchError, FetchResult};
use crate::types::InterceptedRequest;

/// Callback invoked once per observed request, in receipt order.
pub type RequestCallback = Arc<dyn Fn(InterceptedRequest) + Send + Sync>;

/// Forwards requests to the callback, dropping repeats.
///
/// A request is identified by its CDP request id plus URL, so redirect hops
/// are each reported once.
pub struct RequestDispatcher {
    callback: RequestCallback,
    seen: HashSet<(String, String)>,
}

impl RequestDispatcher {
    pub fn new(callback: RequestCallback) -> Self {
        Self {
            callback,
            seen: HashSet::new(),
        }
    }

    /// Report a request. Returns false if it was already reported.
    pub fn dispatch(&mut self, request_id: &str, request: InterceptedRequest) -> bool {
        if !self
            .seen
            .insert((request_id.to_string(), request.url.clone()))
        {
            return false;
        }
        trace!("intercepted {} {}", request.method, request.url);
        (self.callback)(request);
        true
    }
}

/// Background listener bound to one page. Stops when dropped.
pub struct Interceptor {
    task: JoinHandle<()>,
}

impl Interceptor {
    /// Subscribe to the page's request events.
    ///
    /// Failing to subscribe is fatal: a load without interception cannot
    /// discover the content locator.
    pub async fn attach(page: &Page, callback: RequestCallback) -> FetchResult<Self> {
        let mut events = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| {
                FetchError::BrowserUnavailable(format!("failed to register request listener: {e}"))
            })?;

        let mut dispatcher = RequestDispatcher::new(callback);
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let request = InterceptedRequest {
                    url: event.request.url.clone(),
                    method: event.request.method.clone(),
                    resource_type: event.r#type.as_ref().map(|t| format!("{t:?}")),
                };
                dispatcher.dispatch(event.request_id.inner(), request);
            }
        });

        Ok(Self { task })
    }
}

impl Drop for Interceptor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
