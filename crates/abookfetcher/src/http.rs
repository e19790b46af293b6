//! Async HTTP client wrapping reqwest.
//!
//! Used for the cover image. Retries transport errors and 5xx responses
//! with exponential backoff; any other non-2xx status is an error.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::orchestrator::pause;

/// Browser user-agent presented to the book site and its CDN.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                              AppleWebKit/605.1.15 (KHTML, like Gecko) \
                              Version/17.5 Safari/605.1.15";

const MAX_RETRIES: u32 = 2;

/// Outcome of one request attempt.
enum Attempt {
    Transient(FetchError),
    Fatal(FetchError),
}

/// HTTP client for downloads outside the browser.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a new HTTP client with the browser user-agent.
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Download `url` into `destination`, returning the number of bytes written.
    pub async fn download(
        &self,
        url: &Url,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> FetchResult<u64> {
        debug!("fetching {url}");
        let mut retries = 0u32;

        let body = loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                r = self.get_bytes(url) => r,
            };

            match attempt {
                Ok(bytes) => break bytes,
                Err(Attempt::Transient(e)) if retries < MAX_RETRIES => {
                    retries += 1;
                    let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                    debug!("retrying {url} in {delay:?}: {e}");
                    pause(delay, cancel).await?;
                }
                Err(Attempt::Transient(e)) | Err(Attempt::Fatal(e)) => return Err(e),
            }
        };

        tokio::fs::write(destination, &body).await?;
        Ok(body.len() as u64)
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, Attempt> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Attempt::Transient(e.into()))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(Attempt::Transient(FetchError::Http(format!("{url}: {status}"))));
        }
        if !status.is_success() {
            return Err(Attempt::Fatal(FetchError::Http(format!("{url}: {status}"))));
        }

        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Attempt::Transient(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    /// Whole-value comparison; the agent string contains commas, which the
    /// stock header matcher would split on.
    fn sends_user_agent(request: &Request) -> bool {
        request
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            == Some(USER_AGENT)
    }

    #[tokio::test]
    async fn test_download_writes_body_with_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cover.jpg"))
            .and(sends_user_agent)
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cover.download");
        let url = Url::parse(&format!("{}/cover.jpg", server.uri())).unwrap();
        let client = HttpClient::new(Duration::from_secs(5)).unwrap();

        let n = client
            .download(&url, &dest, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![1u8, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_download_not_found_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&format!("{}/missing.jpg", server.uri())).unwrap();
        let client = HttpClient::new(Duration::from_secs(5)).unwrap();

        let err = client
            .download(&url, &dir.path().join("x"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Http(ref m) if m.contains("404")));
    }

    #[tokio::test]
    async fn test_download_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(u64::from(MAX_RETRIES) + 1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&format!("{}/flaky.jpg", server.uri())).unwrap();
        let client = HttpClient::new(Duration::from_secs(5)).unwrap();

        let err = client
            .download(&url, &dir.path().join("x"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Http(ref m) if m.contains("503")));
    }
}
