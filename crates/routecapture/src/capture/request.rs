//! Direct HTTP capture front-end wrapping reqwest.
//!
//! Not a browser: one GET, no script execution.

use super::{CaptureResult, PageCapturer};
use crate::error::{Result, RouteCaptureError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

/// Build the HTTP client shared by request capture and script fetching.
pub fn build_client(insecure: bool, timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(insecure)
        .build()?;
    Ok(client)
}

/// Captures a page with a single HTTP GET.
#[derive(Clone)]
pub struct RequestPageCapturer {
    client: reqwest::Client,
}

impl RequestPageCapturer {
    pub fn new(insecure: bool, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(insecure, timeout)?,
        })
    }

    /// The underlying client, for follow-up fetches under the same settings.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl PageCapturer for RequestPageCapturer {
    async fn capture(&mut self, url: &str) -> Result<CaptureResult> {
        let mut result = CaptureResult::new(url);

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RouteCaptureError::capture(url, e))?;

        let status = resp.status().as_u16();
        debug!(target = %url, status, "request capture response");
        result.status = Some(status);

        match resp.bytes().await {
            Ok(body) => result.content = body.to_vec(),
            Err(e) => result.errors.push(format!("failed to read body of {url}: {e}")),
        }

        Ok(result)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_capture_returns_body_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><a href=\"/x\">x</a></html>"))
            .mount(&server)
            .await;

        let mut capturer = RequestPageCapturer::new(false, Duration::from_secs(5)).unwrap();
        let url = format!("{}/page", server.uri());
        let result = capturer.capture(&url).await.unwrap();

        assert_eq!(result.status, Some(200));
        assert_eq!(result.url, url);
        assert!(String::from_utf8_lossy(&result.content).contains("href=\"/x\""));
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_capture_keeps_non_200_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("<form action=\"/search\"></form>"))
            .mount(&server)
            .await;

        let mut capturer = RequestPageCapturer::new(false, Duration::from_secs(5)).unwrap();
        let result = capturer.capture(&server.uri()).await.unwrap();
        assert_eq!(result.status, Some(404));
        assert!(!result.content.is_empty());
    }

    #[tokio::test]
    async fn test_capture_transport_error_is_fatal() {
        let mut capturer = RequestPageCapturer::new(false, Duration::from_secs(2)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments.
        let err = capturer.capture("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, RouteCaptureError::Capture { .. }));
    }
}
