//! Chromium-based capture front-end using chromiumoxide.

use super::{CaptureResult, PageCapturer};
use crate::config::find_chromium;
use crate::error::{Result, RouteCaptureError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::Handler;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Grace period for shutting the browser down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Captures the rendered DOM of a page with a headless browser.
///
/// The browser is launched lazily on first use and owned until [`close`].
///
/// [`close`]: PageCapturer::close
pub struct BrowserPageCapturer {
    browser_path: Option<PathBuf>,
    timeout: Duration,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
}

impl BrowserPageCapturer {
    /// A capturer that launches a local browser on demand.
    pub fn new(browser_path: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            browser_path,
            timeout,
            browser: None,
            handler_task: None,
        }
    }

    /// A capturer bound to an already-running browser at a CDP websocket URL.
    pub async fn connect(ws_url: &str, timeout: Duration) -> Result<Self> {
        let (browser, handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| RouteCaptureError::Browser(format!("failed to connect to {ws_url}: {e}")))?;

        Ok(Self {
            browser_path: None,
            timeout,
            browser: Some(browser),
            handler_task: Some(spawn_handler(handler)),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Launch the browser if it is not running yet.
    pub async fn ensure_browser(&mut self) -> Result<&Browser> {
        if self.browser.is_none() {
            debug!("initializing browser");
            let (browser, handler) = launch(self.browser_path.clone()).await?;
            self.browser = Some(browser);
            self.handler_task = Some(spawn_handler(handler));
        }

        self.browser
            .as_ref()
            .ok_or_else(|| RouteCaptureError::Browser("browser not initialized".to_string()))
    }
}

async fn launch(browser_path: Option<PathBuf>) -> Result<(Browser, Handler)> {
    let mut builder = BrowserConfig::builder()
        .arg("--headless=new")
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions");

    if let Some(path) = browser_path.or_else(find_chromium) {
        info!(path = %path.display(), "launching browser");
        builder = builder.chrome_executable(path);
    }

    let config = builder
        .build()
        .map_err(|e| RouteCaptureError::Browser(format!("failed to build browser config: {e}")))?;

    Browser::launch(config)
        .await
        .map_err(|e| RouteCaptureError::Browser(format!("failed to launch browser: {e}")))
}

fn timed_out(url: &str, timeout: Duration) -> RouteCaptureError {
    RouteCaptureError::capture(url, format!("timed out after {}s", timeout.as_secs()))
}

/// Drive the CDP connection; chromiumoxide needs its handler polled.
fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!(error = %e, "browser handler error");
            }
        }
    })
}

#[async_trait]
impl PageCapturer for BrowserPageCapturer {
    async fn capture(&mut self, url: &str) -> Result<CaptureResult> {
        let timeout = self.timeout;
        let browser = self.ensure_browser().await?;

        let page = match tokio::time::timeout(timeout, browser.new_page("about:blank")).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return Err(RouteCaptureError::capture(url, e)),
            Err(_) => return Err(timed_out(url, timeout)),
        };

        let render = async {
            page.goto(url).await?;
            // Let redirects settle before reading the DOM.
            if let Err(e) = page.wait_for_navigation().await {
                debug!(target = %url, error = %e, "wait for navigation failed");
            }
            page.content().await
        };
        let rendered = tokio::time::timeout(timeout, render).await;

        // The page is closed on every path, including timeout.
        if let Err(e) = page.close().await {
            debug!(target = %url, error = %e, "failed to close page");
        }

        let html = match rendered {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => return Err(RouteCaptureError::capture(url, e)),
            Err(_) => return Err(timed_out(url, timeout)),
        };

        let mut result = CaptureResult::new(url);
        result.content = html.into_bytes();
        Ok(result)
    }

    async fn close(&mut self) -> Result<()> {
        let mut outcome = Ok(());

        if let Some(mut browser) = self.browser.take() {
            debug!("closing browser");
            match tokio::time::timeout(CLOSE_TIMEOUT, browser.close()).await {
                Ok(Ok(_)) => debug!("browser closed"),
                Ok(Err(e)) => {
                    outcome = Err(RouteCaptureError::Browser(format!("failed to close browser: {e}")))
                }
                Err(_) => warn!("timed out closing browser, skipping"),
            }
        }

        if let Some(task) = self.handler_task.take() {
            task.abort();
        }

        outcome
    }

    fn browser_session(&mut self) -> Option<&mut BrowserPageCapturer> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_without_launch_is_noop() {
        let mut capturer = BrowserPageCapturer::new(None, Duration::from_secs(5));
        capturer.close().await.unwrap();
        assert!(capturer.browser_session().is_some());
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_browser_capture_data_url() {
        let mut capturer = BrowserPageCapturer::new(None, Duration::from_secs(20));
        let result = capturer
            .capture("data:text/html,<form action='/login' method='post'></form>")
            .await
            .expect("capture failed");
        let html = String::from_utf8(result.content).unwrap();
        assert!(html.contains("<form"));
        capturer.close().await.expect("close failed");
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_timed_out_capture_closes_page() {
        // Non-routable address: navigation hangs until the timeout fires.
        let target = "http://10.255.255.1/";
        let mut capturer = BrowserPageCapturer::new(None, Duration::from_secs(2));
        let err = capturer.capture(target).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));

        let browser = capturer.ensure_browser().await.unwrap();
        for page in browser.pages().await.unwrap() {
            let url = page.url().await.unwrap().unwrap_or_default();
            assert!(!url.contains("10.255.255.1"), "page left open: {url}");
        }
        capturer.close().await.expect("close failed");
    }
}
