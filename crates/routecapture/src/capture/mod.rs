//! Page capture front-ends.
//!
//! Defines the `PageCapturer` trait that abstracts over how a page's content
//! is obtained: a plain HTTP request, a local headless Chromium, or a remote
//! Browserbase session.

pub mod browser;
pub mod browserbase;
pub mod request;

use crate::config::RouteCaptureConfig;
use crate::error::{Result, RouteCaptureError};
use crate::types::CaptureMethod;
use async_trait::async_trait;

pub use browser::BrowserPageCapturer;
pub use browserbase::{BrowserbaseClient, BrowserbasePageCapturer};
pub use request::RequestPageCapturer;

/// Content obtained for a target.
#[derive(Debug, Clone, Default)]
pub struct CaptureResult {
    /// The URL that was captured.
    pub url: String,
    /// HTTP status code, when the front-end can observe it.
    pub status: Option<u16>,
    /// Raw page bytes (HTML for every front-end shipped here).
    pub content: Vec<u8>,
    /// Non-fatal problems seen during capture.
    pub errors: Vec<String>,
}

impl CaptureResult {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// A mechanism for obtaining a page's content.
#[async_trait]
pub trait PageCapturer: Send {
    /// Capture `url`. An error here aborts the whole route capture.
    async fn capture(&mut self, url: &str) -> Result<CaptureResult>;

    /// Release whatever the capturer holds (browser process, remote session).
    async fn close(&mut self) -> Result<()>;

    /// The live local browser behind this capturer, if any.
    fn browser_session(&mut self) -> Option<&mut BrowserPageCapturer> {
        None
    }
}

/// Build the capture front-end selected by `config.method`.
pub async fn new_capturer(config: &RouteCaptureConfig) -> Result<Box<dyn PageCapturer>> {
    match config.method {
        CaptureMethod::Request => Ok(Box::new(RequestPageCapturer::new(
            config.insecure,
            config.timeout,
        )?)),
        CaptureMethod::Browser => Ok(Box::new(BrowserPageCapturer::new(
            config.browser_path.clone(),
            config.timeout,
        ))),
        CaptureMethod::Browserbase => {
            let bb = config.browserbase.clone().ok_or_else(|| {
                RouteCaptureError::Browserbase("browserbase token and project are required".into())
            })?;
            let client = BrowserbaseClient::new(bb);
            let capturer = BrowserbasePageCapturer::connect(client, config.timeout).await?;
            Ok(Box::new(capturer))
        }
    }
}
