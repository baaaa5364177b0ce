//! Error types for route capture.

/// Errors that can occur while capturing and extracting routes.
///
/// Only [`RouteCaptureError::Capture`] aborts an invocation. Everything else
/// is reported per item and rendered into the report's `errors` list.
#[derive(thiserror::Error, Debug)]
pub enum RouteCaptureError {
    #[error("capture failed for {url}: {reason}")]
    Capture { url: String, reason: String },

    #[error("failed to parse document: {0}")]
    DocumentParse(String),

    #[error("malformed URL {url:?}: {source}")]
    MalformedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to parse body: {0}")]
    BodyParse(String),

    #[error("failed to fetch script {url}: {reason}")]
    ScriptFetch { url: String, reason: String },

    #[error("failed to parse script: {0}")]
    ScriptParse(String),

    #[error("network listener failed: {0}")]
    NetworkListener(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("browserbase error: {0}")]
    Browserbase(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RouteCaptureError {
    pub fn capture(url: &str, reason: impl ToString) -> Self {
        RouteCaptureError::Capture {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed_url(url: &str, source: url::ParseError) -> Self {
        RouteCaptureError::MalformedUrl {
            url: url.to_string(),
            source,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, RouteCaptureError>;
