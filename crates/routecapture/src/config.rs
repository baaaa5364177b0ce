//! Capture configuration and browser discovery.

use crate::scope::ScopePolicy;
use crate::types::{CaptureMethod, ScopeMode};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-capture timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything one `capture_routes` invocation needs.
#[derive(Debug, Clone)]
pub struct RouteCaptureConfig {
    pub target: String,
    pub method: CaptureMethod,
    pub scope: ScopeMode,
    pub timeout: Duration,
    /// Accept invalid TLS certificates (request capture only).
    pub insecure: bool,
    /// Explicit browser executable (browser capture only).
    pub browser_path: Option<PathBuf>,
    /// Remote session settings (browserbase capture only).
    pub browserbase: Option<BrowserbaseConfig>,
    pub skip_static_assets: bool,
}

impl RouteCaptureConfig {
    pub fn new(target: impl Into<String>, method: CaptureMethod) -> Self {
        Self {
            target: target.into(),
            method,
            scope: ScopeMode::BaseDomainOnly,
            timeout: DEFAULT_TIMEOUT,
            insecure: false,
            browser_path: None,
            browserbase: None,
            skip_static_assets: false,
        }
    }

    pub fn scope_policy(&self) -> ScopePolicy {
        ScopePolicy::new(self.target.clone(), self.scope).skip_static_assets(self.skip_static_assets)
    }
}

/// Browserbase credentials and session options.
#[derive(Debug, Clone, Default)]
pub struct BrowserbaseConfig {
    pub api_key: String,
    pub project_id: String,
    /// Route the session through Browserbase's proxy.
    pub proxy: bool,
    /// Geolocated proxy countries. Non-empty implies `proxy`.
    pub countries: Vec<String>,
}

impl BrowserbaseConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    pub fn with_proxy(mut self) -> Self {
        self.proxy = true;
        self
    }

    pub fn with_countries(mut self, countries: Vec<String>) -> Self {
        if !countries.is_empty() {
            self.proxy = true;
        }
        self.countries = countries;
        self
    }
}

/// Find a Chromium-family browser binary.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("ROUTECAPTURE_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouteCaptureConfig::new("https://example.com", CaptureMethod::Request);
        assert_eq!(config.scope, ScopeMode::BaseDomainOnly);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(!config.insecure);
        assert!(!config.skip_static_assets);
    }

    #[test]
    fn test_countries_imply_proxy() {
        let bb = BrowserbaseConfig::new("key", "proj").with_countries(vec!["US".into()]);
        assert!(bb.proxy);
        let bb = BrowserbaseConfig::new("key", "proj").with_countries(Vec::new());
        assert!(!bb.proxy);
    }

    #[test]
    fn test_scope_policy_carries_settings() {
        let mut config = RouteCaptureConfig::new("https://example.com", CaptureMethod::Browser);
        config.skip_static_assets = true;
        let policy = config.scope_policy();
        assert_eq!(policy.target, "https://example.com");
        assert!(policy.skip_static_assets);
    }
}
