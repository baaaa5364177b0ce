//! Domain scoping for discovered URLs.
//!
//! In base-domain mode the target is truncated to its last two DNS labels
//! while candidates are compared by their full host, so redirects to `www.*`
//! or other subdomains stay in scope. Multi-label public suffixes such as
//! `co.uk` are not special-cased.

use crate::types::ScopeMode;
use url::Url;

/// Path extensions that mark a URL as a static asset rather than a route.
const STATIC_ASSET_EXTENSIONS: &[&str] = &[
    ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".woff", ".woff2", ".ttf",
    ".eot", ".otf", ".map", ".mp4", ".webm", ".mp3",
];

/// Decide whether `candidate` is in scope relative to `base`.
///
/// Malformed URLs are out of scope.
pub fn is_in_scope(base: &str, candidate: &str, mode: ScopeMode) -> bool {
    if mode == ScopeMode::Unrestricted {
        return true;
    }

    let base_domain = extract_domain(base, 2);
    let candidate_domain = extract_domain(candidate, 0);
    is_subdomain(&base_domain, &candidate_domain)
}

/// Host of `raw_url`, truncated to its last `max_labels` labels.
///
/// `max_labels == 0` keeps the full host. Returns an empty string when the
/// URL cannot be parsed or has no host.
pub fn extract_domain(raw_url: &str, max_labels: usize) -> String {
    let host = match Url::parse(raw_url) {
        Ok(u) => u.host_str().unwrap_or("").to_string(),
        Err(_) => return String::new(),
    };

    if max_labels == 0 {
        return host;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() > max_labels {
        labels[labels.len() - max_labels..].join(".")
    } else {
        host
    }
}

fn is_subdomain(base: &str, sub: &str) -> bool {
    if base.is_empty() || sub.is_empty() {
        return false;
    }
    sub == base || sub.ends_with(&format!(".{base}"))
}

/// Whether the URL path ends in a well-known static asset extension.
pub fn is_static_asset(raw_url: &str) -> bool {
    let Ok(parsed) = Url::parse(raw_url) else {
        return false;
    };
    let path = parsed.path().to_ascii_lowercase();
    STATIC_ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Scope decision for one capture: the target, the domain mode and the
/// static-asset switch, applied together by every extractor.
#[derive(Debug, Clone)]
pub struct ScopePolicy {
    pub target: String,
    pub mode: ScopeMode,
    pub skip_static_assets: bool,
}

impl ScopePolicy {
    pub fn new(target: impl Into<String>, mode: ScopeMode) -> Self {
        Self {
            target: target.into(),
            mode,
            skip_static_assets: false,
        }
    }

    pub fn skip_static_assets(mut self, skip: bool) -> Self {
        self.skip_static_assets = skip;
        self
    }

    /// Whether `candidate` (absolute) may become a route.
    pub fn allows(&self, candidate: &str) -> bool {
        if !is_http_url(candidate) {
            return false;
        }
        if self.skip_static_assets && is_static_asset(candidate) {
            return false;
        }
        is_in_scope(&self.target, candidate, self.mode)
    }
}

fn is_http_url(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(u) => matches!(u.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
