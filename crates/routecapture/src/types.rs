//! Core data types for discovered routes and the capture report.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP methods a route can be reached with.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
}

impl HttpMethod {
    /// Methods whose requests semantically carry a body.
    pub fn carries_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "CONNECT" => Ok(HttpMethod::Connect),
            "TRACE" => Ok(HttpMethod::Trace),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

/// A named request parameter with the example values seen for it.
///
/// Used for both query-string and body parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Param {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub example_values: Vec<String>,
}

impl Param {
    /// A parameter with no example values.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            example_values: Vec::new(),
        }
    }

    pub fn with_values(name: impl Into<String>, example_values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            example_values,
        }
    }
}

/// A discovered endpoint.
///
/// Two routes are the same logical route when their method and query-free
/// URL are equal; see [`Route::key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Absolute URL with the query string removed.
    pub url: String,
    /// Path component of `url`.
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub query_params: Vec<Param>,
    #[serde(default)]
    pub body_params: Vec<Param>,
}

impl Route {
    /// Build a parameterless route. `url` must already be canonical.
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        let url = url.into();
        let path = url::Url::parse(&url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        Self {
            url,
            path,
            method,
            query_params: Vec::new(),
            body_params: Vec::new(),
        }
    }

    pub fn with_query_params(mut self, params: Vec<Param>) -> Self {
        self.query_params = params;
        self
    }

    pub fn with_body_params(mut self, params: Vec<Param>) -> Self {
        self.body_params = params;
        self
    }

    /// The merge key: `(method, url-without-query)`.
    pub fn key(&self) -> (HttpMethod, &str) {
        (self.method, self.url.as_str())
    }
}

/// How the page content is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMethod {
    /// Plain HTTP GET.
    Request,
    /// Local headless Chromium.
    Browser,
    /// Remote browser session from Browserbase.
    Browserbase,
}

impl fmt::Display for CaptureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMethod::Request => f.write_str("request"),
            CaptureMethod::Browser => f.write_str("browser"),
            CaptureMethod::Browserbase => f.write_str("browserbase"),
        }
    }
}

/// Policy for which discovered URLs are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeMode {
    /// Keep everything.
    Unrestricted,
    /// Keep only the target's base domain and its subdomains.
    BaseDomainOnly,
}

impl ScopeMode {
    pub fn from_base_urls_only(base_urls_only: bool) -> Self {
        if base_urls_only {
            ScopeMode::BaseDomainOnly
        } else {
            ScopeMode::Unrestricted
        }
    }
}

/// Result of one route capture invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCaptureReport {
    /// The URL that was captured, as supplied.
    pub target: String,
    pub routes: Vec<Route>,
    /// Every URL visited or referenced, sorted and unique.
    pub urls: Vec<String>,
    /// Non-fatal diagnostics, plus the fatal capture error when there is one.
    pub errors: Vec<String>,
}

impl RouteCaptureReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!(" Patch ".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("dialog".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_carries_body() {
        assert!(HttpMethod::Post.carries_body());
        assert!(HttpMethod::Put.carries_body());
        assert!(HttpMethod::Patch.carries_body());
        assert!(!HttpMethod::Get.carries_body());
        assert!(!HttpMethod::Delete.carries_body());
    }

    #[test]
    fn test_method_defaults_to_get() {
        assert_eq!(HttpMethod::default(), HttpMethod::Get);
    }

    #[test]
    fn test_route_new_derives_path() {
        let route = Route::new("https://example.com/api/users", HttpMethod::Get);
        assert_eq!(route.path, "/api/users");
        assert_eq!(route.key(), (HttpMethod::Get, "https://example.com/api/users"));
    }

    #[test]
    fn test_route_serializes_camel_case() {
        let route = Route::new("https://example.com/login", HttpMethod::Post)
            .with_body_params(vec![Param::with_values("user", vec!["bob".into()])]);
        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json["method"], "POST");
        assert_eq!(json["bodyParams"][0]["name"], "user");
        assert_eq!(json["bodyParams"][0]["exampleValues"][0], "bob");
        assert!(json["queryParams"].as_array().unwrap().is_empty());
    }
}
