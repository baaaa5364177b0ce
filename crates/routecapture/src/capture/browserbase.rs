//! Remote browser capture through Browserbase.
//!
//! A session is created over the Browserbase REST API, its CDP websocket is
//! handed to a [`BrowserPageCapturer`], and every session created here is
//! released on close.

use super::browser::BrowserPageCapturer;
use super::{CaptureResult, PageCapturer};
use crate::config::BrowserbaseConfig;
use crate::error::{Result, RouteCaptureError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const API_URL: &str = "https://www.browserbase.com";
const CONNECT_URL: &str = "wss://connect.browserbase.com";

/// A Browserbase session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub context_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Geolocation {
    country: String,
}

#[derive(Debug, Clone, Serialize)]
struct Proxy {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    geolocation: Option<Geolocation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrowserSettings {
    block_ads: bool,
    solve_captchas: bool,
    record_session: bool,
    log_session: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    project_id: String,
    browser_settings: BrowserSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxies: Option<Vec<Proxy>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CloseSessionRequest<'a> {
    project_id: &'a str,
    status: &'static str,
}

/// Client for the Browserbase session API.
pub struct BrowserbaseClient {
    api_url: String,
    connect_url: String,
    config: BrowserbaseConfig,
    http: reqwest::Client,
    sessions: Vec<Session>,
}

impl BrowserbaseClient {
    pub fn new(config: BrowserbaseConfig) -> Self {
        Self::with_endpoints(config, API_URL, CONNECT_URL)
    }

    /// A client against non-default endpoints.
    pub fn with_endpoints(config: BrowserbaseConfig, api_url: &str, connect_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            connect_url: connect_url.to_string(),
            config,
            http: reqwest::Client::new(),
            sessions: Vec::new(),
        }
    }

    /// Sessions created by this client and not yet released.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// CDP websocket URL for `session`.
    pub fn connection_string(&self, session: &Session) -> String {
        format!(
            "{}?apiKey={}&sessionId={}",
            self.connect_url, self.config.api_key, session.id
        )
    }

    /// Create a session: basic, proxied, or geo-proxied per the config.
    pub async fn create_session(&mut self) -> Result<Session> {
        let request = CreateSessionRequest {
            project_id: self.config.project_id.clone(),
            browser_settings: BrowserSettings {
                block_ads: true,
                solve_captchas: true,
                record_session: true,
                log_session: true,
            },
            proxies: self.proxies(),
        };
        debug!(proxies = request.proxies.is_some(), "creating browserbase session");

        let resp = self
            .http
            .post(format!("{}/v1/sessions", self.api_url))
            .header("X-BB-API-Key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(RouteCaptureError::Browserbase(format!(
                "session create returned {status}: {body}"
            )));
        }

        let session: Session = serde_json::from_str(&body)?;
        if session.id.is_empty() {
            return Err(RouteCaptureError::Browserbase(
                "session create returned no session id".to_string(),
            ));
        }
        self.sessions.push(session.clone());
        Ok(session)
    }

    fn proxies(&self) -> Option<Vec<Proxy>> {
        if !self.config.countries.is_empty() {
            return Some(
                self.config
                    .countries
                    .iter()
                    .map(|country| Proxy {
                        kind: "browserbase",
                        geolocation: Some(Geolocation {
                            country: country.clone(),
                        }),
                    })
                    .collect(),
            );
        }
        if self.config.proxy {
            return Some(vec![Proxy {
                kind: "browserbase",
                geolocation: None,
            }]);
        }
        None
    }

    /// Ask Browserbase to release `session_id`.
    pub async fn close_session(&mut self, session_id: &str) -> Result<()> {
        if session_id.is_empty() {
            return Err(RouteCaptureError::Browserbase("session id is empty".to_string()));
        }

        let body = CloseSessionRequest {
            project_id: &self.config.project_id,
            status: "REQUEST_RELEASE",
        };
        let resp = self
            .http
            .post(format!("{}/v1/sessions/{session_id}", self.api_url))
            .header("X-BB-API-Key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(RouteCaptureError::Browserbase(format!(
                "session close returned {}",
                resp.status()
            )));
        }

        self.sessions.retain(|s| s.id != session_id);
        Ok(())
    }

    /// Release every tracked session; failures are collected, not short-circuited.
    pub async fn close_all_sessions(&mut self) -> Result<()> {
        let ids: Vec<String> = self.sessions.iter().map(|s| s.id.clone()).collect();
        let mut failures = Vec::new();

        for id in ids {
            if let Err(e) = self.close_session(&id).await {
                error!(session = %id, error = %e, "failed to close browserbase session");
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RouteCaptureError::Browserbase(format!(
                "failed to close all sessions: {}",
                failures.join("; ")
            )))
        }
    }
}

/// Captures pages in a remote Browserbase browser.
pub struct BrowserbasePageCapturer {
    client: BrowserbaseClient,
    inner: BrowserPageCapturer,
}

impl BrowserbasePageCapturer {
    /// Create a session and connect to it.
    pub async fn connect(mut client: BrowserbaseClient, timeout: Duration) -> Result<Self> {
        let session = client.create_session().await?;
        let ws_url = client.connection_string(&session);

        let inner = match BrowserPageCapturer::connect(&ws_url, timeout).await {
            Ok(inner) => inner,
            Err(e) => {
                let _ = client.close_all_sessions().await;
                return Err(e);
            }
        };

        Ok(Self { client, inner })
    }
}

#[async_trait]
impl PageCapturer for BrowserbasePageCapturer {
    async fn capture(&mut self, url: &str) -> Result<CaptureResult> {
        self.inner.capture(url).await
    }

    async fn close(&mut self) -> Result<()> {
        let sessions = self.client.close_all_sessions().await;
        let browser = self.inner.close().await;
        sessions.and(browser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, config: BrowserbaseConfig) -> BrowserbaseClient {
        BrowserbaseClient::with_endpoints(config, &server.uri(), "wss://connect.test")
    }

    #[tokio::test]
    async fn test_create_basic_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .and(header("X-BB-API-Key", "key"))
            .and(body_partial_json(serde_json::json!({
                "projectId": "proj",
                "browserSettings": {"blockAds": true, "solveCaptchas": true}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "sess-1",
                "status": "RUNNING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut bb = client(&server, BrowserbaseConfig::new("key", "proj"));
        let session = bb.create_session().await.unwrap();
        assert_eq!(session.id, "sess-1");
        assert_eq!(bb.sessions().len(), 1);
        assert_eq!(
            bb.connection_string(&session),
            "wss://connect.test?apiKey=key&sessionId=sess-1"
        );
    }

    #[tokio::test]
    async fn test_create_geo_proxy_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .and(body_partial_json(serde_json::json!({
                "proxies": [
                    {"type": "browserbase", "geolocation": {"country": "US"}},
                    {"type": "browserbase", "geolocation": {"country": "DE"}}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "geo"})))
            .expect(1)
            .mount(&server)
            .await;

        let config = BrowserbaseConfig::new("key", "proj")
            .with_countries(vec!["US".to_string(), "DE".to_string()]);
        let mut bb = client(&server, config);
        assert_eq!(bb.create_session().await.unwrap().id, "geo");
    }

    #[tokio::test]
    async fn test_create_session_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let mut bb = client(&server, BrowserbaseConfig::new("nope", "proj"));
        let err = bb.create_session().await.unwrap_err();
        assert!(matches!(err, RouteCaptureError::Browserbase(_)));
        assert!(bb.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_close_all_sessions_releases_tracked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "s1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions/s1"))
            .and(body_partial_json(serde_json::json!({
                "projectId": "proj",
                "status": "REQUEST_RELEASE"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut bb = client(&server, BrowserbaseConfig::new("key", "proj"));
        bb.create_session().await.unwrap();
        bb.close_all_sessions().await.unwrap();
        assert!(bb.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_close_empty_session_id() {
        let server = MockServer::start().await;
        let mut bb = client(&server, BrowserbaseConfig::new("key", "proj"));
        assert!(bb.close_session("").await.is_err());
    }
}
