//! Route extraction from live browser traffic.
//!
//! A page is opened in the capture browser with network tracking enabled, and
//! a background task records every fetch/XHR `requestWillBeSent` event while
//! the foreground navigates. [`NetworkRecorder::stop`] is the join point: it
//! signals the task, lets it drain events that are already queued, and hands
//! back what was recorded.

use super::Extraction;
use crate::canonical::{parse_body_params, parse_query_params, strip_query};
use crate::capture::BrowserPageCapturer;
use crate::error::{Result, RouteCaptureError};
use crate::scope::ScopePolicy;
use crate::types::{HttpMethod, Route};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, GetRequestPostDataParams, RequestId, ResourceType,
};
use chromiumoxide::Page;
use futures::{FutureExt, Stream, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Upper bound on recorded requests per page.
pub const MAX_CAPTURED_REQUESTS: usize = 10_000;

/// The parts of an observed request that routes are built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedRequest {
    pub request_id: String,
    pub url: String,
    pub method: String,
    pub has_post_data: bool,
    pub post_data: Option<String>,
    pub content_type: Option<String>,
}

impl CapturedRequest {
    /// Fetch/XHR requests only; documents, scripts, images and the rest are
    /// covered by the other extractors or are not routes.
    pub fn from_event(event: &EventRequestWillBeSent) -> Option<Self> {
        if !matches!(event.r#type, Some(ResourceType::Fetch) | Some(ResourceType::Xhr)) {
            return None;
        }
        let request = &event.request;

        let entries: Vec<String> = request
            .post_data_entries
            .iter()
            .flatten()
            .filter_map(|entry| entry.bytes.as_ref())
            .filter_map(serialized_str)
            .collect();

        Some(Self {
            request_id: event.request_id.inner().clone(),
            url: request.url.clone(),
            method: request.method.clone(),
            has_post_data: request.has_post_data.unwrap_or(false),
            post_data: decode_post_data_entries(&entries),
            content_type: header_value(&request.headers, "content-type"),
        })
    }
}

/// Join base64 `postDataEntries` back into the request body. `None` when
/// there are no entries or one of them is not valid base64.
pub fn decode_post_data_entries(entries: &[String]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let mut body = Vec::new();
    for entry in entries {
        match base64::engine::general_purpose::STANDARD.decode(entry) {
            Ok(bytes) => body.extend(bytes),
            Err(e) => {
                debug!(error = %e, "undecodable post data entry");
                return None;
            }
        }
    }
    Some(String::from_utf8_lossy(&body).into_owned())
}

/// CDP string newtypes (base64 `Binary`) serialize as plain JSON strings.
fn serialized_str<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_value(value).ok()? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    }
}

/// Case-insensitive header lookup on a CDP `Headers` object.
fn header_value<T: Serialize>(headers: &T, name: &str) -> Option<String> {
    let value = serde_json::to_value(headers).ok()?;
    value
        .as_object()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, v)| v.as_str().map(str::to_string))
}

/// Background recorder for a stream of captured requests.
pub struct NetworkRecorder {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Vec<CapturedRequest>>,
}

impl NetworkRecorder {
    /// Start recording `events`, keeping at most `capacity` of them.
    pub fn start<S>(events: S, capacity: usize) -> Self
    where
        S: Stream<Item = CapturedRequest> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            futures::pin_mut!(events);
            let mut captured = Vec::new();
            let mut dropped = 0usize;

            let mut record = |req: CapturedRequest, captured: &mut Vec<CapturedRequest>| {
                debug!(url = %req.url, method = %req.method, "captured network request");
                if captured.len() < capacity {
                    captured.push(req);
                } else {
                    dropped += 1;
                }
            };

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    next = events.next() => match next {
                        Some(req) => record(req, &mut captured),
                        None => break,
                    },
                }
            }

            // Events delivered before the stop signal are already queued.
            while let Some(Some(req)) = events.next().now_or_never() {
                record(req, &mut captured);
            }

            if dropped > 0 {
                warn!(dropped, capacity, "network recorder full, requests dropped");
            }
            captured
        });

        Self {
            stop: Some(stop_tx),
            task,
        }
    }

    /// Stop recording and return everything captured. Blocks until the
    /// recorder has drained its queue.
    pub async fn stop(mut self) -> Result<Vec<CapturedRequest>> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task
            .await
            .map_err(|e| RouteCaptureError::NetworkListener(format!("recorder task failed: {e}")))
    }
}

/// Routes observed in the browser's network traffic while loading the target.
pub async fn extract_network_routes(
    capturer: &mut BrowserPageCapturer,
    scope: &ScopePolicy,
) -> Extraction {
    let mut out = Extraction::default();
    let target = scope.target.as_str();
    let timeout = capturer.timeout();
    info!(target = %target, "capturing network events");

    let page = match capturer.ensure_browser().await {
        Ok(browser) => match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                out.push_error(RouteCaptureError::Browser(format!("failed to create page: {e}")));
                return out;
            }
        },
        Err(e) => {
            out.push_error(e);
            return out;
        }
    };

    let recorded = record_requests(&page, target, timeout, &mut out.errors).await;
    let mut requests = match recorded {
        Ok(requests) => requests,
        Err(e) => {
            out.push_error(e);
            close_page(page).await;
            return out;
        }
    };
    debug!(count = requests.len(), "network events captured");

    fill_missing_post_data(&page, &mut requests).await;
    close_page(page).await;

    out.absorb(routes_from_requests(requests, scope));
    out.merged()
}

async fn record_requests(
    page: &Page,
    target: &str,
    timeout: Duration,
    errors: &mut Vec<String>,
) -> Result<Vec<CapturedRequest>> {
    let listener_err = |e: chromiumoxide::error::CdpError| RouteCaptureError::NetworkListener(e.to_string());

    page.execute(EnableParams::default())
        .await
        .map_err(listener_err)?;
    let events = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(listener_err)?;

    let recorder = NetworkRecorder::start(
        events.filter_map(|event| futures::future::ready(CapturedRequest::from_event(&event))),
        MAX_CAPTURED_REQUESTS,
    );

    errors.extend(load_with_retry(page, target, timeout).await);

    recorder.stop().await
}

/// Page navigation as seen by [`load_with_retry`].
#[async_trait]
pub trait Navigate: Send + Sync {
    /// Navigate to `url` and wait for the load to finish.
    async fn load(&self, url: &str) -> std::result::Result<(), String>;

    async fn reload(&self) -> std::result::Result<(), String>;
}

#[async_trait]
impl Navigate for Page {
    async fn load(&self, url: &str) -> std::result::Result<(), String> {
        self.goto(url).await.map_err(|e| e.to_string())?;
        self.wait_for_navigation()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn reload(&self) -> std::result::Result<(), String> {
        Page::reload(self).await.map(|_| ()).map_err(|e| e.to_string())
    }
}

/// Navigate to `target`, reloading once if the first load fails. The whole
/// attempt is bounded by `timeout`. Returns the errors to report.
pub async fn load_with_retry<N: Navigate + ?Sized>(
    nav: &N,
    target: &str,
    timeout: Duration,
) -> Vec<String> {
    let attempt = async {
        let mut errors = Vec::new();
        if let Err(e) = nav.load(target).await {
            debug!(target = %target, error = %e, "page load failed, reloading");
            errors.push(format!("failed to load {target}: {e}"));
            if let Err(e) = nav.reload().await {
                errors.push(format!("failed to reload {target}: {e}"));
            }
        }
        errors
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(errors) => errors,
        Err(_) => vec![format!(
            "network capture of {target} timed out after {}s",
            timeout.as_secs()
        )],
    }
}

/// Large request bodies are left out of the event and must be asked for.
async fn fill_missing_post_data(page: &Page, requests: &mut [CapturedRequest]) {
    for req in requests
        .iter_mut()
        .filter(|r| r.has_post_data && r.post_data.is_none())
    {
        let params = GetRequestPostDataParams::new(RequestId::new(req.request_id.clone()));
        match page.execute(params).await {
            Ok(resp) => req.post_data = Some(resp.result.post_data),
            Err(e) => debug!(url = %req.url, error = %e, "post data unavailable"),
        }
    }
}

async fn close_page(page: Page) {
    if let Err(e) = page.close().await {
        debug!(error = %e, "failed to close network capture page");
    }
}

/// Build routes from recorded requests.
pub fn routes_from_requests(requests: Vec<CapturedRequest>, scope: &ScopePolicy) -> Extraction {
    let mut out = Extraction::default();

    for req in requests {
        let parsed = match Url::parse(&req.url) {
            Ok(u) => u,
            Err(e) => {
                debug!(url = %req.url, error = %e, "skipping unparseable request URL");
                continue;
            }
        };
        if !scope.allows(parsed.as_str()) {
            debug!(url = %req.url, "skipping out-of-scope request");
            continue;
        }

        let url = match strip_query(parsed.as_str()) {
            Ok(u) => u,
            Err(e) => {
                out.push_error(e);
                continue;
            }
        };
        let method = match req.method.parse::<HttpMethod>() {
            Ok(m) => m,
            Err(e) => {
                out.push_error(format!("request to {url}: {e}"));
                continue;
            }
        };

        let mut route = Route::new(url.clone(), method).with_query_params(parse_query_params(&parsed));
        if let Some(body) = req.post_data.as_deref().filter(|_| req.has_post_data) {
            match parse_body_params(body, req.content_type.as_deref()) {
                Ok(params) => route.body_params = params,
                Err(e) => out.push_error(e),
            }
        }

        out.urls.insert(url);
        out.routes.push(route);
    }

    out.merged()
}
