//! Route capture pipeline: capture the target once, run every extractor over
//! it, merge the results and release the capture front-end.

use crate::capture::request::build_client;
use crate::capture::{new_capturer, PageCapturer};
use crate::config::RouteCaptureConfig;
use crate::extract::html::{extract_anchor_routes, extract_form_routes, extract_link_routes};
use crate::extract::network::extract_network_routes;
use crate::extract::script::{extract_inline_script_routes, extract_script_routes, script_sources};
use crate::extract::Extraction;
use crate::scope::ScopePolicy;
use crate::types::{CaptureMethod, RouteCaptureReport};
use scraper::Html;
use std::borrow::Cow;
use tracing::{debug, info, warn};

/// Capture `config.target` with the configured front-end and extract routes.
///
/// Always returns a report. When the front-end cannot be created or the
/// capture itself fails, the report carries that single error and nothing
/// else.
pub async fn capture_routes(config: &RouteCaptureConfig) -> RouteCaptureReport {
    let mut capturer = match new_capturer(config).await {
        Ok(c) => c,
        Err(e) => {
            warn!(method = %config.method, error = %e, "failed to create capturer");
            let mut report = RouteCaptureReport::new(&config.target);
            report.errors.push(e.to_string());
            return report;
        }
    };

    let report = capture_routes_with(capturer.as_mut(), config).await;

    if let Err(e) = capturer.close().await {
        warn!(method = %config.method, error = %e, "failed to close capturer");
    }
    report
}

/// Run the pipeline against an existing front-end. The caller owns `capturer`
/// and is responsible for closing it.
pub async fn capture_routes_with(
    capturer: &mut dyn PageCapturer,
    config: &RouteCaptureConfig,
) -> RouteCaptureReport {
    let target = config.target.as_str();
    let mut report = RouteCaptureReport::new(target);
    info!(target = %target, method = %config.method, "capturing routes");

    let captured = match capturer.capture(target).await {
        Ok(c) => c,
        Err(e) => {
            warn!(target = %target, error = %e, "capture failed");
            report.errors.push(e.to_string());
            return report;
        }
    };
    debug!(target = %target, status = ?captured.status, bytes = captured.content.len(), "page captured");

    let scope = config.scope_policy();
    let mut all = Extraction::default();
    all.errors.extend(captured.errors);

    // Non-UTF-8 pages (windows-1252, latin-1) still go through every extractor.
    let html = String::from_utf8_lossy(&captured.content);
    if matches!(html, Cow::Owned(_)) {
        debug!(target = %target, "page content is not valid UTF-8, decoded lossily");
    }
    let (extraction, sources) = extract_document(&html, &scope);
    all.absorb(extraction);

    match build_client(config.insecure, config.timeout) {
        Ok(client) => all.absorb(extract_script_routes(sources, &scope, &client).await),
        Err(e) => all.push_error(e),
    }

    if config.method == CaptureMethod::Browser {
        if let Some(browser) = capturer.browser_session() {
            all.absorb(extract_network_routes(browser, &scope).await);
        }
    }

    let all = all.merged();
    info!(
        target = %target,
        routes = all.routes.len(),
        urls = all.urls.len(),
        errors = all.errors.len(),
        "route capture complete"
    );

    report.routes = all.routes;
    report.urls = all.urls.into_iter().collect();
    report.errors = all.errors;
    report
}

/// Run the synchronous DOM extractors and collect external script URLs. The
/// parsed document never outlives this call.
fn extract_document(html: &str, scope: &ScopePolicy) -> (Extraction, Vec<String>) {
    let document = Html::parse_document(html);
    let mut out = Extraction::default();

    out.absorb(extract_form_routes(&document, scope));
    out.absorb(extract_anchor_routes(&document, scope));
    out.absorb(extract_link_routes(&document, scope));
    out.absorb(extract_inline_script_routes(&document, scope));

    let (sources, errors) = script_sources(&document, scope);
    out.errors.extend(errors);
    (out, sources)
}
