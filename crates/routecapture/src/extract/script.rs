//! JavaScript analysis for `fetch()` endpoints.
//!
//! Inline `<script>` bodies and same-scope external `.js` files are parsed
//! into a syntax tree with tree-sitter and walked for calls whose callee is
//! the bare identifier `fetch`. Only literal arguments are understood: a
//! string-literal URL, and an options object whose `method` is a string
//! literal and whose `body` key, if present, is recorded as a single generic
//! `body` parameter. Nothing is executed.

use super::html::selector;
use super::Extraction;
use crate::canonical::{is_absolute_url, parse_query_params, resolve, strip_query};
use crate::error::{Result, RouteCaptureError};
use crate::scope::ScopePolicy;
use crate::types::{HttpMethod, Param, Route, ScopeMode};
use futures::stream::{self, StreamExt};
use scraper::Html;
use tracing::{debug, info};
use tree_sitter::{Node, Parser};

/// Maximum script size in bytes (5 MB). Larger scripts are skipped.
const MAX_SCRIPT_SIZE: usize = 5 * 1024 * 1024;

/// Concurrent script downloads.
const FETCH_CONCURRENCY: usize = 4;

/// A `fetch(...)` call with literal arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub url: String,
    pub method: Option<String>,
    pub has_body: bool,
}

/// Parses JavaScript and finds `fetch()` calls.
pub struct ScriptAnalyzer {
    parser: Parser,
}

impl ScriptAnalyzer {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .map_err(|e| RouteCaptureError::ScriptParse(format!("failed to load grammar: {e}")))?;
        Ok(Self { parser })
    }

    /// Every literal `fetch()` call in `source`.
    ///
    /// Source with syntax errors yields an error and no calls.
    pub fn fetch_calls(&mut self, source: &str) -> Result<Vec<FetchCall>> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| RouteCaptureError::ScriptParse("parser produced no tree".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(RouteCaptureError::ScriptParse(syntax_error_location(root)));
        }

        let mut calls = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == "call_expression" {
                if let Some(call) = fetch_call(node, source) {
                    calls.push(call);
                }
            }
            let mut cursor = node.walk();
            stack.extend(node.named_children(&mut cursor));
        }
        Ok(calls)
    }

    /// Routes for every in-scope `fetch()` call in `source`.
    pub fn analyze(&mut self, source: &str, scope: &ScopePolicy) -> Extraction {
        let mut out = Extraction::default();

        let calls = match self.fetch_calls(source) {
            Ok(calls) => calls,
            Err(e) => {
                out.push_error(e);
                return out;
            }
        };

        for call in calls {
            let full_url = match resolve(&scope.target, &call.url) {
                Ok(u) => u,
                Err(e) => {
                    out.push_error(e);
                    continue;
                }
            };
            if !scope.allows(&full_url) {
                continue;
            }
            let url = match strip_query(&full_url) {
                Ok(u) => u,
                Err(e) => {
                    out.push_error(e);
                    continue;
                }
            };

            let method = match call.method.as_deref() {
                None => HttpMethod::Get,
                Some(m) => match m.parse::<HttpMethod>() {
                    Ok(method) => method,
                    Err(e) => {
                        out.push_error(format!("fetch to {url}: {e}"));
                        continue;
                    }
                },
            };

            let query_params = url::Url::parse(&full_url)
                .map(|u| parse_query_params(&u))
                .unwrap_or_default();
            let body_params = if call.has_body {
                vec![Param::named("body")]
            } else {
                Vec::new()
            };

            out.urls.insert(url.clone());
            out.routes.push(
                Route::new(url, method)
                    .with_query_params(query_params)
                    .with_body_params(body_params),
            );
        }

        out.merged()
    }
}

fn syntax_error_location(root: Node<'_>) -> String {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            return format!("syntax error at line {}, column {}", pos.row + 1, pos.column + 1);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    "syntax error".to_string()
}

fn fetch_call(node: Node<'_>, source: &str) -> Option<FetchCall> {
    let callee = node.child_by_field_name("function")?;
    if callee.kind() != "identifier" || node_text(callee, source) != "fetch" {
        return None;
    }

    let args = call_arguments(node);
    let url = args.first().and_then(|arg| string_literal(*arg, source))?;

    let mut call = FetchCall {
        url,
        method: None,
        has_body: false,
    };

    if let Some(options) = args.get(1).filter(|n| n.kind() == "object") {
        let mut cursor = options.walk();
        for prop in options.named_children(&mut cursor) {
            match prop.kind() {
                "pair" => {
                    let Some(key) = prop.child_by_field_name("key").and_then(|k| property_key(k, source))
                    else {
                        continue;
                    };
                    match key.as_str() {
                        "method" => {
                            if let Some(value) = prop.child_by_field_name("value") {
                                if let Some(method) = string_literal(value, source) {
                                    call.method = Some(method);
                                }
                            }
                        }
                        "body" => call.has_body = true,
                        _ => {}
                    }
                }
                "shorthand_property_identifier" if node_text(prop, source) == "body" => {
                    call.has_body = true;
                }
                _ => {}
            }
        }
    }

    Some(call)
}

fn call_arguments(node: Node<'_>) -> Vec<Node<'_>> {
    let Some(args) = node.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut cursor = args.walk();
    args.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

fn property_key(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "property_identifier" => Some(node_text(node, source).to_string()),
        "string" => string_literal(node, source),
        _ => None,
    }
}

/// Value of a plain string literal. Template strings are dynamic and ignored.
fn string_literal(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut value = String::new();
    let mut cursor = node.walk();
    for part in node.named_children(&mut cursor) {
        match part.kind() {
            "string_fragment" => value.push_str(node_text(part, source)),
            "escape_sequence" => value.push_str(&unescape(node_text(part, source))),
            _ => {}
        }
    }
    Some(value)
}

fn unescape(seq: &str) -> String {
    let body = seq.strip_prefix('\\').unwrap_or(seq);
    match body {
        "n" => "\n".to_string(),
        "t" => "\t".to_string(),
        "r" => "\r".to_string(),
        "0" => "\0".to_string(),
        _ if body.starts_with("u{") => {
            let hex = body.trim_start_matches("u{").trim_end_matches('}');
            hex_char(hex).unwrap_or_default()
        }
        _ if (body.starts_with('u') && body.len() == 5) || (body.starts_with('x') && body.len() == 3) => {
            hex_char(&body[1..]).unwrap_or_default()
        }
        // \\, \', \", \/ and line continuations
        _ => body.trim_start_matches(['\r', '\n']).to_string(),
    }
}

fn hex_char(hex: &str) -> Option<String> {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .map(String::from)
}

fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// Routes from every `<script>` without a `src`.
pub fn extract_inline_script_routes(document: &Html, scope: &ScopePolicy) -> Extraction {
    let mut out = Extraction::default();
    let sel = selector("script:not([src])");

    let mut analyzer = match ScriptAnalyzer::new() {
        Ok(a) => a,
        Err(e) => {
            out.push_error(e);
            return out;
        }
    };

    for script in document.select(&sel) {
        let source: String = script.text().collect();
        if source.trim().is_empty() {
            continue;
        }
        out.absorb(analyzer.analyze(&source, scope));
    }

    out.merged()
}

/// Resolved URLs of the external `.js` scripts worth fetching.
///
/// In base-domain mode only relative `src` values are followed.
pub fn script_sources(document: &Html, scope: &ScopePolicy) -> (Vec<String>, Vec<String>) {
    let mut sources = Vec::new();
    let mut errors = Vec::new();
    let sel = selector("script[src]");

    for script in document.select(&sel) {
        let Some(src) = script.value().attr("src").filter(|s| !s.is_empty()) else {
            continue;
        };
        if !src.ends_with(".js") {
            continue;
        }
        if scope.mode == ScopeMode::BaseDomainOnly && is_absolute_url(src) {
            continue;
        }
        let full_url = match resolve(&scope.target, src) {
            Ok(u) => u,
            Err(e) => {
                errors.push(e.to_string());
                continue;
            }
        };
        if !scope.allows(&full_url) {
            continue;
        }
        if !sources.contains(&full_url) {
            sources.push(full_url);
        }
    }

    (sources, errors)
}

/// Fetch each script and analyze it. Failed fetches are recorded and skipped.
pub async fn extract_script_routes(
    sources: Vec<String>,
    scope: &ScopePolicy,
    client: &reqwest::Client,
) -> Extraction {
    let mut out = Extraction::default();
    if sources.is_empty() {
        return out;
    }
    info!(count = sources.len(), "fetching scripts");

    let fetched: Vec<(String, Result<String>)> = stream::iter(sources)
        .map(|url| async move {
            let body = fetch_script(client, &url).await;
            (url, body)
        })
        .buffered(FETCH_CONCURRENCY)
        .collect()
        .await;

    let mut analyzer = match ScriptAnalyzer::new() {
        Ok(a) => a,
        Err(e) => {
            out.push_error(e);
            return out;
        }
    };

    for (url, body) in fetched {
        match body {
            Ok(source) => {
                debug!(script = %url, bytes = source.len(), "analyzing script");
                out.urls.insert(url);
                out.absorb(analyzer.analyze(&source, scope));
            }
            Err(e) => out.push_error(e),
        }
    }

    out.merged()
}

async fn fetch_script(client: &reqwest::Client, url: &str) -> Result<String> {
    let fetch_err = |reason: String| RouteCaptureError::ScriptFetch {
        url: url.to_string(),
        reason,
    };

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_err(e.to_string()))?;

    let status = resp.status();
    if status.as_u16() != 200 {
        return Err(fetch_err(format!("status {status}")));
    }

    let body = resp.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
    if body.len() > MAX_SCRIPT_SIZE {
        return Err(fetch_err(format!("{} bytes exceeds the size limit", body.len())));
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}
