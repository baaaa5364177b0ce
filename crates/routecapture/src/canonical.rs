//! URL canonicalization and parameter extraction.
//!
//! Route URLs are keyed without their query string (and fragment), with any
//! trailing slash removed so that `https://example.com/` and
//! `https://example.com` collapse to the same route.

use crate::error::{Result, RouteCaptureError};
use crate::types::Param;
use serde_json::{Map, Value};
use url::Url;

/// Resolve a possibly-relative reference against `base`.
///
/// Trailing slashes are stripped from the result.
pub fn resolve(base: &str, reference: &str) -> Result<String> {
    let base_url = Url::parse(base).map_err(|e| RouteCaptureError::malformed_url(base, e))?;
    let joined = base_url
        .join(reference.trim())
        .map_err(|e| RouteCaptureError::malformed_url(reference, e))?;
    Ok(joined.as_str().trim_end_matches('/').to_string())
}

/// Remove the query string and fragment from `url`.
pub fn strip_query(url: &str) -> Result<String> {
    let mut parsed = Url::parse(url).map_err(|e| RouteCaptureError::malformed_url(url, e))?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// One [`Param`] per distinct query key, in first-seen order, with every
/// value present for that key.
pub fn parse_query_params(url: &Url) -> Vec<Param> {
    let mut params: Vec<Param> = Vec::new();
    for (key, value) in url.query_pairs() {
        match params.iter_mut().find(|p| p.name == key) {
            Some(existing) => existing.example_values.push(value.into_owned()),
            None => params.push(Param::with_values(key.into_owned(), vec![value.into_owned()])),
        }
    }
    params
}

/// Decode a request body into named parameters.
///
/// Bodies starting with `{` are decoded as a JSON object: each top-level key
/// becomes a parameter whose single example value is the JSON encoding of its
/// value. Anything else is decoded as `application/x-www-form-urlencoded`.
pub fn parse_body_params(raw: &str, content_type: Option<&str>) -> Result<Vec<Param>> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') {
        return parse_json_body(trimmed);
    }

    let content_type = content_type.map(|c| c.to_ascii_lowercase());
    if let Some(ct) = content_type.as_deref() {
        if ct.contains("json") {
            return Err(RouteCaptureError::BodyParse(
                "JSON body is not an object".to_string(),
            ));
        }
        if ct.starts_with("multipart/") {
            return Err(RouteCaptureError::BodyParse(
                "multipart bodies are not decoded".to_string(),
            ));
        }
    }

    parse_form_body(raw)
}

fn parse_json_body(raw: &str) -> Result<Vec<Param>> {
    let object: Map<String, Value> = serde_json::from_str(raw)
        .map_err(|e| RouteCaptureError::BodyParse(format!("failed to parse json: {e}")))?;

    object
        .into_iter()
        .map(|(key, value)| {
            let encoded = serde_json::to_string(&value).map_err(|e| {
                RouteCaptureError::BodyParse(format!("failed to stringify json value: {e}"))
            })?;
            Ok(Param::with_values(key, vec![encoded]))
        })
        .collect()
}

fn parse_form_body(raw: &str) -> Result<Vec<Param>> {
    validate_form_encoding(raw)?;

    let mut params: Vec<Param> = Vec::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        match params.iter_mut().find(|p| p.name == key) {
            Some(existing) => existing.example_values.push(value.into_owned()),
            None => params.push(Param::with_values(key.into_owned(), vec![value.into_owned()])),
        }
    }
    Ok(params)
}

/// `form_urlencoded::parse` accepts anything; reject what a strict decoder
/// would: bad percent escapes and `;` separators.
fn validate_form_encoding(raw: &str) -> Result<()> {
    if raw.contains(';') {
        return Err(RouteCaptureError::BodyParse(
            "failed to parse form-urlencoded data: invalid semicolon separator".to_string(),
        ));
    }

    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(RouteCaptureError::BodyParse(format!(
                    "failed to parse form-urlencoded data: invalid escape at byte {i}"
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Whether `reference` names a host on its own (scheme or protocol-relative).
pub fn is_absolute_url(reference: &str) -> bool {
    reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("//")
}
