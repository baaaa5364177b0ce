//! Route extraction from `<form>`, `<a href>` and `<link href>` elements.

use super::Extraction;
use crate::canonical::{resolve, strip_query};
use crate::scope::ScopePolicy;
use crate::types::{HttpMethod, Param, Route};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Routes from every `<form>`.
///
/// The action resolves against the target (absent or empty means the current
/// page), the method defaults to GET, and each named field becomes a body
/// parameter for POST/PUT/PATCH forms or a query parameter otherwise. Forms
/// that are out of scope or whose action cannot be canonicalized are skipped
/// without an error.
pub fn extract_form_routes(document: &Html, scope: &ScopePolicy) -> Extraction {
    let mut out = Extraction::default();
    let form_sel = selector("form");
    let field_sel = selector("input[name], select[name], textarea[name]");

    for form in document.select(&form_sel) {
        let action = form.value().attr("action").unwrap_or("");
        let Ok(full_url) = resolve(&scope.target, action) else {
            debug!(action, "skipping form with unresolvable action");
            continue;
        };
        if !scope.allows(&full_url) {
            debug!(url = %full_url, "skipping out-of-scope form");
            continue;
        }
        let Ok(url) = strip_query(&full_url) else {
            continue;
        };

        let method = form
            .value()
            .attr("method")
            .filter(|m| !m.trim().is_empty())
            .and_then(|m| m.parse::<HttpMethod>().ok())
            .unwrap_or_default();

        let params = form_fields(form, &field_sel);
        let route = if method.carries_body() {
            Route::new(url.clone(), method).with_body_params(params)
        } else {
            Route::new(url.clone(), method).with_query_params(params)
        };

        out.urls.insert(url);
        out.routes.push(route);
    }

    out.merged()
}

/// Named fields of a form, one parameter per distinct name. Non-empty
/// `value` attributes are kept as example values.
fn form_fields(form: ElementRef<'_>, field_sel: &Selector) -> Vec<Param> {
    let mut params: Vec<Param> = Vec::new();
    for field in form.select(field_sel) {
        let Some(name) = field.value().attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };
        let value = field.value().attr("value").filter(|v| !v.is_empty());

        match params.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.example_values.extend(value.map(str::to_string)),
            None => {
                let mut param = Param::named(name);
                param.example_values.extend(value.map(str::to_string));
                params.push(param);
            }
        }
    }
    params
}

/// GET routes from every `<a href>`.
pub fn extract_anchor_routes(document: &Html, scope: &ScopePolicy) -> Extraction {
    extract_href_routes(document, scope, "a[href]")
}

/// GET routes from every `<link href>`.
pub fn extract_link_routes(document: &Html, scope: &ScopePolicy) -> Extraction {
    extract_href_routes(document, scope, "link[href]")
}

fn extract_href_routes(document: &Html, scope: &ScopePolicy, css: &str) -> Extraction {
    let mut out = Extraction::default();
    let sel = selector(css);

    for element in document.select(&sel) {
        let Some(href) = element.value().attr("href").filter(|h| !h.trim().is_empty()) else {
            continue;
        };

        let url = match resolve(&scope.target, href).and_then(|full| strip_query(&full)) {
            Ok(url) => url,
            Err(e) => {
                out.push_error(e);
                continue;
            }
        };

        if !scope.allows(&url) {
            continue;
        }

        out.urls.insert(url.clone());
        out.routes.push(Route::new(url, HttpMethod::Get));
    }

    out.merged()
}

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("built-in selector is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScopeMode;

    const BASE: &str = "https://app.example.com";

    fn scope() -> ScopePolicy {
        ScopePolicy::new(BASE, ScopeMode::BaseDomainOnly)
    }

    fn names(params: &[Param]) -> Vec<&str> {
        params.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_login_form_yields_post_route() {
        let doc = Html::parse_document(
            r#"<form action="/login" method="POST"><input name="user"><input name="pass"></form>"#,
        );
        let out = extract_form_routes(&doc, &scope());
        assert_eq!(out.routes.len(), 1);
        let route = &out.routes[0];
        assert_eq!(route.method, HttpMethod::Post);
        assert_eq!(route.url, "https://app.example.com/login");
        assert_eq!(route.path, "/login");
        assert_eq!(names(&route.body_params), vec!["user", "pass"]);
        assert!(route.query_params.is_empty());
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_forms_to_same_action_merge() {
        let doc = Html::parse_document(
            r#"
            <form action="/submit" method="post"><input name="id"></form>
            <form action="/submit" method="post"><input name="id"><textarea name="extra"></textarea></form>
            "#,
        );
        let out = extract_form_routes(&doc, &scope());
        assert_eq!(out.routes.len(), 1);
        assert_eq!(names(&out.routes[0].body_params), vec!["id", "extra"]);
    }

    #[test]
    fn test_get_form_defaults_and_query_params() {
        let doc = Html::parse_document(
            r#"<form><input name="q" value="rust"><select name="sort"></select><input type="submit"></form>"#,
        );
        let out = extract_form_routes(&doc, &scope());
        let route = &out.routes[0];
        assert_eq!(route.method, HttpMethod::Get);
        assert_eq!(route.url, BASE);
        assert_eq!(names(&route.query_params), vec!["q", "sort"]);
        assert_eq!(route.query_params[0].example_values, vec!["rust"]);
    }

    #[test]
    fn test_out_of_scope_form_is_silently_skipped() {
        let doc = Html::parse_document(
            r#"<form action="https://evil.com/steal" method="post"><input name="x"></form>"#,
        );
        let out = extract_form_routes(&doc, &scope());
        assert!(out.routes.is_empty());
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_anchor_routes_strip_query_and_scope() {
        let doc = Html::parse_document(
            r#"
            <a href="/about?ref=nav">About</a>
            <a href="https://www.example.com/pricing">Pricing</a>
            <a href="https://evil.com/x">Evil</a>
            <a href="mailto:hi@example.com">Mail</a>
            <a href="">Empty</a>
            <a href="/about">Again</a>
            "#,
        );
        let out = extract_anchor_routes(&doc, &scope());
        let urls: Vec<&str> = out.routes.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://app.example.com/about", "https://www.example.com/pricing"]
        );
        assert!(out.routes.iter().all(|r| r.method == HttpMethod::Get));
        assert!(out.routes.iter().all(|r| r.query_params.is_empty()));
        assert_eq!(out.urls.len(), 2);
    }

    #[test]
    fn test_link_routes() {
        let doc = Html::parse_document(
            r#"<head><link rel="stylesheet" href="/css/site.css"><link rel="canonical" href="https://app.example.com/home/"></head>"#,
        );
        let out = extract_link_routes(&doc, &scope());
        let urls: Vec<&str> = out.routes.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://app.example.com/css/site.css", "https://app.example.com/home"]
        );

        let skipping = scope().skip_static_assets(true);
        let out = extract_link_routes(&doc, &skipping);
        assert_eq!(out.routes.len(), 1);
        assert_eq!(out.routes[0].url, "https://app.example.com/home");
    }

    #[test]
    fn test_unrestricted_keeps_external_anchors() {
        let doc = Html::parse_document(r#"<a href="https://evil.com/x">Evil</a>"#);
        let out = extract_anchor_routes(&doc, &ScopePolicy::new(BASE, ScopeMode::Unrestricted));
        assert_eq!(out.routes.len(), 1);
    }
}
