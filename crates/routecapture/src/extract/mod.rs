//! Route extractors.
//!
//! Each technique walks the same captured page independently and returns its
//! own [`Extraction`]; nothing is shared between them. Failures inside an
//! extractor are recorded in its `errors` and never cross its boundary.

pub mod html;
pub mod network;
pub mod script;

use crate::merge::merge_routes;
use crate::types::Route;
use std::collections::BTreeSet;

/// Routes, URLs and diagnostics produced by one technique.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub routes: Vec<Route>,
    pub urls: BTreeSet<String>,
    pub errors: Vec<String>,
}

impl Extraction {
    /// Fold another extraction into this one.
    pub fn absorb(&mut self, other: Extraction) {
        self.routes.extend(other.routes);
        self.urls.extend(other.urls);
        self.errors.extend(other.errors);
    }

    pub fn push_error(&mut self, error: impl ToString) {
        self.errors.push(error.to_string());
    }

    /// Collapse duplicate routes; every extractor returns merged output.
    pub fn merged(mut self) -> Self {
        self.routes = merge_routes(self.routes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HttpMethod;

    #[test]
    fn test_absorb_and_merge() {
        let mut a = Extraction::default();
        a.routes.push(Route::new("https://example.com/x", HttpMethod::Get));
        a.urls.insert("https://example.com/x".to_string());

        let mut b = Extraction::default();
        b.routes.push(Route::new("https://example.com/x", HttpMethod::Get));
        b.urls.insert("https://example.com/x".to_string());
        b.push_error("boom");

        a.absorb(b);
        let merged = a.merged();
        assert_eq!(merged.routes.len(), 1);
        assert_eq!(merged.urls.len(), 1);
        assert_eq!(merged.errors, vec!["boom"]);
    }
}
