//! Deduplication of routes across and within extraction techniques.

use crate::types::{HttpMethod, Param, Route};
use std::collections::BTreeMap;

/// Merge routes sharing a `(method, url)` key.
///
/// Query and body parameters are unioned by name. When a name appears in more
/// than one member of a group, their example values are appended without
/// deduplication. Output is sorted by method, then URL.
pub fn merge_routes(routes: Vec<Route>) -> Vec<Route> {
    let mut grouped: BTreeMap<(HttpMethod, String), Route> = BTreeMap::new();

    for route in routes {
        let key = (route.method, route.url.clone());
        match grouped.get_mut(&key) {
            Some(existing) => {
                merge_params(&mut existing.query_params, route.query_params);
                merge_params(&mut existing.body_params, route.body_params);
            }
            None => {
                grouped.insert(key, route);
            }
        }
    }

    grouped.into_values().collect()
}

fn merge_params(into: &mut Vec<Param>, incoming: Vec<Param>) {
    for param in incoming {
        match into.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => existing.example_values.extend(param.example_values),
            None => into.push(param),
        }
    }
}
