// Copyright 2026 RouteCapture Contributors
// SPDX-License-Identifier: Apache-2.0

//! RouteCapture: HTTP route discovery for web targets.
//!
//! A target page is captured once (plain request, local headless Chromium or
//! a remote Browserbase session), then forms, anchors, links, scripts and
//! live network traffic are mined for the HTTP routes the page can reach.
//! The result is a single merged [`RouteCaptureReport`].

pub mod canonical;
pub mod capture;
pub mod config;
pub mod error;
pub mod extract;
pub mod merge;
pub mod orchestrator;
pub mod output;
pub mod scope;
pub mod types;

pub use config::{BrowserbaseConfig, RouteCaptureConfig};
pub use error::{Result, RouteCaptureError};
pub use orchestrator::{capture_routes, capture_routes_with};
pub use types::{CaptureMethod, HttpMethod, Param, Route, RouteCaptureReport, ScopeMode};
