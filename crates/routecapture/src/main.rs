// Copyright 2026 RouteCapture Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use routecapture::output::{render, write_output, OutputFormat};
use routecapture::{capture_routes, BrowserbaseConfig, CaptureMethod, RouteCaptureConfig, ScopeMode};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "routecapture",
    about = "RouteCapture: discover the HTTP routes a web page can reach",
    version
)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Signal, global = true)]
    output: OutputFormat,

    /// Write the report to this file instead of stdout
    #[arg(long, short = 'f', global = true)]
    output_file: Option<PathBuf>,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// URL to capture
    #[arg(long)]
    target: String,

    /// Keep only URLs on the target's base domain and its subdomains
    #[arg(long, default_value_t = true, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    base_urls_only: bool,

    /// Capture timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Do not report stylesheets, images, fonts and media as routes
    #[arg(long)]
    skip_static_assets: bool,
}

impl TargetArgs {
    fn config(&self, method: CaptureMethod) -> RouteCaptureConfig {
        let mut config = RouteCaptureConfig::new(&self.target, method);
        config.scope = ScopeMode::from_base_urls_only(self.base_urls_only);
        config.timeout = Duration::from_secs(self.timeout);
        config.skip_static_assets = self.skip_static_assets;
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the page with a plain HTTP request
    Request {
        #[command(flatten)]
        target: TargetArgs,
        /// Accept invalid TLS certificates
        #[arg(long)]
        insecure: bool,
    },
    /// Capture the page in a local headless Chromium
    Browser {
        #[command(flatten)]
        target: TargetArgs,
        /// Path to the browser executable
        #[arg(long = "browserPath")]
        browser_path: Option<PathBuf>,
    },
    /// Capture the page in a remote Browserbase session
    Browserbase {
        #[command(flatten)]
        target: TargetArgs,
        /// Browserbase API key
        #[arg(long, env = "BROWSERBASE_API_KEY", hide_env_values = true)]
        token: String,
        /// Browserbase project id
        #[arg(long, env = "BROWSERBASE_PROJECT_ID")]
        project: String,
        /// Route the session through Browserbase's proxy
        #[arg(long)]
        proxy: bool,
        /// Geolocated proxy country. Can be repeated.
        #[arg(long = "country")]
        countries: Vec<String>,
    },
}

impl Commands {
    fn config(self) -> RouteCaptureConfig {
        match self {
            Commands::Request { target, insecure } => {
                let mut config = target.config(CaptureMethod::Request);
                config.insecure = insecure;
                config
            }
            Commands::Browser {
                target,
                browser_path,
            } => {
                let mut config = target.config(CaptureMethod::Browser);
                config.browser_path = browser_path;
                config
            }
            Commands::Browserbase {
                target,
                token,
                project,
                proxy,
                countries,
            } => {
                let mut bb = BrowserbaseConfig::new(token, project).with_countries(countries);
                if proxy {
                    bb = bb.with_proxy();
                }
                let mut config = target.config(CaptureMethod::Browserbase);
                config.browserbase = Some(bb);
                config
            }
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if quiet {
        "routecapture=error"
    } else if verbose {
        "routecapture=debug"
    } else {
        "routecapture=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let started_at = chrono::Utc::now();
    let config = cli.command.config();
    info!("routecapture v{}", env!("CARGO_PKG_VERSION"));

    let report = capture_routes(&config).await;

    let rendered = render(&report, cli.output, started_at).context("failed to render report")?;
    write_output(&rendered, cli.output_file.as_deref()).with_context(|| match &cli.output_file {
        Some(path) => format!("failed to write report to {}", path.display()),
        None => "failed to write report".to_string(),
    })?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    let quiet = cli.quiet;

    let result = run(cli).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !quiet {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_urls_only_flag_forms() {
        let cli = Cli::parse_from(["routecapture", "request", "--target", "https://example.com"]);
        assert_eq!(cli.command.config().scope, ScopeMode::BaseDomainOnly);

        let cli = Cli::parse_from([
            "routecapture",
            "request",
            "--target",
            "https://example.com",
            "--base-urls-only=false",
        ]);
        assert_eq!(cli.command.config().scope, ScopeMode::Unrestricted);
    }

    #[test]
    fn test_browserbase_config_from_flags() {
        let cli = Cli::parse_from([
            "routecapture",
            "--output",
            "yaml",
            "browserbase",
            "--target",
            "https://example.com",
            "--token",
            "key",
            "--project",
            "proj",
            "--country",
            "US",
            "--timeout",
            "10",
        ]);
        assert_eq!(cli.output, OutputFormat::Yaml);
        let config = cli.command.config();
        assert_eq!(config.method, CaptureMethod::Browserbase);
        assert_eq!(config.timeout, Duration::from_secs(10));
        let bb = config.browserbase.unwrap();
        assert_eq!(bb.countries, vec!["US"]);
        assert!(bb.proxy);
    }

    #[test]
    fn test_browser_path_flag() {
        let cli = Cli::parse_from([
            "routecapture",
            "browser",
            "--target",
            "https://example.com",
            "--browserPath",
            "/opt/chrome",
        ]);
        let config = cli.command.config();
        assert_eq!(config.browser_path, Some(PathBuf::from("/opt/chrome")));
    }
}
