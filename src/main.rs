// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Panssari - CSP Policy Generator
 * Derives a minimal working Content-Security-Policy for a target origin
 * by proxying it locally, injecting a maximally strict report-only
 * policy and relaxing it with every violation an automated browser
 * session reports
 *
 * (c) 2026 Bountyy Oy
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;
use tracing::{error, info, Level};

use panssari::browser::BrowserKind;
use panssari::config::CrawlConfig;
use panssari::coordinator;
use panssari::endpoint;
use panssari::engine::PolicyEngine;
use panssari::proxy::{self, ProxyState};

/// Panssari - CSP Policy Generator
#[derive(Parser)]
#[command(name = "panssari")]
#[command(author = "Bountyy Oy <info@bountyy.fi>")]
#[command(version = "1.2.0")]
#[command(about = "Derive a working Content Security Policy by watching what a site actually loads", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rewriting proxy only
    Proxy {
        /// Local port the proxy binds
        #[arg(long)]
        proxy_port: u16,

        /// Domain to proxy (no scheme)
        #[arg(long)]
        target_domain: String,
    },

    /// Run the proxy together with the violation report endpoint
    EndpointAndProxy {
        /// Local port the proxy binds
        #[arg(long)]
        proxy_port: u16,

        /// Domain to proxy (no scheme)
        #[arg(long)]
        target_domain: String,
    },

    /// Run the full automated crawl pipeline
    AutomatedBrowser {
        /// Local port the proxy binds
        #[arg(long)]
        proxy_port: u16,

        /// Domain(s) to derive policies for, crawled in sequence
        #[arg(long, required = true)]
        target_domain: Vec<String>,

        /// Start path(s) seeding the crawl frontier
        #[arg(long, default_value = "/")]
        alternate_start: Vec<String>,

        /// Browser driving the crawl
        #[arg(long, value_enum, default_value_t = BrowserArg::Chrome)]
        browser: BrowserArg,

        /// Seconds to linger on each page for violation reports
        #[arg(long, default_value_t = 2)]
        delay: u64,

        /// Crawl timeout in minutes
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// Log file (an existing file is rotated to <name>-old.txt)
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BrowserArg {
    Chrome,
    Firefox,
}

impl From<BrowserArg> for BrowserKind {
    fn from(arg: BrowserArg) -> BrowserKind {
        match arg {
            BrowserArg::Chrome => BrowserKind::Chrome,
            BrowserArg::Firefox => BrowserKind::Firefox,
        }
    }
}

fn rotate_old_log(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("log");
    let rotated = path.with_file_name(format!("{}-old.txt", stem));
    std::fs::rename(path, &rotated)
        .with_context(|| format!("Failed to rotate log file to {}", rotated.display()))?;
    Ok(())
}

fn init_logging(log_file: Option<&Path>, verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    match log_file {
        Some(path) => {
            rotate_old_log(path)?;
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

async fn run_proxy_only(proxy_port: u16, target_domain: &str) -> Result<()> {
    CrawlConfig::new(proxy_port, target_domain).validate()?;

    // Strict policy, no reporting directives: there is no endpoint to
    // receive violations, so the policy only evolves via form scraping
    let engine = Arc::new(PolicyEngine::new(proxy_port, None, None)?);
    let state = Arc::new(ProxyState::new(
        proxy_port,
        target_domain,
        engine,
        None,
        None,
    )?);

    let listener = TcpListener::bind(("127.0.0.1", proxy_port))
        .await
        .with_context(|| format!("Failed to bind proxy port {}", proxy_port))?;
    info!("Proxy for {} listening on port {}", target_domain, proxy_port);

    axum::serve(listener, proxy::router(state).into_make_service())
        .await
        .context("Proxy server error")
}

async fn run_endpoint_and_proxy(proxy_port: u16, target_domain: &str) -> Result<()> {
    CrawlConfig::new(proxy_port, target_domain).validate()?;

    let endpoint_listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .context("Failed to bind report endpoint")?;
    let endpoint_port = endpoint_listener
        .local_addr()
        .context("Report endpoint has no local address")?
        .port();
    let report_uri = format!("http://localhost:{}/uri", endpoint_port);

    let engine = Arc::new(PolicyEngine::new(proxy_port, None, Some(&report_uri))?);

    let endpoint_router = endpoint::router(engine.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(endpoint_listener, endpoint_router.into_make_service()).await {
            error!("Report endpoint error: {}", e);
        }
    });
    info!("Report endpoint listening on port {}", endpoint_port);

    let state = Arc::new(ProxyState::new(
        proxy_port,
        target_domain,
        engine,
        None,
        None,
    )?);
    let listener = TcpListener::bind(("127.0.0.1", proxy_port))
        .await
        .with_context(|| format!("Failed to bind proxy port {}", proxy_port))?;
    info!("Proxy for {} listening on port {}", target_domain, proxy_port);

    axum::serve(listener, proxy::router(state).into_make_service())
        .await
        .context("Proxy server error")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Proxy {
            proxy_port,
            target_domain,
        } => {
            init_logging(None, cli.verbose)?;
            run_proxy_only(proxy_port, &target_domain).await
        }
        Commands::EndpointAndProxy {
            proxy_port,
            target_domain,
        } => {
            init_logging(None, cli.verbose)?;
            run_endpoint_and_proxy(proxy_port, &target_domain).await
        }
        Commands::AutomatedBrowser {
            proxy_port,
            target_domain,
            alternate_start,
            browser,
            delay,
            timeout,
            log,
        } => {
            init_logging(log.as_deref(), cli.verbose)?;
            for domain in &target_domain {
                let mut config = CrawlConfig::new(proxy_port, domain);
                config.starting_uris = alternate_start.clone();
                config.browser = browser.into();
                config.load_delay_secs = delay;
                config.timeout_minutes = timeout;
                coordinator::run(&config).await?;
            }
            Ok(())
        }
    }
}
