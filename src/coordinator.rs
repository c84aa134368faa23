// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Crawl Coordinator
 * Wires frontier, servers, engine and browser together for one crawl
 * and tears everything down when the budget runs out
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::browser::HeadlessBrowser;
use crate::config::CrawlConfig;
use crate::csp::Policy;
use crate::endpoint;
use crate::engine::PolicyEngine;
use crate::frontier::{self, FrontierHandle};
use crate::proxy::{self, ProxyState};
use crate::report::{reporting_group_json, REPORTING_API_GROUP};
use crate::server::ServerHandle;

/// Settle time after binding each embedded server.
const SERVER_STARTUP_WAIT: Duration = Duration::from_secs(1);

/// Run one full crawl: start the servers, drive the browser over the
/// frontier until the timeout or an empty queue, emit the final policy.
pub async fn run(config: &CrawlConfig) -> Result<Policy> {
    config.validate()?;
    info!(
        "Deriving policy for {} through proxy port {}",
        config.target_domain, config.proxy_port
    );

    let (frontier, frontier_task) = frontier::spawn(config.starting_uris.clone());

    // The endpoint listener binds first so the report-uri directive can
    // name its OS-chosen port before the policy is assembled.
    let endpoint_listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .context("Failed to bind report endpoint")?;
    let endpoint_port = endpoint_listener
        .local_addr()
        .context("Report endpoint has no local address")?
        .port();
    let report_uri = format!("http://localhost:{}/uri", endpoint_port);
    let report_to_group = config.use_reporting_api.then_some(REPORTING_API_GROUP);

    let engine = Arc::new(PolicyEngine::new(
        config.proxy_port,
        report_to_group,
        Some(&report_uri),
    )?);

    let endpoint_server = ServerHandle::spawn(
        "Endpoint",
        endpoint_listener,
        endpoint::router(engine.clone()),
    );
    info!("Report endpoint listening on port {}", endpoint_port);
    tokio::time::sleep(SERVER_STARTUP_WAIT).await;

    let report_to = config
        .use_reporting_api
        .then(|| reporting_group_json(&format!("http://localhost:{}/api", endpoint_port)));
    let state = Arc::new(ProxyState::new(
        config.proxy_port,
        &config.target_domain,
        engine.clone(),
        Some(frontier.clone()),
        report_to,
    )?);
    let proxy_listener = TcpListener::bind(("127.0.0.1", config.proxy_port))
        .await
        .with_context(|| format!("Failed to bind proxy port {}", config.proxy_port))?;
    let proxy_server = ServerHandle::spawn("Proxy", proxy_listener, proxy::router(state));
    info!("Proxy listening on port {}", config.proxy_port);
    tokio::time::sleep(SERVER_STARTUP_WAIT).await;

    let mut browser: Option<HeadlessBrowser> = None;
    let crawl_budget = Duration::from_secs(config.timeout_minutes * 60);
    match tokio::time::timeout(crawl_budget, crawl_loop(config, &frontier, &mut browser)).await {
        Ok(()) => info!("Frontier exhausted"),
        Err(_) => info!("Crawl timeout of {} minutes reached", config.timeout_minutes),
    }

    info!("Policy for {}:", config.target_domain);
    if let Some(browser) = browser.take() {
        if let Err(e) = browser.quit().await {
            warn!("Browser quit failed: {:#}", e);
        }
    }
    frontier.close().await;
    let _ = frontier_task.await;

    let policy = engine.snapshot().await;
    info!("{}", policy);

    proxy_server.stop().await;
    endpoint_server.stop().await;

    Ok(policy)
}

/// Visit frontier URLs until the queue runs dry. The browser launches on
/// the first visit; a driver failure ends the crawl (the caller still
/// runs the shutdown sequence).
async fn crawl_loop(
    config: &CrawlConfig,
    frontier: &FrontierHandle,
    browser_slot: &mut Option<HeadlessBrowser>,
) {
    // The CDP connection must outlive the quiet periods between visits
    let idle_timeout = Duration::from_secs(config.timeout_minutes * 60 + 120);

    loop {
        let Some(path) = frontier.get_url().await else {
            break;
        };
        let url = format!("http://localhost:{}{}", config.proxy_port, path);
        info!("Visiting {}", url);

        let browser = match browser_slot {
            Some(browser) => browser,
            None => match HeadlessBrowser::launch(config.browser, idle_timeout).await {
                Ok(browser) => browser_slot.insert(browser),
                Err(e) => {
                    error!("Browser launch failed: {:#}", e);
                    break;
                }
            },
        };

        if let Err(e) = browser.load(&url).await {
            error!("Browser failed to load {}: {:#}", url, e);
            break;
        }

        // Give the page time to emit its violation reports
        tokio::time::sleep(Duration::from_secs(config.load_delay_secs)).await;
    }
}
