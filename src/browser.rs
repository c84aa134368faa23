// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Headless Browser Driver
 * Thin load/quit controller over headless_chrome; the CDP crate is
 * synchronous, so every call runs on the blocking pool
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Which browser binary drives the crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Firefox,
}

/// Candidate Firefox binaries, probed in order.
const FIREFOX_PATHS: &[&str] = &[
    "/usr/bin/firefox",
    "/usr/local/bin/firefox",
    "/snap/bin/firefox",
    "/Applications/Firefox.app/Contents/MacOS/firefox",
];

/// A launched headless browser holding one tab for the whole crawl.
pub struct HeadlessBrowser {
    // Kept alive for the crawl; dropping it terminates the process
    browser: Browser,
    tab: Arc<Tab>,
}

impl HeadlessBrowser {
    /// Launch the browser. `idle_timeout` bounds how long the underlying
    /// process may sit without CDP traffic before it is reaped.
    pub async fn launch(kind: BrowserKind, idle_timeout: Duration) -> Result<HeadlessBrowser> {
        tokio::task::spawn_blocking(move || Self::launch_sync(kind, idle_timeout))
            .await
            .context("Browser launch task panicked")?
    }

    fn launch_sync(kind: BrowserKind, idle_timeout: Duration) -> Result<HeadlessBrowser> {
        let mut builder = LaunchOptions::default_builder();
        builder.headless(true).idle_browser_timeout(idle_timeout);

        if kind == BrowserKind::Firefox {
            let path = std::env::var("FIREFOX_BIN")
                .ok()
                .map(std::path::PathBuf::from)
                .or_else(|| {
                    FIREFOX_PATHS
                        .iter()
                        .map(std::path::PathBuf::from)
                        .find(|p| p.exists())
                })
                .ok_or_else(|| anyhow!("No Firefox binary found (set FIREFOX_BIN)"))?;
            builder.path(Some(path));
        }

        let options = builder
            .build()
            .map_err(|e| anyhow!("Browser launch options error: {}", e))?;
        let browser = Browser::new(options).context("Failed to launch browser")?;
        let tab = browser.new_tab().context("Failed to create tab")?;

        info!("[Browser] Launched {:?}", kind);
        Ok(HeadlessBrowser { browser, tab })
    }

    /// Navigate the crawl tab and block until the page settles.
    pub async fn load(&self, url: &str) -> Result<()> {
        let tab = self.tab.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            tab.navigate_to(&url).context("Failed to navigate")?;
            tab.wait_until_navigated().context("Navigation timeout")?;
            Ok(())
        })
        .await
        .context("Browser load task panicked")?
    }

    /// Terminate the browser process.
    pub async fn quit(self) -> Result<()> {
        debug!("[Browser] Quitting");
        let HeadlessBrowser { browser, tab } = self;
        tokio::task::spawn_blocking(move || {
            drop(tab);
            drop(browser);
        })
        .await
        .context("Browser quit task panicked")
    }
}
