// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Crawl Configuration
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::browser::BrowserKind;

/// Everything one automated crawl of one target needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Local port the rewriting proxy binds
    pub proxy_port: u16,
    /// Origin host being proxied, without a scheme ("example.com")
    pub target_domain: String,
    /// Paths seeding the frontier
    pub starting_uris: Vec<String>,
    pub browser: BrowserKind,
    /// Post-load wait so violation reports can arrive
    pub load_delay_secs: u64,
    /// Wall-clock budget for the whole crawl
    pub timeout_minutes: u64,
    /// Also advertise a Reporting API group via Report-To
    pub use_reporting_api: bool,
}

impl CrawlConfig {
    pub fn new(proxy_port: u16, target_domain: &str) -> CrawlConfig {
        CrawlConfig {
            proxy_port,
            target_domain: target_domain.to_string(),
            starting_uris: vec!["/".to_string()],
            browser: BrowserKind::Chrome,
            load_delay_secs: 2,
            timeout_minutes: 10,
            use_reporting_api: false,
        }
    }

    /// Reject domains that smuggle in a scheme or path; the proxy builds
    /// upstream URLs by plain concatenation.
    pub fn validate(&self) -> Result<()> {
        if self.target_domain.is_empty() {
            bail!("Target domain must not be empty");
        }
        if self.target_domain.contains("://") {
            bail!(
                "Target domain must not carry a scheme: {}",
                self.target_domain
            );
        }
        let parsed = Url::parse(&format!("https://{}", self.target_domain))
            .with_context(|| format!("Invalid target domain: {}", self.target_domain))?;
        if parsed.path() != "/" {
            bail!(
                "Target domain must not carry a path: {}",
                self.target_domain
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlConfig::new(8080, "example.com");
        assert_eq!(config.starting_uris, vec!["/".to_string()]);
        assert_eq!(config.load_delay_secs, 2);
        assert_eq!(config.timeout_minutes, 10);
        assert_eq!(config.browser, BrowserKind::Chrome);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_scheme_and_path() {
        assert!(CrawlConfig::new(8080, "https://example.com")
            .validate()
            .is_err());
        assert!(CrawlConfig::new(8080, "example.com/app")
            .validate()
            .is_err());
        assert!(CrawlConfig::new(8080, "").validate().is_err());
        assert!(CrawlConfig::new(8080, "example.com:8443").validate().is_ok());
    }
}
