// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Crawl Coordinator Tests
 * Lifecycle and termination behavior without a live browser
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use panssari::config::CrawlConfig;
use panssari::coordinator;

#[tokio::test]
async fn test_empty_frontier_terminates_and_emits_policy() {
    let mut config = CrawlConfig::new(18571, "example.com");
    // No seeds: the first GetUrl returns nothing and the crawl ends
    // before any browser is ever launched
    config.starting_uris = Vec::new();
    config.timeout_minutes = 1;

    let policy = coordinator::run(&config).await.unwrap();

    let wire = policy.to_string();
    assert!(wire.contains("default-src 'none'"));
    assert!(wire.contains("report-uri http://localhost:"));
    assert!(!wire.contains("sandbox"));
}

#[tokio::test]
async fn test_zero_timeout_terminates_without_visiting() {
    let mut config = CrawlConfig::new(18572, "example.com");
    config.timeout_minutes = 0;

    let policy = coordinator::run(&config).await.unwrap();
    assert!(policy.to_string().contains("default-src 'none'"));
}

#[tokio::test]
async fn test_invalid_target_rejected_before_any_server_starts() {
    let config = CrawlConfig::new(18573, "https://example.com");
    assert!(coordinator::run(&config).await.is_err());
}
