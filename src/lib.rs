// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Panssari Library
 * Exposes the CSP generator modules for testing
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */
pub mod browser;
pub mod config;
pub mod coordinator;
pub mod endpoint;
pub mod engine;
pub mod frontier;
pub mod proxy;
pub mod report;

// Typed CSP model: options, directives, policy map
pub mod csp;

// Production error handling
pub mod errors;

// Embedded server lifecycle plumbing
pub mod server;
