// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Error Types
 * Proxy-path error classification with thiserror
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use axum::http::StatusCode;
use thiserror::Error;

/// Failures on the proxy's upstream path. Everything else in the
/// generator goes through `anyhow` on application paths.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Upstream request failed for {url}: {source}")]
    Upstream {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream body read failed for {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ProxyError {
    /// Status the client sees when the upstream could not be reached at
    /// all (a reachable upstream propagates its own status instead).
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Upstream { source, .. } if source.is_timeout() => {
                StatusCode::GATEWAY_TIMEOUT
            }
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}
