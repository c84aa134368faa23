// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Violation Report Endpoint
 * Receives CSP violation reports from the browser and feeds them to the
 * relaxation engine; CORS-open so any proxied origin may post
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::HeaderValue;
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tracing::{debug, info, warn};

use crate::engine::PolicyEngine;
use crate::report::{ApiReport, LegacyReportBody};

/// Reports arrive from whatever origin the browser happens to be on.
async fn cors(request: Request, next: Next) -> Response {
    let preflight = request.method() == Method::OPTIONS;
    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, PUT, POST, DELETE, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Authorization, Content-Length, X-Requested-With"),
    );
    response
}

/// `POST /uri` - legacy `application/csp-report` payloads.
///
/// The browser gets its 200 before the report is processed; decoding and
/// relaxation run after the response is on the wire.
async fn receive_legacy_report(
    State(engine): State<Arc<PolicyEngine>>,
    body: Bytes,
) -> StatusCode {
    tokio::spawn(async move {
        let decoded: LegacyReportBody = match serde_json::from_slice(&body) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("[Endpoint] Undecodable csp-report payload: {}", e);
                return;
            }
        };
        let Some(report) = decoded.csp_report else {
            debug!("[Endpoint] Empty csp-report wrapper");
            return;
        };
        debug!(
            "[Endpoint] Violation of {:?} by {:?}",
            report.effective_directive, report.blocked_uri
        );
        engine.evaluate_violation(&report).await;
    });
    StatusCode::OK
}

/// `POST /api` - Reporting API `application/reports+json` payloads.
/// Logged only; relaxation is driven by the legacy route.
async fn receive_api_report(body: Bytes) -> StatusCode {
    tokio::spawn(async move {
        let decoded: ApiReport = match serde_json::from_slice(&body) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("[Endpoint] Undecodable reports+json payload: {}", e);
                return;
            }
        };
        if decoded.report_type.as_deref() == Some("csp-violation") {
            if let Some(body) = decoded.body {
                info!("[Endpoint] Reporting API violation: {:?}", body);
            }
        }
    });
    StatusCode::OK
}

/// Router for the report endpoint server.
pub fn router(engine: Arc<PolicyEngine>) -> Router {
    Router::new()
        .route("/uri", post(receive_legacy_report))
        .route("/api", post(receive_api_report))
        .layer(middleware::from_fn(cors))
        .with_state(engine)
}
