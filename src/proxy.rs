// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Rewriting Reverse Proxy
 * Streams the target origin through a local address, rewrites
 * same-origin references, injects the report-only policy header and
 * feeds scraped URLs back into the crawl frontier
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use reqwest::Client;
use tracing::{debug, error, warn};

use crate::engine::PolicyEngine;
use crate::errors::ProxyError;
use crate::frontier::FrontierHandle;

/// Maximum buffered body size (10MB) to prevent memory exhaustion.
/// Bounds both inbound request bodies and upstream HTML pages; oversized
/// HTML is truncated and rewritten as-is rather than buffered whole.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

fn csp_header() -> HeaderName {
    HeaderName::from_static("content-security-policy-report-only")
}

fn report_to_header() -> HeaderName {
    HeaderName::from_static("report-to")
}

/// Hop-by-hop and otherwise unsafe headers, never forwarded upstream.
const UNSAFE_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "accept-encoding",
    "expect",
];

/// Headers never copied back to the client: hop-by-hop, framing headers
/// invalidated by the rewrite, and the target's own enforced policy.
const UNSAFE_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
    "content-security-policy",
];

fn is_unsafe_request_header(name: &str) -> bool {
    UNSAFE_REQUEST_HEADERS.contains(&name)
}

fn is_unsafe_response_header(name: &str) -> bool {
    UNSAFE_RESPONSE_HEADERS.contains(&name)
}

/// Per-target compiled rewrite and scrape patterns.
pub struct Rewriter {
    substitution: Regex,
    browse: Regex,
    form_tag: Regex,
    form_action: Regex,
}

impl Rewriter {
    pub fn new(target_domain: &str) -> Result<Rewriter> {
        let escaped = regex::escape(target_domain);
        Ok(Rewriter {
            // Absolute references to the target collapse to root-relative
            substitution: Regex::new(&format!(r"(https?:)?//{}", escaped))
                .context("Failed to compile substitution pattern")?,
            // The class [^."#?] keeps extensionless, query-less paths only
            browse: Regex::new(&format!(
                r##"(?:href|action)="(?:https?://)?(?:{})?([^."#?]+(?:html?)?)""##,
                escaped
            ))
            .context("Failed to compile browse pattern")?,
            // Tolerant of HTML-escaped and unescaped markup
            form_tag: Regex::new(r"(?s)(?:<|&gt)form(.*?)(?:>|&lt)")
                .context("Failed to compile form pattern")?,
            form_action: Regex::new(r#"action=["']([^"']*)["']"#)
                .context("Failed to compile form action pattern")?,
        })
    }

    /// Replace every absolute reference to the target origin with the
    /// empty string, turning it into a root-relative path.
    pub fn substitute(&self, input: &str) -> String {
        self.substitution.replace_all(input, "").into_owned()
    }

    /// Navigable same-origin paths found in href/action attributes.
    pub fn scrape_paths(&self, html: &str) -> Vec<String> {
        self.browse
            .captures_iter(html)
            .map(|caps| caps[1].to_string())
            .filter(|path| !path.trim().is_empty())
            .collect()
    }

    /// Form action targets, for relaxing `form-action` ahead of any
    /// submission the crawler might trigger.
    pub fn scrape_form_actions(&self, html: &str) -> Vec<String> {
        self.form_tag
            .captures_iter(html)
            .filter_map(|tag| {
                self.form_action
                    .captures(tag.get(1).map_or("", |m| m.as_str()))
                    .map(|caps| caps[1].to_string())
            })
            .filter(|action| !action.is_empty())
            .collect()
    }
}

/// Shared state of the proxy server.
pub struct ProxyState {
    client: Client,
    target_domain: String,
    upstream_scheme: String,
    proxy_port: u16,
    engine: Arc<PolicyEngine>,
    frontier: Option<FrontierHandle>,
    rewriter: Rewriter,
    report_to: Option<String>,
}

impl ProxyState {
    /// `report_to` is the serialized Report-To group definition, present
    /// only when a Reporting API endpoint is configured. `frontier` is
    /// absent when the proxy runs without a crawl.
    pub fn new(
        proxy_port: u16,
        target_domain: &str,
        engine: Arc<PolicyEngine>,
        frontier: Option<FrontierHandle>,
        report_to: Option<String>,
    ) -> Result<ProxyState> {
        // Invalid upstream certificates are only tolerated when testing
        // against self-signed targets
        let accept_invalid_certs = std::env::var("ACCEPT_INVALID_CERTS")
            .map(|v| v == "true")
            .unwrap_or(false);

        let client = Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .context("Failed to create upstream HTTP client")?;

        Ok(ProxyState {
            client,
            target_domain: target_domain.to_string(),
            upstream_scheme: "https".to_string(),
            proxy_port,
            engine,
            frontier,
            rewriter: Rewriter::new(target_domain)?,
            report_to,
        })
    }

    /// Point the upstream at a plain-HTTP origin instead of the default
    /// `https`. Used when the target is a local or mock server.
    pub fn with_upstream_scheme(mut self, scheme: &str) -> ProxyState {
        self.upstream_scheme = scheme.to_string();
        self
    }

    async fn forward(
        &self,
        method: &axum::http::Method,
        request_uri: &str,
        headers: &HeaderMap,
        body: axum::body::Bytes,
    ) -> Result<reqwest::Response, ProxyError> {
        let url = format!(
            "{}://{}{}",
            self.upstream_scheme, self.target_domain, request_uri
        );
        let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .unwrap_or(reqwest::Method::GET);

        let mut request = self.client.request(method, &url);
        for (name, value) in headers {
            if is_unsafe_request_header(name.as_str()) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
                reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                request = request.header(name, value);
            }
        }
        if !body.is_empty() {
            request = request.body(body.to_vec());
        }

        request
            .send()
            .await
            .map_err(|source| ProxyError::Upstream { url, source })
    }

    /// Response headers in injection order: rewritten Location, the
    /// Report-To group, the report-only policy, then every surviving
    /// upstream header that is not already set.
    async fn response_headers(&self, upstream_headers: &reqwest::header::HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(location) = upstream_headers
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
        {
            let rewritten = self.rewriter.substitute(location);
            if let Ok(value) = HeaderValue::from_str(&rewritten) {
                headers.insert(LOCATION, value);
            }
        }

        if let Some(report_to) = &self.report_to {
            if let Ok(value) = HeaderValue::from_str(report_to) {
                headers.insert(report_to_header(), value);
            }
        }

        let policy = self.engine.header_value().await;
        if let Ok(value) = HeaderValue::from_str(&policy) {
            headers.insert(csp_header(), value);
        }

        for name in upstream_headers.keys() {
            if is_unsafe_response_header(name.as_str()) {
                continue;
            }
            let Ok(out_name) = HeaderName::from_bytes(name.as_str().as_bytes()) else {
                continue;
            };
            if headers.contains_key(&out_name) {
                continue;
            }
            for value in upstream_headers.get_all(name) {
                if let Ok(out_value) = HeaderValue::from_bytes(value.as_bytes()) {
                    headers.append(out_name.clone(), out_value);
                }
            }
        }

        headers
    }

    /// Feed scraped navigation targets to the frontier and scraped form
    /// actions to the policy engine.
    async fn scrape(&self, html: &str) {
        if let Some(frontier) = &self.frontier {
            let paths = self.rewriter.scrape_paths(html);
            if !paths.is_empty() {
                debug!("[Proxy] Scraped {} candidate paths", paths.len());
                frontier.send_urls(paths).await;
            }
        }

        for action in self.rewriter.scrape_form_actions(html) {
            let target = if action.starts_with('/') {
                format!("https://localhost:{}{}", self.proxy_port, action)
            } else {
                action
            };
            self.engine.adjust_form_action(&target).await;
        }
    }

    async fn build_response(&self, upstream: reqwest::Response) -> Response {
        let status = StatusCode::from_u16(upstream.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let upstream_headers = upstream.headers().clone();
        let url = upstream.url().to_string();
        let headers = self.response_headers(&upstream_headers).await;

        let content_type = upstream_headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let body = if content_type.starts_with("text/html") {
            // HTML is rewritten on code points in its declared charset;
            // everything else streams through untouched
            let raw = match read_bounded(upstream, MAX_BODY_SIZE).await {
                Ok(raw) => raw,
                Err(source) => {
                    let err = ProxyError::BodyRead { url, source };
                    error!("[Proxy] {}", err);
                    return self.error_response(err).await;
                }
            };
            let encoding = charset_from_content_type(&content_type);
            let (text, _, _) = encoding.decode(&raw);
            self.scrape(&text).await;
            let rewritten = self.rewriter.substitute(&text);
            let (encoded, _, _) = encoding.encode(&rewritten);
            Body::from(encoded.into_owned())
        } else {
            Body::from_stream(upstream.bytes_stream())
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }

    /// The upstream was unreachable: no status to mirror, no Report-To,
    /// but the policy header is still injected.
    async fn error_response(&self, err: ProxyError) -> Response {
        let mut headers = HeaderMap::new();
        let policy = self.engine.header_value().await;
        if let Ok(value) = HeaderValue::from_str(&policy) {
            headers.insert(csp_header(), value);
        }
        (err.status_code(), headers, err.to_string()).into_response()
    }
}

async fn proxy_handler(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let request_uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();

    let body = match axum::body::to_bytes(body, MAX_BODY_SIZE).await {
        Ok(body) => body,
        Err(e) => {
            error!("[Proxy] Failed to buffer request body: {}", e);
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    debug!("[Proxy] {} {}", parts.method, request_uri);
    match state
        .forward(&parts.method, &request_uri, &parts.headers, body)
        .await
    {
        Ok(upstream) => state.build_response(upstream).await,
        Err(err) => {
            error!("[Proxy] {}", err);
            state.error_response(err).await
        }
    }
}

/// Router handling every method and path through the rewriting pipeline.
pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new().fallback(proxy_handler).with_state(state)
}

/// Read an upstream body chunk by chunk, never holding more than `limit`
/// bytes. An oversized page is truncated at the limit and the read ends
/// there; rewriting proceeds on what arrived.
async fn read_bounded(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>, reqwest::Error> {
    let expected = response
        .content_length()
        .map(|length| length.min(limit as u64) as usize)
        .unwrap_or(8 * 1024);
    let mut body = Vec::with_capacity(expected);

    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            body.extend_from_slice(&chunk[..limit - body.len()]);
            warn!(
                "[Proxy] Truncating oversized body from {} at {} bytes",
                response.url(),
                limit
            );
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn charset_from_content_type(content_type: &str) -> &'static Encoding {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|parameter| parameter.trim().strip_prefix("charset="))
        .map(|label| label.trim_matches('"'))
        .find_map(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8)
}
