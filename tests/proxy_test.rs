// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Rewriting Proxy Tests
 * Header injection, domain rewriting, scraping and passthrough against
 * a mock upstream
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::sync::Arc;

use panssari::engine::PolicyEngine;
use panssari::frontier;
use panssari::proxy::{self, ProxyState};
use panssari::server::ServerHandle;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct ProxyFixture {
    base: String,
    engine: Arc<PolicyEngine>,
    frontier: frontier::FrontierHandle,
    server: ServerHandle,
}

/// Boot a proxy on an ephemeral port targeting the mock server.
async fn start_proxy(upstream: &MockServer) -> ProxyFixture {
    let target_domain = upstream.uri().trim_start_matches("http://").to_string();

    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let proxy_port = listener.local_addr().unwrap().port();

    let engine = Arc::new(PolicyEngine::new(proxy_port, None, Some("http://localhost:9/uri")).unwrap());
    let (frontier, _task) = frontier::spawn(Vec::new());
    let state = ProxyState::new(
        proxy_port,
        &target_domain,
        engine.clone(),
        Some(frontier.clone()),
        None,
    )
    .unwrap()
    .with_upstream_scheme("http");

    let server = ServerHandle::spawn("Proxy", listener, proxy::router(Arc::new(state)));
    ProxyFixture {
        base: format!("http://127.0.0.1:{}", proxy_port),
        engine,
        frontier,
        server,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_html_response_gets_policy_header_and_rewrite() {
    let upstream = MockServer::start().await;
    let target = upstream.uri().trim_start_matches("http://").to_string();

    let html = format!(
        r#"<html><body>
            <a href="http://{target}/about">About</a>
            <img src="http://{target}/logo.png">
            <a href="https://other.com/x">External</a>
        </body></html>"#
    );
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html, "text/html; charset=utf-8")
                .insert_header("X-Custom", "kept")
                .insert_header("Content-Security-Policy", "default-src *"),
        )
        .mount(&upstream)
        .await;

    let fixture = start_proxy(&upstream).await;
    let response = client()
        .get(format!("{}/", fixture.base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let policy = response
        .headers()
        .get("content-security-policy-report-only")
        .expect("policy header missing")
        .to_str()
        .unwrap()
        .to_string();
    assert!(policy.contains("default-src 'none'"));
    assert!(policy.contains("report-uri http://localhost:9/uri"));

    // The target's own enforced policy must not leak through
    assert!(response.headers().get("content-security-policy").is_none());
    assert_eq!(response.headers().get("x-custom").unwrap(), "kept");

    let body = response.text().await.unwrap();
    assert!(!body.contains(&target));
    assert!(body.contains(r#"href="/about""#));
    assert!(body.contains(r#"src="/logo.png""#));
    assert!(body.contains("https://other.com/x"));

    fixture.server.stop().await;
}

#[tokio::test]
async fn test_scraped_links_reach_frontier() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<a href="/about">a</a><a href="/contact">b</a>"#, "text/html"),
        )
        .mount(&upstream)
        .await;

    let fixture = start_proxy(&upstream).await;
    client()
        .get(format!("{}/", fixture.base))
        .send()
        .await
        .unwrap();

    assert_eq!(fixture.frontier.get_url().await.as_deref(), Some("/about"));
    assert_eq!(fixture.frontier.get_url().await.as_deref(), Some("/contact"));
    assert_eq!(fixture.frontier.get_url().await, None);

    fixture.server.stop().await;
}

#[tokio::test]
async fn test_form_action_relaxed_from_markup() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<form method="post" action="/login"><input></form>"#, "text/html"),
        )
        .mount(&upstream)
        .await;

    let fixture = start_proxy(&upstream).await;
    client()
        .get(format!("{}/", fixture.base))
        .send()
        .await
        .unwrap();

    let policy = fixture.engine.snapshot().await;
    assert_eq!(
        policy.get("form-action").unwrap().to_string(),
        "form-action 'self'"
    );

    fixture.server.stop().await;
}

#[tokio::test]
async fn test_location_header_rewritten() {
    let upstream = MockServer::start().await;
    let target = upstream.uri().trim_start_matches("http://").to_string();
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("http://{}/new", target).as_str()),
        )
        .mount(&upstream)
        .await;

    let fixture = start_proxy(&upstream).await;
    let response = client()
        .get(format!("{}/old", fixture.base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 302);
    assert_eq!(response.headers().get("location").unwrap(), "/new");

    fixture.server.stop().await;
}

#[tokio::test]
async fn test_non_html_streams_verbatim() {
    let upstream = MockServer::start().await;
    let payload: Vec<u8> = (0u16..512).map(|b| (b % 251) as u8).collect();
    Mock::given(method("GET"))
        .and(path("/blob.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(payload.clone())
                .insert_header("Content-Type", "application/octet-stream"),
        )
        .mount(&upstream)
        .await;

    let fixture = start_proxy(&upstream).await;
    let response = client()
        .get(format!("{}/blob.bin", fixture.base))
        .send()
        .await
        .unwrap();

    assert!(response
        .headers()
        .get("content-security-policy-report-only")
        .is_some());
    assert_eq!(response.bytes().await.unwrap().to_vec(), payload);

    fixture.server.stop().await;
}

#[tokio::test]
async fn test_request_body_and_method_forwarded() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(wiremock::matchers::body_string("user=panssari"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&upstream)
        .await;

    let fixture = start_proxy(&upstream).await;
    let response = client()
        .post(format!("{}/submit", fixture.base))
        .body("user=panssari")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 204);
    fixture.server.stop().await;
}

#[tokio::test]
async fn test_unreachable_upstream_still_injects_policy() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let proxy_port = listener.local_addr().unwrap().port();

    let engine = Arc::new(PolicyEngine::new(proxy_port, None, None).unwrap());
    // Port 9 refuses connections; the upstream fetch must fail fast
    let state = ProxyState::new(proxy_port, "127.0.0.1:9", engine, None, None)
        .unwrap()
        .with_upstream_scheme("http");
    let server = ServerHandle::spawn("Proxy", listener, proxy::router(Arc::new(state)));

    let response = client()
        .get(format!("http://127.0.0.1:{}/", proxy_port))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    assert!(response
        .headers()
        .get("content-security-policy-report-only")
        .is_some());

    server.stop().await;
}
