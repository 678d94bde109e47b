//! End-to-end tests: client → relay → mock backend.

use std::collections::HashSet;
use std::time::Duration;

use axum::http::Method;
use bytes::Bytes;
use cors_relay::config::RelayConfig;
use cors_relay::relay::codec::encode_base64;
use cors_relay::relay::forwarder::{request_body, HttpUpstream, Upstream, UpstreamRequest};
use cors_relay::relay::headers::{DEFAULT_USER_AGENT, FORWARDED_REQUEST_HEADERS};
use cors_relay::relay::link::relay_link;
use cors_relay::relay::{HeaderTable, InboundRequest};
use url::Url;

mod common;
use common::Reply;

fn link(relay: std::net::SocketAddr, target: &str, headers: &[(&str, &str)]) -> Url {
    let relay = Url::parse(&format!("http://{}/", relay)).unwrap();
    let headers: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    relay_link(&relay, target, &headers)
}

#[tokio::test]
async fn test_json_fetch() {
    let (backend, _rx) = common::start_backend(|_| {
        Reply::new(200, r#"{"ok":true}"#).header("Content-Type", "application/json")
    })
    .await;
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;
    let target = format!("http://{}/a.json", backend);

    let res = common::client()
        .get(link(relay, &target, &[]))
        .send()
        .await
        .expect("relay unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.headers()["x-final-url"], target.as_str());
    assert_eq!(res.text().await.unwrap(), r#"{"ok":true}"#);

    shutdown.trigger();
}

#[tokio::test]
async fn test_only_whitelisted_and_explicit_headers_reach_upstream() {
    let (backend, mut rx) = common::start_backend(|_| Reply::new(200, "ok")).await;
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;
    let target = format!("http://{}/", backend);

    let res = common::client()
        .get(link(relay, &target, &[("X-Api-Key", "k-123")]))
        .header("Cookie", "session=secret")
        .header("Authorization", "Bearer secret")
        .header("X-Secret", "nope")
        .header("Accept-Language", "de-DE")
        .header("Range", "bytes=0-10")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let seen = rx.recv().await.unwrap();
    let mut allowed: HashSet<&str> = FORWARDED_REQUEST_HEADERS.iter().copied().collect();
    allowed.insert("x-api-key");
    allowed.insert("host");
    for name in seen.headers.keys() {
        assert!(allowed.contains(name.as_str()), "{name} leaked upstream");
    }

    assert_eq!(seen.headers["x-api-key"], "k-123");
    assert_eq!(seen.headers["accept-language"], "de-DE");
    assert_eq!(seen.headers["range"], "bytes=0-10");
    assert_eq!(seen.headers["user-agent"], DEFAULT_USER_AGENT);

    shutdown.trigger();
}

#[tokio::test]
async fn test_configured_user_agent() {
    let (backend, mut rx) = common::start_backend(|_| Reply::new(200, "")).await;
    let mut config = RelayConfig::default();
    config.upstream.user_agent = "relay-integration/1.0".into();
    let (relay, shutdown) = common::start_relay(config).await;

    common::client()
        .get(link(relay, &format!("http://{}/", backend), &[]))
        .send()
        .await
        .unwrap();

    assert_eq!(rx.recv().await.unwrap().headers["user-agent"], "relay-integration/1.0");
    shutdown.trigger();
}

#[tokio::test]
async fn test_redirect_followed_and_reported() {
    let (backend, _rx) = common::start_backend(|req| {
        if req.path == "/start" {
            Reply::new(302, "").header("Location", "/final")
        } else {
            Reply::new(200, "landed").header("Content-Type", "text/plain")
        }
    })
    .await;
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;

    let res = common::client()
        .get(link(relay, &format!("http://{}/start", backend), &[]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["x-final-url"],
        format!("http://{}/final", backend).as_str()
    );
    assert_eq!(res.text().await.unwrap(), "landed");

    shutdown.trigger();
}

#[tokio::test]
async fn test_missing_content_type_defaults_and_extra_headers_dropped() {
    let (backend, _rx) = common::start_backend(|_| {
        Reply::new(200, vec![0u8, 159, 146, 150])
            .header("Set-Cookie", "tracker=1")
            .header("ETag", "\"v1\"")
    })
    .await;
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;

    let res = common::client()
        .get(link(relay, &format!("http://{}/blob", backend), &[]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.headers()["content-type"], "application/octet-stream");
    assert_eq!(res.headers()["etag"], "\"v1\"");
    assert!(res.headers().get("set-cookie").is_none());
    assert_eq!(res.bytes().await.unwrap().as_ref(), &[0u8, 159, 146, 150]);

    shutdown.trigger();
}

#[tokio::test]
async fn test_head_relays_headers_only() {
    let (backend, mut rx) = common::start_backend(|_| {
        Reply::new(200, vec![b'x'; 1000]).header("Content-Type", "video/mp4")
    })
    .await;
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;

    let res = common::client()
        .head(link(relay, &format!("http://{}/v.mp4", backend), &[]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "video/mp4");
    assert_eq!(res.headers()["content-length"], "1000");
    assert!(res.bytes().await.unwrap().is_empty());
    assert_eq!(rx.recv().await.unwrap().method, "HEAD");

    shutdown.trigger();
}

#[tokio::test]
async fn test_options_does_not_touch_upstream() {
    let (backend, mut rx) = common::start_backend(|_| Reply::new(200, "")).await;
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;

    let res = common::client()
        .request(Method::OPTIONS, link(relay, &format!("http://{}/", backend), &[]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 204);
    assert_eq!(res.headers()["access-control-allow-headers"], "*");
    assert!(rx.try_recv().is_err());

    shutdown.trigger();
}

#[tokio::test]
async fn test_parameter_errors() {
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;
    let client = common::client();
    let base = format!("http://{}/", relay);

    let res = client.get(&base).send().await.unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(res.text().await.unwrap(), r#"{"error":"Missing url parameter"}"#);

    let res = client.get(link(relay, "not a url", &[])).send().await.unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(res.text().await.unwrap(), r#"{"error":"Invalid url parameter"}"#);

    let res = client.get(link(relay, "ftp://host/file", &[])).send().await.unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(
        res.text().await.unwrap(),
        r#"{"error":"Only http/https protocols are supported"}"#
    );

    let bad_h = format!("{}?url={}&h=%7Bnot-base64", base, encode_base64("https://example.com/"));
    let res = client.get(bad_h).send().await.unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(res.text().await.unwrap(), r#"{"error":"Invalid h parameter"}"#);

    shutdown.trigger();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;

    let res = common::client()
        .delete(link(relay, "https://example.com/", &[]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 405);
    assert_eq!(res.headers()["allow"], "GET,HEAD,OPTIONS");
    assert!(res.bytes().await.unwrap().is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_connection_refused_is_bad_gateway() {
    let dead = common::closed_port().await;
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;

    let res = common::client()
        .get(link(relay, &format!("http://{}/", dead), &[]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    let body: serde_json::Value = res.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Upstream request failed: "), "{message}");

    shutdown.trigger();
}

#[tokio::test]
async fn test_stalled_upstream_is_bad_gateway_with_cors() {
    let (backend, _rx) = common::start_backend(|_| {
        Reply::new(200, "too late").delayed(Duration::from_secs(4))
    })
    .await;
    let mut config = RelayConfig::default();
    config.timeouts.upstream_secs = 1;
    config.timeouts.request_secs = 3;
    let (relay, shutdown) = common::start_relay(config).await;

    let res = common::client()
        .get(link(relay, &format!("http://{}/slow", backend), &[]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    let body: serde_json::Value = res.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Upstream request failed: "), "{message}");

    shutdown.trigger();
}

#[tokio::test]
async fn test_head_keeps_length_of_encoded_resource() {
    let (backend, mut rx) = common::start_backend(|_| {
        Reply::new(200, "")
            .header("Content-Type", "text/html")
            .header("Content-Encoding", "gzip")
            .header("Content-Length", "1000")
    })
    .await;
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;

    let res = common::client()
        .head(link(relay, &format!("http://{}/page", backend), &[]))
        .header("Accept-Encoding", "gzip, deflate, br")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-length"], "1000");
    assert_eq!(rx.recv().await.unwrap().method, "HEAD");

    shutdown.trigger();
}

/// `gzip_compress(b"gzip encoded payload")`, mtime 0.
const GZIP_PAYLOAD: &[u8] = &[
    31, 139, 8, 0, 0, 0, 0, 0, 2, 3, 75, 175, 202, 44, 80, 72, 205, 75, 206, 79, 73, 77, 81, 40,
    72, 172, 204, 201, 79, 76, 1, 0, 193, 91, 119, 135, 20, 0, 0, 0,
];

/// Single zstd frame of `b"zstd encoded payload"`, no checksum.
const ZSTD_PAYLOAD: &[u8] = &[
    40, 181, 47, 253, 0, 88, 161, 0, 0, 122, 115, 116, 100, 32, 101, 110, 99, 111, 100, 101, 100,
    32, 112, 97, 121, 108, 111, 97, 100,
];

#[tokio::test]
async fn test_encoded_bodies_reach_caller_decoded() {
    let (backend, mut rx) = common::start_backend(|req| match req.path.as_str() {
        "/gzip" => Reply::new(200, GZIP_PAYLOAD.to_vec())
            .header("Content-Type", "text/plain")
            .header("Content-Encoding", "gzip"),
        _ => Reply::new(200, ZSTD_PAYLOAD.to_vec())
            .header("Content-Type", "text/plain")
            .header("Content-Encoding", "zstd"),
    })
    .await;
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;
    let client = common::client();

    for (path, expected) in [("gzip", "gzip encoded payload"), ("zstd", "zstd encoded payload")] {
        let res = client
            .get(link(relay, &format!("http://{}/{}", backend, path), &[]))
            .header("Accept-Encoding", "gzip, deflate, br, zstd, dcb")
            .send()
            .await
            .unwrap();

        assert_eq!(res.status(), 200);
        assert!(res.headers().get("content-encoding").is_none());
        assert_eq!(res.headers()["content-length"], expected.len().to_string().as_str());
        assert_eq!(res.text().await.unwrap(), expected);

        let seen = rx.recv().await.unwrap();
        assert_eq!(seen.headers["accept-encoding"], "gzip, deflate, br, zstd");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_error_status_passed_through() {
    let (backend, _rx) = common::start_backend(|_| {
        Reply::new(404, "no such thing").header("Content-Type", "text/plain")
    })
    .await;
    let (relay, shutdown) = common::start_relay(RelayConfig::default()).await;

    let res = common::client()
        .get(link(relay, &format!("http://{}/missing", backend), &[]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "no such thing");

    shutdown.trigger();
}

#[tokio::test]
async fn test_streaming_mode_relays_same_body() {
    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();
    let (backend, _rx) = common::start_backend(move |_| {
        Reply::new(200, payload.clone()).header("Content-Type", "application/octet-stream")
    })
    .await;
    let mut config = RelayConfig::default();
    config.response.streaming = true;
    let (relay, shutdown) = common::start_relay(config).await;

    let res = common::client()
        .get(link(relay, &format!("http://{}/big", backend), &[]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-final-url"));
    assert_eq!(res.bytes().await.unwrap().as_ref(), expected.as_slice());

    shutdown.trigger();
}

#[tokio::test]
async fn test_forwarder_sends_decoded_body_for_post() {
    let (backend, mut rx) = common::start_backend(|req| Reply::new(200, req.body.clone())).await;
    let config = RelayConfig::default();
    let upstream = HttpUpstream::new(&config.upstream, &config.timeouts).unwrap();

    let raw = b"\x00binary\xffpayload".to_vec();
    let inbound = InboundRequest::new("POST").with_body(encode_base64(&raw), true);
    let body = request_body(&Method::POST, &inbound);
    assert_eq!(body.as_deref(), Some(raw.as_slice()));

    let response = upstream
        .fetch(UpstreamRequest {
            method: Method::POST,
            url: Url::parse(&format!("http://{}/echo", backend)).unwrap(),
            headers: HeaderTable::new(),
            body,
        })
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, Some(Bytes::from(raw.clone())));
    let seen = rx.recv().await.unwrap();
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.body, raw);
}
