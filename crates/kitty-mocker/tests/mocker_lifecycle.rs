//! Integration tests for the root dispatcher and mocker endpoints.
//!
//! Every test starts its own in-process dispatcher on a private root port
//! and port range, then drives it over HTTP with reqwest.

use kitty_mocker::{PortRange, RootDispatcher, ServerConfig};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::time::sleep;

const HOST: &str = "127.0.0.1";
const ROUTE: &str = "=^.^=/route";
const HISTORY: &str = "=^.^=/history";

/// Root port plus a block of mocker ports, unique per test
fn test_ports(block: u16) -> (u16, u16, u16) {
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(48000);
    let root = PORT_COUNTER.fetch_add(block + 1, Ordering::SeqCst);
    (root, root + 1, root + block)
}

async fn start_dispatcher(block: u16) -> RootDispatcher {
    let (root, start, end) = test_ports(block);
    let config = ServerConfig {
        host: HOST.to_string(),
        server_port: root,
        mockers_ports_range: PortRange::new(start, end).unwrap(),
        metrics_port: None,
    };
    RootDispatcher::start(&config)
        .await
        .expect("Failed to start dispatcher")
}

fn client() -> Client {
    Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn url(port: u16, path: &str) -> String {
    format!("http://{HOST}:{port}/{path}")
}

/// Create a mocker through the dispatcher and return its port
async fn create_mocker(client: &Client, dispatcher: &RootDispatcher) -> u16 {
    create_mocker_at(client, dispatcher.port()).await
}

async fn create_mocker_at(client: &Client, root: u16) -> u16 {
    let response = client
        .post(url(root, "create"))
        .send()
        .await
        .expect("Failed to create mocker");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "mocker successfully created");
    body["data"]["port"]
        .as_str()
        .expect("Missing port in response")
        .parse()
        .unwrap()
}

async fn add_route(client: &Client, port: u16, definition: Value) -> (StatusCode, Value) {
    let response = client
        .post(url(port, ROUTE))
        .json(&definition)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

async fn history(client: &Client, port: u16, path: &str, method: &str) -> Value {
    let response = client
        .get(url(port, HISTORY))
        .query(&[("path", path), ("method", method)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    body["data"].clone()
}

async fn shutdown(dispatcher: RootDispatcher) {
    let manager = std::sync::Arc::clone(dispatcher.manager());
    dispatcher.stop().await.unwrap();
    manager.stop_all().await;
}

#[tokio::test]
async fn test_create_probe_and_stop() {
    let dispatcher = start_dispatcher(10).await;
    let client = client();

    let port = create_mocker(&client, &dispatcher).await;
    assert_eq!(port, dispatcher.port() + 1);

    let response = client.get(url(port, "")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.text().await.unwrap().is_empty());

    let response = client.delete(url(port, "")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Teardown runs after the reply
    for _ in 0..50 {
        if dispatcher.manager().get(port).is_err() {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    assert!(dispatcher.manager().get(port).is_err());
    assert!(client.get(url(port, "")).send().await.is_err());

    shutdown(dispatcher).await;
}

#[tokio::test]
async fn test_user_route_lifecycle() {
    let dispatcher = start_dispatcher(5).await;
    let client = client();
    let port = create_mocker(&client, &dispatcher).await;

    let (status, body) = add_route(
        &client,
        port,
        json!({
            "filters": {"path": "/oi", "method": "POST"},
            "response": {"code": 200, "body": "sddfsdf"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "success", "message": "route successfully created"})
    );

    let response = client.post(url(port, "oi")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.text().await.unwrap(), r#""sddfsdf""#);

    let response = client
        .delete(url(port, ROUTE))
        .query(&[("path", "/oi"), ("method", "POST")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client.post(url(port, "oi")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "fail", "message": "Not found"}));

    // Deleting it again
    let response = client
        .delete(url(port, ROUTE))
        .query(&[("path", "/oi"), ("method", "POST")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    shutdown(dispatcher).await;
}

#[tokio::test]
async fn test_route_listing_order() {
    let dispatcher = start_dispatcher(5).await;
    let client = client();
    let port = create_mocker(&client, &dispatcher).await;

    for (path, method) in [("/users", "GET"), ("/users", "post"), ("/orders", "DELETE")] {
        let (_, body) = add_route(
            &client,
            port,
            json!({
                "filters": {"path": path, "method": method},
                "response": {"code": 200, "body": []}
            }),
        )
        .await;
        assert_eq!(body["status"], "success");
    }

    let body: Value = client
        .get(url(port, ROUTE))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "success");

    let listing: Value = serde_json::from_str(body["data"].as_str().unwrap()).unwrap();
    assert_eq!(
        listing,
        json!([
            {"path": "/", "method": "GET"},
            {"path": "/", "method": "DELETE"},
            {"path": "/users", "method": "GET"},
            {"path": "/users", "method": "POST"},
            {"path": "/orders", "method": "DELETE"}
        ])
    );

    shutdown(dispatcher).await;
}

#[tokio::test]
async fn test_route_validation_failures() {
    let dispatcher = start_dispatcher(5).await;
    let client = client();
    let port = create_mocker(&client, &dispatcher).await;

    let valid = json!({
        "filters": {"path": "/oi", "method": "POST"},
        "response": {"code": 200, "body": "sddfsdf"}
    });
    add_route(&client, port, valid.clone()).await;

    let cases = [
        (valid, "route already created in this mocker"),
        (
            json!({"filters": {"path": "oi", "method": "POST"}, "response": {"code": 200}}),
            "request with invalid route path",
        ),
        (
            json!({"filters": {"path": "/=^.^=/mine", "method": "GET"}, "response": {"code": 200}}),
            "request with invalid route path",
        ),
        (
            json!({"filters": {"path": "/oi", "method": "POsST"}, "response": {"code": 200}}),
            "request with invalid route method",
        ),
        (
            json!({"filters": {"path": "/oi", "method": "GET"}, "response": {"code": 700}}),
            "request with invalid route response code",
        ),
    ];
    for (definition, message) in cases {
        let (status, body) = add_route(&client, port, definition).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "fail", "message": message}));
    }

    let response = client
        .post(url(port, ROUTE))
        .header("content-type", "application/json")
        .body(r#"{"sdfsdf":100"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "status": "error",
            "message": "request missing body. Unexpected end of JSON input"
        })
    );

    shutdown(dispatcher).await;
}

#[tokio::test]
async fn test_informational_codes_are_rejected() {
    let dispatcher = start_dispatcher(5).await;
    let client = client();
    let port = create_mocker(&client, &dispatcher).await;

    for code in [100, 101, 102, 103] {
        let (status, body) = add_route(
            &client,
            port,
            json!({
                "filters": {"path": "/c100", "method": "GET"},
                "response": {"code": code, "body": "x"}
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "fail", "message": "request with invalid route response code"})
        );
    }

    let response = client.get(url(port, "c100")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    shutdown(dispatcher).await;
}

#[tokio::test]
async fn test_history_roundtrip() {
    let dispatcher = start_dispatcher(5).await;
    let client = client();
    let port = create_mocker(&client, &dispatcher).await;

    add_route(
        &client,
        port,
        json!({
            "filters": {"path": "/oi", "method": "POST"},
            "response": {"code": 201, "body": {"ok": true}}
        }),
    )
    .await;

    assert_eq!(history(&client, port, "/oi", "POST").await, json!([]));

    for body in ["first", "second"] {
        let response = client
            .post(format!("{}?attempt={body}", url(port, "oi")))
            .header("content-type", "text/plain")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let records = history(&client, port, "/oi", "POST").await;
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["body"], "first");
    assert_eq!(records[1]["body"], "second");
    assert_eq!(records[0]["url"], "/oi?attempt=first");
    assert_eq!(records[0]["method"], "POST");
    assert_eq!(records[0]["ip"], "127.0.0.1");
    assert_eq!(records[0]["header"]["contentType"], "text/plain");
    assert!(chrono::DateTime::parse_from_rfc3339(records[0]["date"].as_str().unwrap()).is_ok());

    let response = client
        .delete(url(port, HISTORY))
        .query(&[("path", "/oi"), ("method", "POST")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(history(&client, port, "/oi", "POST").await, json!([]));

    // Unknown routes have an empty history
    assert_eq!(history(&client, port, "/nope", "GET").await, json!([]));

    shutdown(dispatcher).await;
}

#[tokio::test]
async fn test_history_can_be_disabled() {
    let dispatcher = start_dispatcher(5).await;
    let client = client();
    let port = create_mocker(&client, &dispatcher).await;

    add_route(
        &client,
        port,
        json!({
            "filters": {"path": "/quiet", "method": "GET"},
            "response": {"code": 204},
            "history": false
        }),
    )
    .await;

    let response = client.get(url(port, "quiet")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.text().await.unwrap().is_empty());
    assert_eq!(history(&client, port, "/quiet", "GET").await, json!([]));

    // Built-in routes record like any other route
    client.get(url(port, "")).send().await.unwrap();
    let records = history(&client, port, "/", "GET").await;
    assert_eq!(records.as_array().unwrap().len(), 1);

    shutdown(dispatcher).await;
}

#[tokio::test]
async fn test_method_not_allowed() {
    let dispatcher = start_dispatcher(5).await;
    let client = client();

    for method in [
        reqwest::Method::GET,
        reqwest::Method::PUT,
        reqwest::Method::DELETE,
        reqwest::Method::PATCH,
    ] {
        let response = client
            .request(method, url(dispatcher.port(), "create"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"status": "fail", "message": "Method not allowed"}));
    }

    let response = client
        .get(url(dispatcher.port(), "anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let port = create_mocker(&client, &dispatcher).await;
    let response = client.put(url(port, "")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let response = client.patch(url(port, HISTORY)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    shutdown(dispatcher).await;
}

#[tokio::test]
async fn test_exhausted_range() {
    let dispatcher = start_dispatcher(1).await;
    let client = client();
    let port = create_mocker(&client, &dispatcher).await;

    let response = client
        .post(url(dispatcher.port(), "create"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "status": "error",
            "message": format!("no free port available in range {port}-{port}")
        })
    );

    // The dispatcher keeps serving after a failed create
    assert_eq!(dispatcher.manager().ports(), vec![port]);

    shutdown(dispatcher).await;
}

#[tokio::test]
async fn test_concurrent_creates() {
    let dispatcher = start_dispatcher(10).await;
    let client = client();

    let root = dispatcher.port();
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { create_mocker_at(&client, root).await })
        })
        .collect();

    let mut ports = Vec::new();
    for handle in handles {
        ports.push(handle.await.unwrap());
    }
    ports.sort_unstable();
    ports.dedup();
    assert_eq!(ports.len(), 6);
    assert_eq!(dispatcher.manager().ports(), ports);

    for port in &ports {
        let response = client.get(url(*port, "")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    shutdown(dispatcher).await;
}

#[tokio::test]
async fn test_stopping_dispatcher_keeps_mockers() {
    let dispatcher = start_dispatcher(5).await;
    let client = client();
    let port = create_mocker(&client, &dispatcher).await;
    let root = dispatcher.port();

    let manager = std::sync::Arc::clone(dispatcher.manager());
    dispatcher.stop().await.unwrap();

    assert!(client.post(url(root, "create")).send().await.is_err());
    let response = client.get(url(port, "")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(manager.stop_all().await, vec![port]);
}
