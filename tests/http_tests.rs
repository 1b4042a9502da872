//! HTTP API tests against an in-process server.
//!
//! Run with: `cargo test --test http_tests`

#[path = "common.rs"]
mod common;

use common::TestServer;
use confkv::store::{ConfigValue, ListOptions};
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn body(response: reqwest::Response) -> Value {
    response.json().await.expect("JSON body")
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await.unwrap();
    let response = server.get("/health").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await, json!({"ok": true}));
}

// =============================================================================
// Single keys
// =============================================================================

#[tokio::test]
async fn test_get_missing_key_is_404() {
    let server = TestServer::start().await.unwrap();
    let response = server.get("/config/app.debug").await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body(response).await,
        json!({"error": "NotFound", "message": "Config key \"app.debug\" was not found"})
    );
}

#[tokio::test]
async fn test_put_then_get() {
    let server = TestServer::start().await.unwrap();

    let response = server
        .put_json("/config/feature.beta", &json!({"value": {"enabled": true, "ratio": 0.5}}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let written = body(response).await;
    assert_eq!(written["key"], "feature.beta");
    assert_eq!(written["value"], json!({"enabled": true, "ratio": 0.5}));
    assert!(written["id"].is_i64());
    assert!(written["updatedAt"].is_string());

    let read = body(server.get("/config/feature.beta").await.unwrap()).await;
    assert_eq!(read, written);

    let stored = server.service().get("feature.beta").await.unwrap().unwrap();
    assert_eq!(
        stored.value,
        ConfigValue::from(json!({"enabled": true, "ratio": 0.5}))
    );
}

#[tokio::test]
async fn test_put_null_value() {
    let server = TestServer::start().await.unwrap();
    let response = server
        .put_json("/config/app.empty", &json!({"value": null}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["value"], Value::Null);
}

#[tokio::test]
async fn test_put_invalid_key_reports_issues() {
    let server = TestServer::start().await.unwrap();
    let response = server
        .put_json("/config/INVALID-KEY", &json!({"value": 1}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error = body(response).await;
    assert_eq!(error["error"], "BadRequest");
    assert_eq!(error["issues"][0]["field"], "key");
    assert!(server.service().list(ListOptions::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_put_malformed_body_is_400() {
    let server = TestServer::start().await.unwrap();

    let response = server
        .client()
        .put(server.url("/config/app.debug"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["error"], "BadRequest");

    let response = server
        .put_json("/config/app.debug", &json!({"other": 1}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let server = TestServer::start().await.unwrap();
    server
        .service()
        .set("app.debug", ConfigValue::Bool(true))
        .await
        .unwrap();

    for _ in 0..2 {
        let response = server.delete("/config/app.debug").await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
    assert!(server.service().get("app.debug").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_invalid_key_is_400() {
    let server = TestServer::start().await.unwrap();
    let response = server.delete("/config/Bad.Key").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// List
// =============================================================================

async fn seeded() -> TestServer {
    let server = TestServer::start().await.unwrap();
    for key in ["k5", "k3", "feature.beta", "k1", "feature.alpha", "k2", "k4"] {
        server
            .service()
            .set(key, ConfigValue::from(key))
            .await
            .unwrap();
    }
    server
}

fn keys(list: &Value) -> Vec<&str> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["key"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_list_sorted_with_prefix_and_paging() {
    let server = seeded().await;

    let all = body(server.get("/config").await.unwrap()).await;
    assert_eq!(
        keys(&all),
        vec!["feature.alpha", "feature.beta", "k1", "k2", "k3", "k4", "k5"]
    );

    let features = body(server.get("/config?prefix=feature.").await.unwrap()).await;
    assert_eq!(keys(&features), vec!["feature.alpha", "feature.beta"]);

    let page = body(server.get("/config?prefix=k&limit=2&offset=2").await.unwrap()).await;
    assert_eq!(keys(&page), vec!["k3", "k4"]);

    let with_values = body(server.get("/config?prefix=k&includeValues=true").await.unwrap()).await;
    assert_eq!(with_values[0]["value"], "k1");
}

#[tokio::test]
async fn test_list_rejects_bad_query_values() {
    let server = seeded().await;

    let response = server.get("/config?limit=abc").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["issues"][0]["field"], "limit");

    let response = server.get("/config?limit=0").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server.get("/config?offset=-1").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server.get("/config?includeValues=maybe").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["issues"][0]["field"], "includeValues");

    let response = server.get("/config?prefix=Feature").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["issues"][0]["field"], "prefix");
}

#[tokio::test]
async fn test_list_reports_every_bad_field() {
    let server = seeded().await;
    let response = server
        .get("/config?limit=x&offset=y&includeValues=z")
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let fields: Vec<_> = body(response).await["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|issue| issue["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, vec!["limit", "offset", "includeValues"]);
}

// =============================================================================
// Import / export
// =============================================================================

#[tokio::test]
async fn test_import_merge_then_replace() {
    let server = seeded().await;

    let response = server
        .post_json("/config:import", &json!({"data": {"k1": "changed", "new.key": 1}}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(keys(&body(response).await), vec!["k1", "new.key"]);
    assert_eq!(server.service().list(ListOptions::default()).await.unwrap().len(), 8);

    let response = server
        .post_json(
            "/config:import",
            &json!({"data": {"only.key": true}, "mode": "replace"}),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let exported = body(server.get("/config:export").await.unwrap()).await;
    assert_eq!(exported, json!({"only.key": true}));
}

#[tokio::test]
async fn test_import_rejects_bad_payloads() {
    let server = seeded().await;

    for payload in [
        json!({"data": [1, 2]}),
        json!({"data": "text"}),
        json!({}),
        json!({"data": {"Bad Key": 1}}),
        json!({"data": {"ok.key": 1}, "mode": "upsert"}),
    ] {
        let response = server.post_json("/config:import", &payload).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "payload: {payload}");
    }

    let error = body(
        server
            .post_json("/config:import", &json!({"data": {"Bad Key": 1}}))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(error["issues"][0]["field"], "data.Bad Key");

    // Nothing was written by the rejected imports.
    assert_eq!(server.service().list(ListOptions::default()).await.unwrap().len(), 7);
}

#[tokio::test]
async fn test_export_with_prefix() {
    let server = seeded().await;

    let exported = body(server.get("/config:export?prefix=feature.").await.unwrap()).await;
    assert_eq!(
        exported,
        json!({"feature.alpha": "feature.alpha", "feature.beta": "feature.beta"})
    );

    let everything = body(server.get("/config:export?prefix=").await.unwrap()).await;
    assert_eq!(everything.as_object().unwrap().len(), 7);

    let response = server.get("/config:export?prefix=.bad").await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Remote backend against the server
// =============================================================================

#[tokio::test]
async fn test_remote_service_round_trip() {
    let server = TestServer::start().await.unwrap();
    let remote = server.remote_service();

    remote
        .set("app.name", ConfigValue::from("demo"))
        .await
        .unwrap();
    assert_eq!(
        server.service().get("app.name").await.unwrap().unwrap().value,
        ConfigValue::from("demo")
    );
    assert!(remote.get("app.missing").await.unwrap().is_none());
    remote.unset("app.missing").await.unwrap();
}
