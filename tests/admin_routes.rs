//! The proxy's own endpoints: status, health, info, reload.

use std::fs;
use std::path::PathBuf;

use axum::http::StatusCode;
use chrono::DateTime;
use serde_json::Value;

use volume_proxy::config::Provider;
use volume_proxy::health::{HealthPolicy, ProbeOutcome};

mod common;

use common::{client, spawn_proxy, spawn_proxy_with_path, test_config, volume};

fn temp_config(content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("volume-proxy-it-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("proxy.toml");
    fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn status_reports_mappings() {
    let a = common::closed_port().await;
    let b = common::closed_port().await;
    let proxy = spawn_proxy(test_config(vec![
        volume("etcd-1", &[(a, Provider::Aws), (b, Provider::Azure)]),
        volume("etcd-2", &[(b, Provider::Azure)]),
        volume("empty", &[]),
    ]))
    .await;

    let res = client().get(proxy.url("/status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let status: Value = res.json().await.unwrap();

    assert_eq!(status["proxy_server"], "active");
    assert_eq!(status["volumes"], 3);
    assert_eq!(status["providers"], serde_json::json!(["aws", "azure"]));

    let etcd1 = &status["mappings"]["etcd-1"];
    assert_eq!(etcd1["provider"], "aws");
    assert_eq!(etcd1["health"], "unknown");
    assert_eq!(etcd1["endpoints"][0]["address"], a.to_string());
    assert_eq!(etcd1["endpoints"][0]["provider"], "aws");
    assert_eq!(etcd1["endpoints"][0]["health"], "unknown");
    assert_eq!(etcd1["endpoints"][0]["active_sessions"], 0);
    assert!(etcd1["endpoints"][0]["last_probe"].is_null());
    assert!(etcd1["endpoints"][0]["last_healthy"].is_null());
    assert_eq!(etcd1["endpoints"][1]["provider"], "azure");

    let empty = &status["mappings"]["empty"];
    assert!(empty["provider"].is_null());
    assert_eq!(empty["health"], "empty");
}

#[tokio::test]
async fn health_reflects_routability() {
    let addr = common::closed_port().await;
    let proxy = spawn_proxy(test_config(vec![volume("etcd-1", &[(addr, Provider::Gcp)])])).await;
    let client = client();

    let res = client.get(proxy.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());

    let policy = HealthPolicy::new(1);
    for (volume, endpoint) in proxy.table.endpoints() {
        proxy.table.apply_probe(&volume, &endpoint, ProbeOutcome::Failure, &policy);
    }

    let res = client.get(proxy.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn unknown_paths_get_info() {
    let proxy = spawn_proxy(test_config(vec![])).await;

    for path in ["/", "/something/else"] {
        let res = client().get(proxy.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["message"], "Multi-Cloud Kubernetes Proxy Server");
        assert!(body["endpoints"].as_array().is_some_and(|e| !e.is_empty()));
    }
}

#[tokio::test]
async fn request_id_is_assigned_or_preserved() {
    let proxy = spawn_proxy(test_config(vec![])).await;
    let client = client();

    let res = client.get(proxy.url("/status")).send().await.unwrap();
    let id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok());

    let res = client
        .get(proxy.url("/status"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn reload_without_config_file_conflicts() {
    let proxy = spawn_proxy(test_config(vec![])).await;

    let res = client().post(proxy.url("/admin/reload")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn reload_swaps_volume_set() {
    let initial = r#"
[[volumes]]
name = "etcd-1"
endpoints = [{ address = "127.0.0.1:2379", provider = "aws" }]
"#;
    let path = temp_config(initial);
    let mut config = volume_proxy::config::load_config(&path).unwrap();
    config.health_check.enabled = false;
    let proxy = spawn_proxy_with_path(config, Some(path.clone())).await;
    let client = client();

    fs::write(
        &path,
        r#"
[[volumes]]
name = "etcd-2"
endpoints = [{ address = "127.0.0.1:2380", provider = "gcp" }]
"#,
    )
    .unwrap();

    let res = client.post(proxy.url("/admin/reload")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let summary: Value = res.json().await.unwrap();
    assert_eq!(summary["volumes"], 1);
    assert_eq!(summary["added"], serde_json::json!(["etcd-2"]));
    assert_eq!(summary["removed"], serde_json::json!(["etcd-1"]));

    let status: Value = client.get(proxy.url("/status")).send().await.unwrap().json().await.unwrap();
    assert!(status["mappings"].get("etcd-1").is_none());
    assert_eq!(status["mappings"]["etcd-2"]["provider"], "gcp");
}

#[tokio::test]
async fn invalid_reload_keeps_table() {
    let initial = r#"
[[volumes]]
name = "etcd-1"
endpoints = [{ address = "127.0.0.1:2379", provider = "aws" }]
"#;
    let path = temp_config(initial);
    let mut config = volume_proxy::config::load_config(&path).unwrap();
    config.health_check.enabled = false;
    let proxy = spawn_proxy_with_path(config, Some(path.clone())).await;

    fs::write(
        &path,
        "[[volumes]]\nname = \"etcd-1\"\nendpoints = [{ address = \"no-port\", provider = \"aws\" }]\n",
    )
    .unwrap();

    let res = client().post(proxy.url("/admin/reload")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "reload_failed");

    assert!(proxy.table.volume("etcd-1").is_some());
}
