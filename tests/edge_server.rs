//! End-to-end tests against a running edge server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

mod common;

#[tokio::test]
async fn test_middletier_body_is_served() {
    let backend = common::start_mock_backend("hello from the middle tier").await;
    let edge = common::start_edge(common::edge_config(&[backend])).await;

    let res = reqwest::get(edge.url("/service/edge/v1/middletier")).await.unwrap();
    assert_eq!(res.status(), 200);
    let request_id = res.headers().get("x-request-id").unwrap().to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&request_id).is_ok());
    assert_eq!(res.text().await.unwrap(), "hello from the middle tier");

    edge.shutdown.trigger();
}

#[tokio::test]
async fn test_failing_middletier_serves_fallback_and_counts() {
    let failing = Arc::new(AtomicBool::new(true));
    let flag = failing.clone();
    let backend = common::start_programmable_backend(move || {
        let fail = flag.load(Ordering::SeqCst);
        async move {
            if fail {
                (500, "boom".to_string())
            } else {
                (200, "recovered".to_string())
            }
        }
    })
    .await;
    let edge = common::start_edge(common::edge_config(&[backend])).await;

    let body = reqwest::get(edge.url("/service/edge/v1/middletier"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "Fraggle Fallback!");

    failing.store(false, Ordering::SeqCst);
    let body = reqwest::get(edge.url("/service/edge/v1/middletier"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "recovered");

    let commands: Value = reqwest::get(edge.url("/admin/commands"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let middletier = &commands[0];
    assert_eq!(middletier["command_key"], "MiddleTierCommand");
    assert_eq!(middletier["group_key"], "MiddleTierGroup");
    assert_eq!(middletier["pool_key"], "MiddleTierPool");
    assert_eq!(middletier["failure_count"], 1);
    assert_eq!(middletier["success_count"], 1);
    assert_eq!(middletier["fallback_success_count"], 1);
    assert_eq!(middletier["current_state"], "CLOSED");

    edge.shutdown.trigger();
}

#[tokio::test]
async fn test_no_endpoints_serves_fallback() {
    let edge = common::start_edge(common::edge_config(&[])).await;
    let body = reqwest::get(edge.url("/service/edge/v1/middletier"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "Fraggle Fallback!");
    edge.shutdown.trigger();
}

#[tokio::test]
async fn test_admin_endpoints_and_auth() {
    let backend = common::start_mock_backend("ok").await;
    let mut config = common::edge_config(&[backend]);
    config.admin.api_key = Some("edge-admin".to_string());
    let edge = common::start_edge(config).await;

    let client = reqwest::Client::new();
    let res = client.get(edge.url("/admin/endpoints")).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let endpoints: Value = client
        .get(edge.url("/admin/endpoints"))
        .bearer_auth("edge-admin")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(endpoints[0]["client"], "middletier-client");
    assert_eq!(endpoints[0]["endpoints"][0]["port"], backend.port());

    let health = client.get(edge.url("/healthcheck")).send().await.unwrap();
    assert_eq!(health.status(), 200);

    edge.shutdown.trigger();
}

#[tokio::test]
async fn test_reload_changes_timeout_for_next_call() {
    let backend = common::start_programmable_backend(|| async {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        (200, "slow".to_string())
    })
    .await;
    let edge = common::start_edge(common::edge_config(&[backend])).await;

    let body = reqwest::get(edge.url("/service/edge/v1/middletier"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "slow");

    let mut config = common::edge_config(&[backend]);
    config.commands.default.timeout_ms = 100;
    edge.app.apply_reload(config);

    let body = reqwest::get(edge.url("/service/edge/v1/middletier"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "Fraggle Fallback!");

    edge.shutdown.trigger();
}
