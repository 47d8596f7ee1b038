mod common;

use common::{TestEnv, WAIT_TIMEOUT};
use service::ServerOptions;
use sse_client::ObserverBuilder;

#[tokio::test]
async fn test_json_emit_reaches_client_with_all_fields() {
    let env = TestEnv::new(ServerOptions::default()).await;
    let observer = env
        .client
        .subscribe(ObserverBuilder::new().first().build().unwrap());
    env.start_client().await;

    let response = reqwest::Client::new()
        .post(format!("{}/emit", env.base_url))
        .json(&serde_json::json!({
            "id": "42",
            "event": "update",
            "data": "payload",
            "retry": 1500
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let received = observer.wait_for_all_or_timeout(WAIT_TIMEOUT).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].id.as_deref(), Some("42"));
    assert_eq!(received[0].event_type(), Some("update"));
    assert_eq!(received[0].data, "payload");
    assert_eq!(received[0].retry_ms, Some(1500));

    env.teardown().await;
}

#[tokio::test]
async fn test_raw_emit_becomes_unnamed_data() {
    let env = TestEnv::new(ServerOptions::default()).await;
    let observer = env
        .client
        .subscribe(ObserverBuilder::new().first().build().unwrap());
    env.start_client().await;

    let response = reqwest::Client::new()
        .post(format!("{}/emit", env.base_url))
        .header("content-type", "text/plain")
        .body(r#"{"data":"not parsed"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let received = observer.wait_for_all_or_timeout(WAIT_TIMEOUT).await.unwrap();
    assert_eq!(received[0].event_type(), None);
    assert_eq!(received[0].data, r#"{"data":"not parsed"}"#);

    env.teardown().await;
}

#[tokio::test]
async fn test_empty_emit_is_rejected() {
    let env = TestEnv::new(ServerOptions::default()).await;

    let response = reqwest::Client::new()
        .post(format!("{}/emit", env.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(
        response.text().await.unwrap(),
        "failed: data should not be empty"
    );

    env.teardown().await;
}

#[tokio::test]
async fn test_servers_do_not_share_subscribers() {
    let first = TestEnv::new(ServerOptions::default()).await;
    let second = TestEnv::new(ServerOptions::default()).await;
    first.start_client().await;

    assert_eq!(first.server.controller().subscriber_count(), 1);
    assert_eq!(second.server.controller().subscriber_count(), 0);
    assert_eq!(second.server.emit(events::Event::new("nobody")).await, 0);

    first.teardown().await;
    second.teardown().await;
}

#[tokio::test]
async fn test_health_endpoint() {
    let env = TestEnv::new(ServerOptions::default()).await;

    let body = reqwest::get(format!("{}/health", env.base_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "healthy");

    env.teardown().await;
}
