//! Lifecycle tests exercising the bridge over a real loopback listener.

use flowdeck_bridge::{AgentBridge, BridgeConfig, BridgeError};

fn test_bridge() -> AgentBridge {
    AgentBridge::new(BridgeConfig::default())
}

#[tokio::test]
async fn start_binds_an_ephemeral_loopback_port() {
    let bridge = test_bridge();
    assert!(!bridge.is_running());

    let port = bridge.start(None).await.expect("start bridge");
    assert_ne!(port, 0);
    assert!(bridge.is_running());
    assert_eq!(bridge.port(), Some(port));

    bridge.stop().await.expect("stop bridge");
    assert!(!bridge.is_running());
    assert_eq!(bridge.port(), None);
}

#[tokio::test]
async fn double_start_is_rejected_and_keeps_the_first_port() {
    let bridge = test_bridge();
    let first_port = bridge.start(None).await.expect("start bridge");

    let error = bridge.start(None).await.expect_err("second start must fail");
    match error {
        BridgeError::AlreadyRunning { port } => assert_eq!(port, first_port),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(bridge.port(), Some(first_port));

    bridge.stop().await.expect("stop bridge");
}

#[tokio::test]
async fn stop_is_idempotent() {
    let bridge = test_bridge();
    bridge.start(None).await.expect("start bridge");

    bridge.stop().await.expect("first stop");
    bridge.stop().await.expect("second stop is a no-op");
    assert!(!bridge.is_running());
}

#[tokio::test]
async fn stopping_a_never_started_bridge_is_a_no_op() {
    let bridge = test_bridge();
    bridge.stop().await.expect("stop without start");
}

#[tokio::test]
async fn bridge_can_restart_after_stop() {
    let bridge = test_bridge();
    let first_port = bridge.start(None).await.expect("first start");
    bridge.stop().await.expect("stop bridge");

    let second_port = bridge.start(None).await.expect("second start");
    assert_ne!(second_port, 0);
    // Ports are OS-assigned; equality with the first run is not guaranteed
    // either way, only that the bridge is reachable again.
    let _ = first_port;
    bridge.stop().await.expect("stop bridge");
}

#[tokio::test]
async fn non_loopback_bind_address_is_rejected() {
    let bridge = AgentBridge::new(BridgeConfig {
        bind_address: Some("0.0.0.0:0".to_string()),
        ..BridgeConfig::default()
    });

    let error = bridge.start(None).await.expect_err("non-loopback bind must fail");
    assert!(matches!(error, BridgeError::NonLoopbackBind));
    assert!(!bridge.is_running());
}

#[tokio::test]
async fn unknown_paths_return_a_json_404() {
    let bridge = test_bridge();
    let port = bridge.start(None).await.expect("start bridge");

    let response = reqwest::get(format!("http://127.0.0.1:{port}/not-the-bridge"))
        .await
        .expect("request unknown path");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.expect("json error body");
    assert!(body["error"].as_str().expect("error field").contains("/mcp"));

    bridge.stop().await.expect("stop bridge");
}

#[tokio::test]
async fn unsupported_methods_on_the_bridge_path_are_rejected() {
    let bridge = test_bridge();
    let port = bridge.start(None).await.expect("start bridge");

    let client = reqwest::Client::new();
    let response = client
        .put(format!("http://127.0.0.1:{port}/mcp"))
        .body("{}")
        .send()
        .await
        .expect("request with unsupported method");
    assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);

    bridge.stop().await.expect("stop bridge");
}

#[tokio::test]
async fn stopped_bridge_refuses_connections() {
    let bridge = test_bridge();
    let port = bridge.start(None).await.expect("start bridge");
    bridge.stop().await.expect("stop bridge");

    let result = reqwest::get(format!("http://127.0.0.1:{port}/mcp")).await;
    assert!(result.is_err(), "listener must be closed after stop");
}
