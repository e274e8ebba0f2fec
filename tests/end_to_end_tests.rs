//! Facade-level end-to-end tests: an `RpcBus` talking to a simulated
//! remote service over the in-memory broker.

use std::time::{Duration, Instant};

use serde_json::json;

use rpcbus::{
    interpret, request_target, AppConfig, BrokerType, BusError, RequestMethod, Response,
    ResponseOutcome, RpcBus, CONTENT_TYPE_JSON, CONTENT_TYPE_NONE,
};

fn in_memory_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.broker.r#type = BrokerType::InMemory;
    config.dispatcher.publisher = "api-manager".to_string();
    config.dispatcher.sweep_interval_ms = 10;
    config
}

/// Simulated call-manager: POST /v1/calls creates, GET returns 404,
/// DELETE returns 500.
async fn spawn_call_manager(bus: &RpcBus, target: &str) {
    let broker = bus.broker().clone();
    let mut request_rx = broker.subscribe_requests(target).await.unwrap();
    tokio::spawn(async move {
        while let Some(request) = request_rx.recv().await {
            let response = match request.method {
                RequestMethod::Post => Response::ok(Some(json!({
                    "id": "call-1",
                    "source": request.data.as_ref().and_then(|d| d.get("source")).cloned(),
                }))),
                RequestMethod::Get => Response::error(404),
                _ => Response::error(500),
            };
            let _ = broker
                .publish_reply(&request.reply_to, &request.correlation_id, &response)
                .await;
        }
    });
}

#[tokio::test]
async fn test_synchronous_round_trip() {
    let bus = RpcBus::start(in_memory_config()).await.unwrap();
    let target = request_target("bin-manager", "call-manager");
    spawn_call_manager(&bus, &target).await;

    let response = bus
        .send_request(
            &target,
            "/v1/calls",
            RequestMethod::Post,
            0,
            CONTENT_TYPE_JSON,
            Some(json!({"source": "+15551112222"})),
        )
        .await
        .unwrap();

    match interpret(response) {
        ResponseOutcome::Success { data, .. } => {
            let data = data.unwrap();
            assert_eq!(data["id"], "call-1");
            assert_eq!(data["source"], "+15551112222");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    bus.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_remote_error_and_classification() {
    let bus = RpcBus::start(in_memory_config()).await.unwrap();
    let target = request_target("bin-manager", "call-manager");
    spawn_call_manager(&bus, &target).await;

    let response = bus
        .send_request(
            &target,
            "/v1/calls/call-1",
            RequestMethod::Get,
            0,
            CONTENT_TYPE_NONE,
            None,
        )
        .await
        .unwrap();

    let err = interpret(response).into_result().unwrap_err();
    assert!(matches!(err, BusError::Remote { status_code: 404 }));

    bus.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_delayed_hangup_returns_immediately() {
    let bus = RpcBus::start(in_memory_config()).await.unwrap();
    let target = request_target("bin-manager", "call-manager");

    let start = Instant::now();
    let response = bus
        .send_request(
            &target,
            "/v1/calls/call-1/hangup",
            RequestMethod::Post,
            5000,
            CONTENT_TYPE_NONE,
            None,
        )
        .await
        .unwrap();

    assert!(response.is_none());
    assert!(start.elapsed() < Duration::from_millis(100));

    bus.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_timeout_surfaces_as_transport_error() {
    let bus = RpcBus::start(in_memory_config()).await.unwrap();
    let target = request_target("bin-manager", "queue-manager");
    // Nobody serves queue-manager.

    let err = bus
        .dispatcher()
        .dispatch(
            &target,
            "/v1/queues",
            RequestMethod::Get,
            100,
            0,
            CONTENT_TYPE_NONE,
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BusError::Timeout { .. }));
    assert!(err.is_transport());
    assert!(err.is_retryable());

    bus.shutdown().await.unwrap();
}
