use super::*;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone)]
struct GateState {
    status: StatusCode,
    body: Value,
    delay: Duration,
    received: Arc<Mutex<Vec<ModerationRequest>>>,
}

async fn handle_predict(
    State(state): State<GateState>,
    Json(request): Json<ModerationRequest>,
) -> (StatusCode, Json<Value>) {
    state.received.lock().await.push(request);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, Json(state.body.clone()))
}

async fn spawn_gate(
    status: StatusCode,
    body: Value,
    delay: Duration,
) -> anyhow::Result<(String, Arc<Mutex<Vec<ModerationRequest>>>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = GateState {
        status,
        body,
        delay,
        received: Arc::clone(&received),
    };
    let app = Router::new()
        .route("/predict", post(handle_predict))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), received))
}

#[tokio::test]
async fn toxic_response_yields_block_with_confidence() {
    let (url, received) = spawn_gate(
        StatusCode::OK,
        json!({"text": "you are stupid", "is_toxic": true, "confidence": 0.87}),
        Duration::ZERO,
    )
    .await
    .expect("spawn gate");
    let gate = HttpModerationGate::new(&url, DEFAULT_MODERATION_TIMEOUT).expect("gate");

    let verdict = gate.check("you are stupid").await.expect("verdict");

    assert_eq!(verdict, ModerationVerdict::Block { confidence: 0.87 });
    let received = received.lock().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].text, "you are stupid");
}

#[tokio::test]
async fn clean_response_yields_allow() {
    let (url, _) = spawn_gate(
        StatusCode::OK,
        json!({"is_toxic": false}),
        Duration::ZERO,
    )
    .await
    .expect("spawn gate");
    let gate = HttpModerationGate::new(&url, DEFAULT_MODERATION_TIMEOUT).expect("gate");

    assert_eq!(
        gate.check("great post!").await.expect("verdict"),
        ModerationVerdict::Allow
    );
}

#[tokio::test]
async fn server_error_is_reported_as_status() {
    let (url, _) = spawn_gate(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"detail": "model failure"}),
        Duration::ZERO,
    )
    .await
    .expect("spawn gate");
    let gate = HttpModerationGate::new(&url, DEFAULT_MODERATION_TIMEOUT).expect("gate");

    let err = gate.check("anything").await.expect_err("status error");
    assert!(matches!(err, ModerationError::Status(500)), "{err:?}");
}

#[tokio::test]
async fn slow_gate_times_out() {
    let (url, _) = spawn_gate(
        StatusCode::OK,
        json!({"is_toxic": true, "confidence": 0.99}),
        Duration::from_millis(500),
    )
    .await
    .expect("spawn gate");
    let gate = HttpModerationGate::new(&url, Duration::from_millis(50)).expect("gate");

    let err = gate.check("slow").await.expect_err("timeout");
    assert!(matches!(err, ModerationError::Timeout), "{err:?}");
}

#[tokio::test]
async fn unreachable_gate_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let gate =
        HttpModerationGate::new(&format!("http://{addr}"), DEFAULT_MODERATION_TIMEOUT).expect("gate");
    let err = gate.check("hello").await.expect_err("connect failure");
    assert!(matches!(err, ModerationError::Transport(_)), "{err:?}");
}

#[test]
fn predict_url_keeps_base_path() {
    let gate = HttpModerationGate::new("http://mod.local/api/v2", DEFAULT_MODERATION_TIMEOUT)
        .expect("gate");
    assert_eq!(gate.predict_url().as_str(), "http://mod.local/api/v2/predict");
}

#[tokio::test]
async fn missing_gate_is_unavailable() {
    let err = MissingModerationGate.check("hi").await.expect_err("unavailable");
    assert!(matches!(err, ModerationError::Unavailable));
}
