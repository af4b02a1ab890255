use super::*;
use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{CommentId, PostId, Provenance};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct StoreState {
    insert_status: Option<StatusCode>,
    insert_body: Option<Value>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    headers: Arc<Mutex<Vec<HeaderMap>>>,
    inserts: Arc<Mutex<Vec<Vec<NewCommentRow>>>>,
}

async fn handle_posts(
    State(state): State<StoreState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.queries.lock().await.push(query);
    state.headers.lock().await.push(headers);
    Json(json!([
        {
            "id": 2,
            "author_name": "Lan",
            "content": "newer",
            "created_at": "2024-05-02T08:00:00+00:00",
            "comments": []
        },
        {
            "id": 1,
            "author_name": "Minh",
            "content": "older",
            "created_at": "2024-05-01T08:00:00+00:00",
            "comments": [
                {"id": 10, "post_id": 1, "author_name": "Lan", "content": "first!", "created_at": "2024-05-01T09:00:00+00:00"}
            ]
        }
    ]))
}

async fn handle_insert(
    State(state): State<StoreState>,
    Json(rows): Json<Vec<NewCommentRow>>,
) -> (StatusCode, String) {
    state.inserts.lock().await.push(rows);
    let status = state.insert_status.unwrap_or(StatusCode::CREATED);
    let body = state
        .insert_body
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_default();
    (status, body)
}

async fn spawn_store(state: StoreState) -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/rest/v1/posts", get(handle_posts))
        .route("/rest/v1/comments", axum::routing::post(handle_insert))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn new_row() -> NewCommentRow {
    NewCommentRow {
        post_id: PostId(1),
        content: "great post!".to_string(),
        author_name: "You".to_string(),
    }
}

#[tokio::test]
async fn fetch_posts_requests_embedded_comments_newest_first() {
    let state = StoreState::default();
    let url = spawn_store(state.clone()).await.expect("spawn store");
    let store = RestDataStore::new(&url, "anon-key", DEFAULT_STORE_TIMEOUT).expect("store");

    let posts = store.fetch_posts().await.expect("posts");

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].id, PostId(2));
    assert_eq!(posts[1].comments.len(), 1);
    assert_eq!(posts[1].comments[0].id, CommentId::Stored(10));

    let queries = state.queries.lock().await;
    assert_eq!(queries[0].get("select").map(String::as_str), Some("*,comments(*)"));
    assert_eq!(queries[0].get("order").map(String::as_str), Some("created_at.desc"));

    let headers = state.headers.lock().await;
    assert_eq!(
        headers[0].get("apikey").and_then(|v| v.to_str().ok()),
        Some("anon-key")
    );
    assert_eq!(
        headers[0].get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer anon-key")
    );
}

#[tokio::test]
async fn insert_comment_returns_stored_row() {
    let state = StoreState {
        insert_body: Some(json!([
            {"id": 77, "post_id": 1, "author_name": "You", "content": "great post!", "created_at": "2024-05-03T00:00:00+00:00"}
        ])),
        ..StoreState::default()
    };
    let url = spawn_store(state.clone()).await.expect("spawn store");
    let store = RestDataStore::new(&url, "anon-key", DEFAULT_STORE_TIMEOUT).expect("store");

    let stored = store
        .insert_comment(&new_row())
        .await
        .expect("insert")
        .expect("row echoed");

    assert_eq!(stored.id, CommentId::Stored(77));
    assert_eq!(stored.provenance, Provenance::Confirmed);
    let inserts = state.inserts.lock().await;
    assert_eq!(inserts.as_slice(), &[vec![new_row()]]);
}

#[tokio::test]
async fn insert_comment_without_body_is_success_without_row() {
    let state = StoreState::default();
    let url = spawn_store(state).await.expect("spawn store");
    let store = RestDataStore::new(&url, "", DEFAULT_STORE_TIMEOUT).expect("store");

    assert!(store.insert_comment(&new_row()).await.expect("insert").is_none());
}

#[tokio::test]
async fn rejected_insert_carries_api_error_body() {
    let state = StoreState {
        insert_status: Some(StatusCode::FORBIDDEN),
        insert_body: Some(json!({
            "code": "42501",
            "message": "new row violates row-level security policy",
            "details": null,
            "hint": null
        })),
        ..StoreState::default()
    };
    let url = spawn_store(state).await.expect("spawn store");
    let store = RestDataStore::new(&url, "anon-key", DEFAULT_STORE_TIMEOUT).expect("store");

    let err = store.insert_comment(&new_row()).await.expect_err("rejected");
    match err {
        StoreError::Api(exception) => {
            assert_eq!(exception.status, 403);
            assert_eq!(exception.code, shared::error::ErrorCode::Unauthorized);
            assert_eq!(exception.body.code.as_deref(), Some("42501"));
            assert!(exception.body.message.contains("row-level security"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_store_is_unavailable() {
    assert!(matches!(
        MissingDataStore.fetch_posts().await,
        Err(StoreError::Unavailable)
    ));
    assert!(matches!(
        MissingDataStore.insert_comment(&new_row()).await,
        Err(StoreError::Unavailable)
    ));
}
