//! Integration tests for the calendar token endpoints.

#![allow(clippy::unwrap_used)]

use std::{net::SocketAddr, sync::Arc};

use {
    serde_json::{Value, json},
    tokio::net::TcpListener,
};

use calbridge_gateway::{AppState, TokenStore, build_gateway_app, open_store};

const USER_HEADER: &str = "x-calbridge-user-id";

/// Spin up a test gateway on an ephemeral port, return the bound address.
async fn start_test_server() -> SocketAddr {
    start_test_server_with_pool().await.0
}

/// Like [`start_test_server`], also handing back the database pool.
async fn start_test_server_with_pool() -> (SocketAddr, sqlx::SqlitePool) {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    TokenStore::init(&pool).await.unwrap();
    let state = AppState::new(Arc::new(TokenStore::new(pool.clone())), USER_HEADER);
    let app = build_gateway_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, pool)
}

async fn post_token(addr: SocketAddr, user: Option<&str>, body: &Value) -> (u16, Value) {
    let client = reqwest::Client::new();
    let mut req = client
        .post(format!("http://{addr}/api/calendar/tokens"))
        .json(body);
    if let Some(user) = user {
        req = req.header(USER_HEADER, user);
    }
    let resp = req.send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

fn google_body() -> Value {
    json!({
        "provider": "google",
        "accessToken": "tok123",
        "scope": "https://www.googleapis.com/auth/calendar.readonly",
        "expiresIn": "3600",
    })
}

#[tokio::test]
async fn health_endpoint_returns_json() {
    let addr = start_test_server().await;
    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn store_without_identity_is_unauthorized() {
    let addr = start_test_server().await;
    let (status, body) = post_token(addr, None, &google_body()).await;
    assert_eq!(status, 401);
    assert_eq!(
        body,
        json!({
            "success": false,
            "message": "Unauthorized. Please log in to connect your calendar.",
        })
    );
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let addr = start_test_server().await;

    for body in [
        json!({"provider": "google"}),
        json!({"accessToken": "tok"}),
        json!({"provider": "google", "accessToken": ""}),
        json!({"provider": "yahoo", "accessToken": "tok"}),
        json!({"provider": "google", "accessToken": "tok", "expiresIn": "soon"}),
    ] {
        let (status, resp) = post_token(addr, Some("user-1"), &body).await;
        assert_eq!(status, 400, "body: {body}");
        assert_eq!(resp["success"], false);
        assert_eq!(
            resp["message"],
            "Missing required fields: provider and accessToken"
        );
    }
}

#[tokio::test]
async fn store_list_and_disconnect() {
    let addr = start_test_server().await;

    let (status, body) = post_token(addr, Some("user-1"), &google_body()).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "google calendar connected successfully");
    assert_eq!(body["provider"], "google");
    assert!(body["connectedAt"].as_str().unwrap().ends_with('Z'));

    // Storing again replaces rather than duplicates.
    let (status, _) = post_token(addr, Some("user-1"), &google_body()).await;
    assert_eq!(status, 200);

    let client = reqwest::Client::new();
    let listed: Value = client
        .get(format!("http://{addr}/api/calendar/tokens"))
        .header(USER_HEADER, "user-1")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["provider"], "google");
    assert!(listed[0].get("accessToken").is_none());
    assert!(listed[0]["expiresAt"].as_i64().unwrap() > 0);

    // Other users see nothing.
    let other: Value = client
        .get(format!("http://{addr}/api/calendar/tokens"))
        .header(USER_HEADER, "user-2")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(other, json!([]));

    let deleted = client
        .delete(format!("http://{addr}/api/calendar/tokens/google"))
        .header(USER_HEADER, "user-1")
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);

    let again = client
        .delete(format!("http://{addr}/api/calendar/tokens/google"))
        .header(USER_HEADER, "user-1")
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn storage_failure_returns_server_error() {
    let (addr, pool) = start_test_server_with_pool().await;
    sqlx::query("DROP TABLE calendar_tokens")
        .execute(&pool)
        .await
        .unwrap();

    let (status, body) = post_token(addr, Some("user-1"), &google_body()).await;
    assert_eq!(status, 500);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "Failed to connect calendar. Please try again."
    );
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("calendar_tokens")
    );
    assert!(body.get("provider").is_none());
}

#[tokio::test]
async fn open_store_creates_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("nested").join("calbridge.db");
    let url = format!("sqlite://{}?mode=rwc", db.display());

    let store = open_store(&url).await.unwrap();
    assert!(db.exists());
    assert!(store.list_for_user("anyone").await.unwrap().is_empty());
}
