//! Router-level tests: envelopes, request ids, auth and the main flows

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use ethiobingo::{
    api::{create_app, AppState},
    config::BingoConfig,
    identity::LocalIdentityProvider,
    metrics::Metrics,
    store::{MemoryStore, SharedStore},
    wallet::LoggingNotifier,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SUPER_ADMIN_PHONE: &str = "+251911000001";

fn app() -> Router {
    let mut config = BingoConfig::testing();
    config.access.bootstrap_super_admins = vec![SUPER_ADMIN_PHONE.to_string()];

    let store: SharedStore = Arc::new(MemoryStore::new());
    let identity = LocalIdentityProvider::new(store.clone(), config.identity.clone());
    let state = AppState::new(
        config,
        store,
        Arc::new(identity),
        Arc::new(LoggingNotifier),
        Some(Arc::new(Metrics::new().unwrap())),
    );
    create_app(Arc::new(state))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}

async fn sign_up(app: &Router, phone: &str) -> String {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/auth/sign-up",
        None,
        Some(json!({"phone_number": phone, "password": "secret123", "full_name": "Test User"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_carries_request_id() {
    let app = app();
    let (status, headers, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Running");
    assert!(headers.contains_key("x-request-id"));

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "client-chosen-id")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "client-chosen-id");
}

#[tokio::test]
async fn test_error_envelope_matches_header() {
    let app = app();
    let (status, headers, body) = send(&app, Method::GET, "/games/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["message"], "game session not found");
    assert_eq!(
        body["request_id"].as_str().unwrap(),
        headers["x-request-id"].to_str().unwrap()
    );
}

#[tokio::test]
async fn test_game_flow() {
    let app = app();
    let (status, _, session) = send(&app, Method::POST, "/games", None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["state"], "idle");
    assert_eq!(session["remaining"], 75);
    let id = session["session_id"].as_str().unwrap().to_string();

    let (status, _, body) = send(&app, Method::POST, &format!("/games/{}/call", id), None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _, _) = send(&app, Method::POST, &format!("/games/{}/start", id), None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, called) = send(&app, Method::POST, &format!("/games/{}/call", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let number = called["number"].as_u64().unwrap();
    assert!((1..=75).contains(&number));
    assert_eq!(called["session"]["remaining"], 74);
    assert_eq!(called["session"]["called_numbers"][0], called["token"]);

    let marks = format!("/games/{}/marks", id);
    let (status, _, marked) =
        send(&app, Method::POST, &marks, None, Some(json!({"number": number}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["marked"], true);

    let (status, _, unmarked) =
        send(&app, Method::POST, &marks, None, Some(json!({"number": number}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unmarked["marked"], false);

    let (status, _, _) = send(&app, Method::POST, &marks, None, Some(json!({"number": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let card_before = called["session"]["card"].clone();
    let (status, _, reset) = send(&app, Method::POST, &format!("/games/{}/reset", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["state"], "idle");
    assert_eq!(reset["remaining"], 75);
    assert_eq!(reset["card"], card_before);

    let (status, _, _) = send(&app, Method::DELETE, &format!("/games/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_wallet_requires_token() {
    let app = app();
    let (status, _, body) = send(&app, Method::GET, "/wallet/balance", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _, _) = send(&app, Method::GET, "/wallet/balance", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deposit_and_confirm_over_http() {
    let app = app();
    let token = sign_up(&app, "+251922333444").await;

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/wallet/deposits",
        Some(&token),
        Some(json!({"amount": 9.99, "payment_method": "telebirr", "phone_number": "+251922333444"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, pending) = send(
        &app,
        Method::POST,
        "/wallet/deposits",
        Some(&token),
        Some(json!({"amount": 10, "payment_method": "telebirr", "phone_number": "+251922333444"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pending["transaction"]["status"], "pending");
    assert!(pending["transaction"].get("confirmation_code_hash").is_none());
    let txn = pending["transaction"]["transaction_id"].as_str().unwrap().to_string();
    let code = pending["confirmation_code"].as_str().unwrap().to_string();

    let confirm = format!("/wallet/transactions/{}/confirm", txn);
    let (status, _, confirmed) = send(
        &app,
        Method::POST,
        &confirm,
        Some(&token),
        Some(json!({"confirmation_code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["balance"], json!(10.0));

    let (status, _, again) = send(
        &app,
        Method::POST,
        &confirm,
        Some(&token),
        Some(json!({"confirmation_code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        again["error"]["message"],
        "invalid confirmation code or transaction not found"
    );

    let (_, _, balance) = send(&app, Method::GET, "/wallet/balance", Some(&token), None).await;
    assert_eq!(balance["balance"], json!(10.0));
    assert_eq!(balance["currency"], "ETB");
}

#[tokio::test]
async fn test_admin_routes_are_role_guarded() {
    let app = app();

    let player = sign_up(&app, "+251933000111").await;
    let (status, _, body) = send(&app, Method::GET, "/admin/dashboard", Some(&player), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let boss = sign_up(&app, SUPER_ADMIN_PHONE).await;
    let (status, _, dashboard) = send(&app, Method::GET, "/admin/dashboard", Some(&boss), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["role"], "super_admin");
    assert_eq!(dashboard["dashboard"], "super_admin");

    let (status, _, cartelas) = send(
        &app,
        Method::POST,
        "/admin/cartelas/bulk",
        Some(&boss),
        Some(json!({"count": 3, "user_name": "Kebede", "user_phone": "+251944000555"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cartelas.as_array().unwrap().len(), 3);

    let number = cartelas[0]["card_number"].as_str().unwrap().to_lowercase();
    let (status, _, verified) = send(
        &app,
        Method::GET,
        &format!("/cartelas/{}/verify", number),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["is_valid"], true);
    assert_eq!(verified["status"], "active");

    let (status, _, _) = send(&app, Method::GET, "/admin/audit", Some(&player), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, audit) = send(&app, Method::GET, "/admin/audit", Some(&boss), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!audit.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_metrics_exposition() {
    let app = app();
    send(&app, Method::GET, "/games/missing", None, None).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("ethiobingo_api_errors_total"));
    assert!(text.contains("NOT_FOUND"));
}

#[tokio::test]
async fn test_malformed_input_gets_envelope() {
    let app = app();
    let (_, _, session) = send(&app, Method::POST, "/games", None, None).await;
    let marks = format!("/games/{}/marks", session["session_id"].as_str().unwrap());

    // number does not fit a ball
    let (status, headers, body) =
        send(&app, Method::POST, &marks, None, Some(json!({"number": 300}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["details"]["rejection_status"], 422);
    assert_eq!(
        body["request_id"].as_str().unwrap(),
        headers["x-request-id"].to_str().unwrap()
    );

    // broken JSON
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/sign-in")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"phone_number\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["request_id"].is_string());

    // missing content type
    let request = Request::builder()
        .method(Method::POST)
        .uri(&marks)
        .body(Body::from("{\"number\": 5}"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // rejections are counted like any other API error
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("BAD_REQUEST"));
}
