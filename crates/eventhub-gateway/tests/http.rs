//! End-to-end tests against the in-process router.

use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use eventhub_core::config::HashingConfig;
use eventhub_core::{AuthConfig, Database};
use eventhub_gateway::auth::JwtManager;
use eventhub_gateway::{GatewayBuilder, GatewayConfig};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    secret: String,
}

fn app_with(conceal: bool, login_attempts_per_minute: u32) -> TestApp {
    let secret = JwtManager::generate_hex_secret();
    let auth = AuthConfig::builder()
        .jwt_secret(secret.clone())
        .conceal_foreign_resources(conceal)
        .password_hashing(HashingConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        })
        .build();
    let config = GatewayConfig {
        auth,
        login_attempts_per_minute,
        ..GatewayConfig::default()
    };

    let gateway = GatewayBuilder::new()
        .with_config(config)
        .with_database(Database::temporary().unwrap())
        .build()
        .unwrap();

    TestApp {
        router: gateway.router(),
        secret,
    }
}

fn app() -> TestApp {
    app_with(false, 100)
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    authorization: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn signup(app: &TestApp, email: &str, password: &str) -> u64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/user/signup",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_u64().unwrap()
}

async fn login(app: &TestApp, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    format!("Bearer {}", body["token"].as_str().unwrap())
}

fn event_body(name: &str) -> Value {
    json!({
        "name": name,
        "description": "A beginner-friendly workshop covering Go fundamentals",
        "location": "Jakarta",
        "dateTime": "2025-12-16T09:00:00+07:00",
    })
}

async fn create_event(app: &TestApp, token: &str, name: &str) -> u64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/event",
        Some(token),
        Some(event_body(name)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_u64().unwrap()
}

#[tokio::test]
async fn test_root_and_health() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully connected to the server");

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_signup_and_login() {
    let app = app();
    let id = signup(&app, "budi@example.com", "rahasia123").await;
    assert!(id >= 1);

    let (status, body) = send(
        &app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({"email": "budi@example.com", "password": "rahasia123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["expiresAt"].is_string());
}

#[tokio::test]
async fn test_signup_never_returns_hash() {
    let app = app();
    let (_, body) = send(
        &app,
        Method::POST,
        "/user/signup",
        None,
        Some(json!({"email": "a@x.com", "password": "pw"})),
    )
    .await;

    assert_eq!(body["message"], "User created successfully");
    assert_eq!(body["data"]["email"], "a@x.com");
    assert!(body["data"].get("passwordHash").is_none());
    assert!(!body.to_string().contains("argon2"));
}

#[tokio::test]
async fn test_duplicate_signup_conflicts() {
    let app = app();
    signup(&app, "a@x.com", "pw").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/user/signup",
        None,
        Some(json!({"email": "A@X.com", "password": "other"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "user_exists");
}

#[tokio::test]
async fn test_login_failures_look_identical() {
    let app = app();
    signup(&app, "a@x.com", "right").await;

    let (wrong_status, wrong_body) = send(
        &app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({"email": "a@x.com", "password": "wrong"})),
    )
    .await;
    let (unknown_status, unknown_body) = send(
        &app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({"email": "ghost@x.com", "password": "right"})),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["code"], "invalid_credentials");
}

#[tokio::test]
async fn test_event_lifecycle() {
    let app = app();
    let owner_id = signup(&app, "a@x.com", "pw").await;
    let token = login(&app, "a@x.com", "pw").await;

    let event_id = create_event(&app, &token, "Go Workshop Jakarta").await;

    let (status, body) = send(&app, Method::GET, &format!("/event/{event_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Go Workshop Jakarta");
    assert_eq!(body["data"]["userId"], owner_id);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/event/{event_id}"),
        Some(token.as_str()),
        Some(event_body("Go Workshop Bandung")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["name"], "Go Workshop Bandung");
    assert_eq!(body["data"]["userId"], owner_id);

    let (status, body) = send(&app, Method::GET, "/events", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/event/{event_id}"),
        Some(token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, &format!("/event/{event_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_owner_is_taken_from_token_not_body() {
    let app = app();
    let owner_id = signup(&app, "a@x.com", "pw").await;
    let token = login(&app, "a@x.com", "pw").await;

    let mut body = event_body("Meetup");
    body["userId"] = json!(999);
    let (status, body) = send(&app, Method::POST, "/event", Some(token.as_str()), Some(body)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["userId"], owner_id);
}

#[tokio::test]
async fn test_create_requires_token() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/event", None, Some(event_body("x"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "missing_token");
    assert_eq!(body["message"], "Not authorized");

    let (status, body) = send(
        &app,
        Method::POST,
        "/event",
        Some("Bearer not.a.token"),
        Some(event_body("x")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_token");

    let (_, body) = send(&app, Method::GET, "/events", None, None).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_raw_token_without_scheme() {
    let app = app();
    signup(&app, "a@x.com", "pw").await;
    let token = login(&app, "a@x.com", "pw").await;
    let raw = token.trim_start_matches("Bearer ");

    let (status, _) = send(&app, Method::POST, "/event", Some(raw), Some(event_body("x"))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_non_owner_is_forbidden() {
    let app = app();
    signup(&app, "owner@x.com", "pw").await;
    signup(&app, "other@x.com", "pw").await;
    let owner = login(&app, "owner@x.com", "pw").await;
    let other = login(&app, "other@x.com", "pw").await;

    let event_id = create_event(&app, &owner, "Mine").await;
    let uri = format!("/event/{event_id}");

    let (status, body) = send(&app, Method::PUT, &uri, Some(other.as_str()), Some(event_body("Hijacked"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = send(&app, Method::DELETE, &uri, Some(other.as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(body["data"]["name"], "Mine");
}

#[tokio::test]
async fn test_authentication_precedes_lookup() {
    let app = app();
    signup(&app, "a@x.com", "pw").await;
    let token = login(&app, "a@x.com", "pw").await;

    // Missing event with no token: the caller learns only that it is unauthenticated.
    let (status, _) = send(&app, Method::PUT, "/event/999", None, Some(event_body("x"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::DELETE, "/event/999", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conceal_foreign_resources() {
    let app = app_with(true, 100);
    signup(&app, "owner@x.com", "pw").await;
    signup(&app, "other@x.com", "pw").await;
    let owner = login(&app, "owner@x.com", "pw").await;
    let other = login(&app, "other@x.com", "pw").await;

    let event_id = create_event(&app, &owner, "Mine").await;

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/event/{event_id}"),
        Some(other.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = app();
    let id = signup(&app, "a@x.com", "pw").await;

    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "userId": id,
        "email": "a@x.com",
        "iat": now - 3 * 60 * 60,
        "expiredAt": now - 60 * 60,
    });
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("1".to_string());
    let secret = hex::decode(&app.secret).unwrap();
    let token = encode(&header, &claims, &EncodingKey::from_secret(&secret)).unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/event",
        Some(format!("Bearer {token}").as_str()),
        Some(event_body("x")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "token_expired");
}

#[tokio::test]
async fn test_malformed_input() {
    let app = app();
    signup(&app, "a@x.com", "pw").await;
    let token = login(&app, "a@x.com", "pw").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/event",
        Some(token.as_str()),
        Some(json!({"name": "No date"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let mut blank = event_body("x");
    blank["name"] = json!("   ");
    let (status, body) = send(&app, Method::POST, "/event", Some(token.as_str()), Some(blank)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let (status, _) = send(&app, Method::GET, "/event/not-a-number", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/user/signup",
        None,
        Some(json!({"email": "not-an-email", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_registrations() {
    let app = app();
    signup(&app, "owner@x.com", "pw").await;
    let attendee_id = signup(&app, "guest@x.com", "pw").await;
    let owner = login(&app, "owner@x.com", "pw").await;
    let guest = login(&app, "guest@x.com", "pw").await;

    let event_id = create_event(&app, &owner, "Meetup").await;
    let register = format!("/event/{event_id}/register");
    let registrations = format!("/event/{event_id}/registrations");

    let (status, body) = send(&app, Method::POST, &register, Some(guest.as_str()), None).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["userId"], attendee_id);

    let (status, _) = send(&app, Method::GET, &registrations, Some(guest.as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::GET, &registrations, Some(owner.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, Method::DELETE, &register, Some(guest.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Registration cancelled");

    let (status, _) = send(&app, Method::POST, "/event/999/register", Some(guest.as_str()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::POST, &register, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rate_limit() {
    let app = app_with(false, 3);
    signup(&app, "a@x.com", "pw").await;

    for _ in 0..3 {
        let (status, _) = send(
            &app,
            Method::POST,
            "/user/login",
            None,
            Some(json!({"email": "a@x.com", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({"email": "a@x.com", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "rate_limited");

    // Other accounts are unaffected.
    signup(&app, "b@x.com", "pw").await;
    login(&app, "b@x.com", "pw").await;
}
