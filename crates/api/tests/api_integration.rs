//! Integration tests for the API server over in-memory backends.

use std::sync::{Arc, OnceLock};

use api::{AppState, StateSettings};
use auth::TokenSigner;
use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, Request, StatusCode};
use cache::InMemoryCache;
use chrono::{Duration, Utc};
use common::{Money, ProductId};
use metrics_exporter_prometheus::PrometheusHandle;
use notify::{InMemoryPublisher, topics};
use serde_json::{Value, json};
use store::{CatalogStore, InMemoryStore, NewProduct, NewUser, Product, User, UserStore};
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: Router,
    state: Arc<AppState<InMemoryStore>>,
    store: InMemoryStore,
    publisher: InMemoryPublisher,
}

fn setup_with_api_key(api_key: Option<&str>) -> TestApp {
    let store = InMemoryStore::new();
    let publisher = InMemoryPublisher::new();
    let state = Arc::new(AppState::new(
        store.clone(),
        Arc::new(InMemoryCache::new()),
        Arc::new(publisher.clone()),
        StateSettings {
            jwt_secret: SECRET.to_string(),
            api_key: api_key.map(str::to_string),
            cache_ttl: std::time::Duration::from_secs(60),
        },
    ));
    let app = api::create_app(
        state.clone(),
        get_metrics_handle(),
        api::cors_layer(&["http://localhost:3000".to_string()]),
    );
    TestApp {
        app,
        state,
        store,
        publisher,
    }
}

fn setup() -> TestApp {
    setup_with_api_key(None)
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

async fn send(app: &Router, request: Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    Reply {
        status,
        headers,
        body,
    }
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// Registers `name` and returns its session token.
async fn register(app: &Router, name: &str) -> String {
    let reply = send(
        app,
        post_json(
            "/register",
            None,
            json!({
                "username": name,
                "email": format!("{name}@example.com"),
                "password": "correct horse battery staple",
            }),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["token"].as_str().unwrap().to_string()
}

async fn seed_admin(t: &TestApp) -> String {
    let admin = t
        .store
        .insert_user(NewUser {
            username: "admin".into(),
            email: "admin@example.com".into(),
            password_hash: "not-a-login-account".into(),
            is_admin: true,
        })
        .await
        .unwrap();
    t.state.authenticator.issue_token(&admin).unwrap().token
}

async fn seed_product(t: &TestApp, name: &str, stock: i32) -> Product {
    t.store
        .insert_product(NewProduct {
            name: name.into(),
            price: Money::from_cents(2500),
            description: None,
            stock,
        })
        .await
        .unwrap()
}

async fn user_by_name(t: &TestApp, name: &str) -> User {
    t.store.find_user_by_username(name).await.unwrap().unwrap()
}

// ── System ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_check() {
    let t = setup();

    let reply = send(&t.app, get("/health", None)).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    register(&t.app, "metered").await;

    let response = t.app.clone().oneshot(get("/metrics", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

// ── Accounts ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_register_sets_session_cookie() {
    let t = setup();

    let reply = send(
        &t.app,
        post_json(
            "/register",
            None,
            json!({"username": "alice", "email": "Alice@Example.com", "password": "pw-alice"}),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["user"]["username"], "alice");
    assert_eq!(reply.body["user"]["email"], "alice@example.com");
    assert!(reply.body["user"].get("password_hash").is_none());

    let cookie = reply.headers[SET_COOKIE].to_str().unwrap();
    let token = reply.body["token"].as_str().unwrap();
    assert!(cookie.starts_with(&format!("token={token}")));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=604800"));

    assert_eq!(t.publisher.payloads_on(topics::USER_EVENTS).await.len(), 1);
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let t = setup();
    register(&t.app, "alice").await;

    let reply = send(
        &t.app,
        post_json(
            "/register",
            None,
            json!({"username": "alice2", "email": "alice@example.com", "password": "pw"}),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "conflict");
}

#[tokio::test]
async fn test_register_rejects_malformed_body() {
    let t = setup();

    let reply = send(
        &t.app,
        post_json("/register", None, json!({"username": "no-password"})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "validation_failed");
}

#[tokio::test]
async fn test_login_by_email_or_username() {
    let t = setup();
    register(&t.app, "bob").await;

    for body in [
        json!({"email": "bob@example.com", "password": "correct horse battery staple"}),
        json!({"username": "bob", "password": "correct horse battery staple"}),
    ] {
        let reply = send(&t.app, post_json("/login", None, body)).await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        assert_eq!(reply.body["user"]["username"], "bob");
        assert!(reply.headers.contains_key(SET_COOKIE));
    }

    assert_eq!(t.publisher.payloads_on(topics::LOGIN_EVENTS).await.len(), 2);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_rejected() {
    let t = setup();
    register(&t.app, "carol").await;

    let wrong = send(
        &t.app,
        post_json(
            "/login",
            None,
            json!({"email": "carol@example.com", "password": "nope"}),
        ),
    )
    .await;
    let unknown = send(
        &t.app,
        post_json(
            "/login",
            None,
            json!({"email": "nobody@example.com", "password": "nope"}),
        ),
    )
    .await;

    for reply in [wrong, unknown] {
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["error"], "invalid_credentials");
        assert!(!reply.headers.contains_key(SET_COOKIE));
    }
}

#[tokio::test]
async fn test_login_requires_an_identifier() {
    let t = setup();

    let reply = send(&t.app, post_json("/login", None, json!({"password": "pw"}))).await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "validation_failed");
}

#[tokio::test]
async fn test_api_key_is_enforced_when_configured() {
    let t = setup_with_api_key(Some("k3y"));
    let body = json!({"username": "dave", "email": "dave@example.com", "password": "pw"});

    let missing = send(&t.app, post_json("/register", None, body.clone())).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["error"], "invalid_api_key");

    let mut request = post_json("/register", None, body);
    request
        .headers_mut()
        .insert("x-api-key", "k3y".parse().unwrap());
    let accepted = send(&t.app, request).await;
    assert_eq!(accepted.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let t = setup();

    let reply = send(
        &t.app,
        Request::builder()
            .method("POST")
            .uri("/logout")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    let cookie = reply.headers[SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

// ── Session authentication ──────────────────────────────────────────

#[tokio::test]
async fn test_me_accepts_cookie_and_bearer() {
    let t = setup();
    let token = register(&t.app, "erin").await;

    let bearer = send(&t.app, get("/users/me", Some(&token))).await;
    assert_eq!(bearer.status, StatusCode::OK);
    assert_eq!(bearer.body["username"], "erin");

    let with_cookie = Request::builder()
        .uri("/users/me")
        .header(COOKIE, format!("token={token}"))
        .body(Body::empty())
        .unwrap();
    let cookie = send(&t.app, with_cookie).await;
    assert_eq!(cookie.status, StatusCode::OK);
    assert_eq!(cookie.body["username"], "erin");
}

#[tokio::test]
async fn test_me_without_token_is_unauthenticated() {
    let t = setup();

    let reply = send(&t.app, get("/users/me", None)).await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"], "unauthenticated");
}

#[tokio::test]
async fn test_invalid_and_expired_tokens_are_rejected() {
    let t = setup();
    register(&t.app, "frank").await;
    let user = user_by_name(&t, "frank").await;

    let garbage = send(&t.app, get("/users/me", Some("not.a.token"))).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.body["error"], "invalid_token");

    let forged = TokenSigner::new("some-other-secret").issue(user.id).unwrap();
    let forged = send(&t.app, get("/users/me", Some(&forged.token))).await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
    assert_eq!(forged.body["error"], "invalid_token");

    let stale = TokenSigner::new(SECRET)
        .issue_at(user.id, Utc::now() - Duration::days(8))
        .unwrap();
    let expired = send(&t.app, get("/users/me", Some(&stale.token))).await;
    assert_eq!(expired.status, StatusCode::UNAUTHORIZED);
    assert_eq!(expired.body["error"], "token_expired");
}

#[tokio::test]
async fn test_deactivated_user_is_refused_with_live_token() {
    let t = setup();
    let token = register(&t.app, "grace").await;
    let user = user_by_name(&t, "grace").await;

    t.store.set_user_active(user.id, false).await.unwrap();

    let reply = send(&t.app, get("/users/me", Some(&token))).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["error"], "inactive_account");
}

// ── Catalog ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_admin_creates_product() {
    let t = setup();
    let admin = seed_admin(&t).await;

    let reply = send(
        &t.app,
        post_json(
            "/products",
            Some(&admin),
            json!({"name": "Widget", "price_cents": 1999, "description": "blue", "stock": 5}),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["name"], "Widget");
    assert_eq!(reply.body["price_cents"], 1999);
    assert_eq!(reply.body["stock"], 5);

    let listed = send(&t.app, get("/products", None)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_admin_cannot_create_product() {
    let t = setup();
    let token = register(&t.app, "heidi").await;

    let reply = send(
        &t.app,
        post_json(
            "/products",
            Some(&token),
            json!({"name": "Widget", "price_cents": 1999, "stock": 5}),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["error"], "forbidden");
}

#[tokio::test]
async fn test_product_creation_validation_and_duplicates() {
    let t = setup();
    let admin = seed_admin(&t).await;
    seed_product(&t, "Widget", 3).await;

    let duplicate = send(
        &t.app,
        post_json(
            "/products",
            Some(&admin),
            json!({"name": "Widget", "price_cents": 100, "stock": 1}),
        ),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.body["error"], "conflict");

    let free = send(
        &t.app,
        post_json(
            "/products",
            Some(&admin),
            json!({"name": "Freebie", "price_cents": 0, "stock": 1}),
        ),
    )
    .await;
    assert_eq!(free.status, StatusCode::BAD_REQUEST);
    assert_eq!(free.body["error"], "validation_failed");
}

#[tokio::test]
async fn test_get_product_and_not_found() {
    let t = setup();
    let product = seed_product(&t, "Gizmo", 2).await;

    let found = send(&t.app, get(&format!("/products/{}", product.id), None)).await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(found.body["name"], "Gizmo");

    let missing = send(
        &t.app,
        get(&format!("/products/{}", ProductId::new()), None),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"], "not_found");

    let malformed = send(&t.app, get("/products/not-a-uuid", None)).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.body["error"], "validation_failed");
}

// ── Orders ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_place_order_decrements_stock() {
    let t = setup();
    let token = register(&t.app, "ivan").await;
    let product = seed_product(&t, "Lamp", 5).await;

    let reply = send(
        &t.app,
        post_json(
            "/orders",
            Some(&token),
            json!({"product_id": product.id, "quantity": 3}),
        ),
    )
    .await;

    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["quantity"], 3);
    assert_eq!(reply.body["status"], "pending");

    let product = send(&t.app, get(&format!("/products/{}", product.id), None)).await;
    assert_eq!(product.body["stock"], 2);
    assert_eq!(t.publisher.payloads_on(topics::ORDER_EVENTS).await.len(), 1);
}

#[tokio::test]
async fn test_order_rejections() {
    let t = setup();
    let token = register(&t.app, "judy").await;
    let product = seed_product(&t, "Chair", 2).await;

    let too_many = send(
        &t.app,
        post_json(
            "/orders",
            Some(&token),
            json!({"product_id": product.id, "quantity": 3}),
        ),
    )
    .await;
    assert_eq!(too_many.status, StatusCode::BAD_REQUEST);
    assert_eq!(too_many.body["error"], "insufficient_stock");

    let unknown = send(
        &t.app,
        post_json(
            "/orders",
            Some(&token),
            json!({"product_id": ProductId::new(), "quantity": 1}),
        ),
    )
    .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let zero = send(
        &t.app,
        post_json(
            "/orders",
            Some(&token),
            json!({"product_id": product.id, "quantity": 0}),
        ),
    )
    .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);
    assert_eq!(zero.body["error"], "validation_failed");

    let anonymous = send(
        &t.app,
        post_json(
            "/orders",
            None,
            json!({"product_id": product.id, "quantity": 1}),
        ),
    )
    .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    assert_eq!(t.store.order_count().await, 0);
    assert!(t.publisher.payloads_on(topics::ORDER_EVENTS).await.is_empty());
}

#[tokio::test]
async fn test_idempotency_key_replays_order() {
    let t = setup();
    let token = register(&t.app, "mallory").await;
    let product = seed_product(&t, "Desk", 10).await;

    let request = || {
        let mut request = post_json(
            "/orders",
            Some(&token),
            json!({"product_id": product.id, "quantity": 4}),
        );
        request
            .headers_mut()
            .insert("idempotency-key", "checkout-1".parse().unwrap());
        request
    };

    let first = send(&t.app, request()).await;
    let second = send(&t.app, request()).await;

    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.body["id"], second.body["id"]);
    assert_eq!(t.store.order_count().await, 1);

    let product = send(&t.app, get(&format!("/products/{}", product.id), None)).await;
    assert_eq!(product.body["stock"], 6);
}

#[tokio::test]
async fn test_idempotency_key_reused_for_other_quantity_conflicts() {
    let t = setup();
    let token = register(&t.app, "trent").await;
    let product = seed_product(&t, "Shelf", 10).await;

    let keyed = |quantity: i32| {
        let mut request = post_json(
            "/orders",
            Some(&token),
            json!({"product_id": product.id, "quantity": quantity}),
        );
        request
            .headers_mut()
            .insert("idempotency-key", "checkout-9".parse().unwrap());
        request
    };

    let first = send(&t.app, keyed(1)).await;
    let second = send(&t.app, keyed(5)).await;

    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.body["error"], "conflict");
    assert_eq!(t.store.order_count().await, 1);
}

#[tokio::test]
async fn test_orders_are_private_to_their_owner() {
    let t = setup();
    let owner = register(&t.app, "niaj").await;
    let other = register(&t.app, "olivia").await;
    let product = seed_product(&t, "Rug", 5).await;

    let placed = send(
        &t.app,
        post_json(
            "/orders",
            Some(&owner),
            json!({"product_id": product.id, "quantity": 1}),
        ),
    )
    .await;
    let order_uri = format!("/orders/{}", placed.body["id"].as_str().unwrap());

    let mine = send(&t.app, get(&order_uri, Some(&owner))).await;
    assert_eq!(mine.status, StatusCode::OK);

    let theirs = send(&t.app, get(&order_uri, Some(&other))).await;
    assert_eq!(theirs.status, StatusCode::NOT_FOUND);

    let listed = send(&t.app, get("/orders", Some(&owner))).await;
    assert_eq!(listed.body.as_array().unwrap().len(), 1);
    let other_list = send(&t.app, get("/orders", Some(&other))).await;
    assert!(other_list.body.as_array().unwrap().is_empty());
}

// ── Cart and favorites ──────────────────────────────────────────────

#[tokio::test]
async fn test_cart_accumulates_and_lists() {
    let t = setup();
    let token = register(&t.app, "peggy").await;
    let product = seed_product(&t, "Mug", 10).await;

    for quantity in [2, 3] {
        let reply = send(
            &t.app,
            post_json(
                "/cart/add",
                Some(&token),
                json!({"product_id": product.id, "quantity": quantity}),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    }

    let cart = send(&t.app, get("/cart", Some(&token))).await;
    assert_eq!(cart.status, StatusCode::OK);
    let lines = cart.body.as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["line"]["quantity"], 5);
    assert_eq!(lines[0]["product"]["name"], "Mug");

    // Adding to a cart reserves nothing.
    let product = send(&t.app, get(&format!("/products/{}", product.id), None)).await;
    assert_eq!(product.body["stock"], 10);
}

#[tokio::test]
async fn test_cart_quantity_overflow_is_a_client_error() {
    let t = setup();
    let token = register(&t.app, "sybil").await;
    let product = seed_product(&t, "Sand", i32::MAX).await;
    let add = || {
        post_json(
            "/cart/add",
            Some(&token),
            json!({"product_id": product.id, "quantity": i32::MAX}),
        )
    };

    assert_eq!(send(&t.app, add()).await.status, StatusCode::OK);
    let overflow = send(&t.app, add()).await;

    assert_eq!(overflow.status, StatusCode::BAD_REQUEST);
    assert_eq!(overflow.body["error"], "validation_failed");
}

#[tokio::test]
async fn test_favorites_add_list_remove() {
    let t = setup();
    let token = register(&t.app, "rupert").await;
    let product = seed_product(&t, "Plant", 1).await;
    let uri = format!("/favorites/{}", product.id);

    let added = send(&t.app, empty_request("POST", &uri, &token)).await;
    assert_eq!(added.status, StatusCode::NO_CONTENT);
    let again = send(&t.app, empty_request("POST", &uri, &token)).await;
    assert_eq!(again.status, StatusCode::NO_CONTENT);

    let listed = send(&t.app, get("/favorites", Some(&token))).await;
    assert_eq!(listed.body.as_array().unwrap().len(), 1);
    assert_eq!(listed.body[0]["name"], "Plant");

    let removed = send(&t.app, empty_request("DELETE", &uri, &token)).await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);

    let listed = send(&t.app, get("/favorites", Some(&token))).await;
    assert!(listed.body.as_array().unwrap().is_empty());
}

// ── Degraded storage ────────────────────────────────────────────────

#[tokio::test]
async fn test_unavailable_store_is_503() {
    let t = setup();
    t.store.set_unavailable(true);

    let reply = send(&t.app, get("/products", None)).await;

    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.body["error"], "storage_unavailable");
    assert!(!reply.body["message"].as_str().unwrap().contains("in-memory"));
}
