use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use storefront_api::schema::builtin;
use storefront_api::{app, AppState, Catalog, MemoryStore, ResourceStore};
use tower::ServiceExt;

fn test_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), Catalog::builtin().unwrap());
    (app(state, true), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

fn user(name: &str, email: &str, status: &str) -> Value {
    json!({ "name": name, "email": email, "password": "s3cret!", "role": "user", "status": status })
}

fn product(name: &str) -> Value {
    json!({ "name": name, "price": 9.99, "stock": 4 })
}

fn contains_key_anywhere(v: &Value, key: &str) -> bool {
    match v {
        Value::Object(m) => m.contains_key(key) || m.values().any(|x| contains_key_anywhere(x, key)),
        Value::Array(a) => a.iter().any(|x| contains_key_anywhere(x, key)),
        _ => false,
    }
}

#[tokio::test]
async fn create_delete_create_reuses_id() {
    let (app, _) = test_app();
    let (s, body) = send(&app, "POST", "/products", Some(product("Lamp"))).await;
    assert_eq!(s, StatusCode::CREATED);
    assert_eq!(body["id"], 1);
    assert_eq!(body["message"], "Product created");

    let (s, _) = send(&app, "DELETE", "/products/1", None).await;
    assert_eq!(s, StatusCode::OK);

    let (_, body) = send(&app, "POST", "/products", Some(product("Desk"))).await;
    assert_eq!(body["id"], 1);
}

#[tokio::test]
async fn gaps_are_filled_before_appending() {
    let (app, store) = test_app();
    for n in ["a", "b", "c", "d"] {
        send(&app, "POST", "/products", Some(product(n))).await;
    }
    send(&app, "DELETE", "/products/2", None).await;
    let (_, body) = send(&app, "POST", "/products", Some(product("e"))).await;
    assert_eq!(body["id"], 2);
    let (_, body) = send(&app, "POST", "/products", Some(product("f"))).await;
    assert_eq!(body["id"], 5);
    assert_eq!(store.counter("products").await, 6);
}

#[tokio::test]
async fn get_after_delete_is_not_found() {
    let (app, _) = test_app();
    send(&app, "POST", "/users", Some(user("Ana Lopez", "ana@x.io", "active"))).await;
    let (s, row) = send(&app, "GET", "/users/1", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(row["email"], "ana@x.io");

    send(&app, "DELETE", "/users/1", None).await;
    let (s, body) = send(&app, "GET", "/users/1", None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    let (s, _) = send(&app, "DELETE", "/users/1", None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_without_password_keeps_credential() {
    let (app, store) = test_app();
    send(&app, "POST", "/users", Some(user("Ana Lopez", "ana@x.io", "active"))).await;
    let before = store.get(&builtin::users(), 1).await.unwrap().unwrap()["password"].clone();

    let patch = json!({ "name": "Ana Maria", "email": "ana@x.io", "password": "", "role": "admin", "status": "active" });
    let (s, body) = send(&app, "PUT", "/users/1", Some(patch)).await;
    assert_eq!(s, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "User updated");

    let after = store.get(&builtin::users(), 1).await.unwrap().unwrap();
    assert_eq!(after["password"], before);
    assert_eq!(after["role"], "admin");

    let (s, _) = send(&app, "POST", "/auth/login", Some(json!({ "email": "ana@x.io", "password": "s3cret!" }))).await;
    assert_eq!(s, StatusCode::OK);
}

#[tokio::test]
async fn update_with_password_rehashes() {
    let (app, _) = test_app();
    send(&app, "POST", "/users", Some(user("Ana Lopez", "ana@x.io", "active"))).await;
    let mut patch = user("Ana Lopez", "ana@x.io", "active");
    patch["password"] = json!("n3w-pass");
    send(&app, "PUT", "/users/1", Some(patch)).await;

    let (s, _) = send(&app, "POST", "/auth/login", Some(json!({ "email": "ana@x.io", "password": "s3cret!" }))).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
    let (s, _) = send(&app, "POST", "/auth/login", Some(json!({ "email": "ana@x.io", "password": "n3w-pass" }))).await;
    assert_eq!(s, StatusCode::OK);
}

#[tokio::test]
async fn update_cannot_change_id() {
    let (app, _) = test_app();
    send(&app, "POST", "/products", Some(product("Lamp"))).await;
    let mut patch = product("Lamp v2");
    patch["id"] = json!(40);
    let (s, _) = send(&app, "PUT", "/products/1", Some(patch)).await;
    assert_eq!(s, StatusCode::OK);
    let (s, row) = send(&app, "GET", "/products/1", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(row["id"], 1);
    assert_eq!(row["name"], "Lamp v2");
    let (s, _) = send(&app, "GET", "/products/40", None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_missing_row_is_not_found() {
    let (app, _) = test_app();
    let (s, _) = send(&app, "PUT", "/products/9", Some(product("Ghost"))).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_email_is_rejected_without_write() {
    let (app, store) = test_app();
    let (s, body) = send(&app, "POST", "/users", Some(user("Ana Lopez", "ana.x.io", "active"))).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(store.count(&builtin::users()).await.unwrap(), 0);
}

#[tokio::test]
async fn invalid_role_and_missing_fields_are_bad_requests() {
    let (app, _) = test_app();
    let mut bad = user("Ana Lopez", "ana@x.io", "active");
    bad["role"] = json!("superuser");
    let (s, _) = send(&app, "POST", "/users", Some(bad)).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);

    let (s, _) = send(&app, "POST", "/products", Some(json!({ "name": "Lamp" }))).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);

    let (s, body) = send(&app, "POST", "/products", Some(json!([1, 2]))).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let (app, _) = test_app();
    send(&app, "POST", "/users", Some(user("Ana Lopez", "ana@x.io", "active"))).await;
    let (s, _) = send(&app, "POST", "/users", Some(user("Ana Two", "ANA@x.io", "active"))).await;
    assert_eq!(s, StatusCode::CONFLICT);

    send(&app, "POST", "/users", Some(user("Bob Brown", "bob@x.io", "active"))).await;
    let mut patch = user("Bob Brown", "ana@x.io", "active");
    patch["password"] = json!("");
    let (s, _) = send(&app, "PUT", "/users/2", Some(patch)).await;
    assert_eq!(s, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_outcomes_and_no_credential_leak() {
    let (app, _) = test_app();
    send(&app, "POST", "/users", Some(user("Ana Lopez", "ana@x.io", "active"))).await;
    send(&app, "POST", "/users", Some(user("Old Account", "old@x.io", "inactive"))).await;

    let (s, body) = send(&app, "POST", "/auth/login", Some(json!({ "email": " ANA@x.io ", "password": "s3cret!" }))).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["account"]["id"], 1);
    assert_eq!(body["account"]["role"], "user");
    assert!(!contains_key_anywhere(&body, "password"));

    let (s, _) = send(&app, "POST", "/auth/login", Some(json!({ "email": "ana@x.io", "password": "wrong" }))).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);

    let (s, body) = send(&app, "POST", "/auth/login", Some(json!({ "email": "old@x.io", "password": "s3cret!" }))).await;
    assert_eq!(s, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let (s, _) = send(&app, "POST", "/auth/login", Some(json!({ "email": "nobody@x.io", "password": "s3cret!" }))).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);

    let (s, _) = send(&app, "POST", "/auth/login", Some(json!({ "email": "ana@x.io" }))).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);

    for uri in ["/users", "/users/1", "/users/2"] {
        let (_, body) = send(&app, "GET", uri, None).await;
        assert!(!contains_key_anywhere(&body, "password"), "{uri} leaked a credential");
    }
}

#[tokio::test]
async fn legacy_plaintext_row_can_log_in() {
    let (app, store) = test_app();
    let legacy = json!({ "name": "Legacy", "email": "legacy@x.io", "password": "plain", "role": "user", "status": "active" });
    store.seed(&builtin::users(), 3, legacy.as_object().cloned().unwrap()).await;
    let (s, _) = send(&app, "POST", "/auth/login", Some(json!({ "email": "legacy@x.io", "password": "plain" }))).await;
    assert_eq!(s, StatusCode::OK);

    let strict = AppState::new(store.clone(), Catalog::builtin().unwrap()).with_legacy_plaintext_login(false);
    let strict = app_from(strict);
    let (s, _) = send(&strict, "POST", "/auth/login", Some(json!({ "email": "legacy@x.io", "password": "plain" }))).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
}

fn app_from(state: AppState) -> Router {
    app(state, false)
}

#[tokio::test]
async fn verify_session() {
    let (app, _) = test_app();
    send(&app, "POST", "/users", Some(user("Ana Lopez", "ana@x.io", "active"))).await;
    let (s, body) = send(&app, "POST", "/auth/verify", Some(json!({ "email": "ana@x.io" }))).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["account"]["email"], "ana@x.io");
    let (s, _) = send(&app, "POST", "/auth/verify", Some(json!({ "email": "zed@x.io" }))).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn products_list_newest_first_users_by_id() {
    let (app, _) = test_app();
    for n in ["first", "second", "third"] {
        send(&app, "POST", "/products", Some(product(n))).await;
    }
    let (s, rows) = send(&app, "GET", "/products", None).await;
    assert_eq!(s, StatusCode::OK);
    let names: Vec<&str> = rows.as_array().unwrap().iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["third", "second", "first"]);
    assert_eq!(rows[0]["category"], "General");

    send(&app, "POST", "/users", Some(user("Ana Lopez", "ana@x.io", "active"))).await;
    send(&app, "POST", "/users", Some(user("Bob Brown", "bob@x.io", "active"))).await;
    let (_, rows) = send(&app, "GET", "/users", None).await;
    let ids: Vec<i64> = rows.as_array().unwrap().iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, [1, 2]);
}

#[tokio::test]
async fn counter_advance_failure_does_not_fail_create() {
    let (app, store) = test_app();
    store.set_counter_advance_failure(true);
    let (s, body) = send(&app, "POST", "/products", Some(product("Lamp"))).await;
    assert_eq!(s, StatusCode::CREATED);
    assert_eq!(body["id"], 1);
    assert_eq!(store.count(&builtin::products()).await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_resource_and_bad_ids() {
    let (app, _) = test_app();
    let (s, _) = send(&app, "GET", "/orders", None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    let (s, _) = send(&app, "GET", "/products/abc", None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    let (s, _) = send(&app, "GET", "/products/-3", None).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn service_routes_respond() {
    let (app, _) = test_app();
    let (s, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (s, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["database"], "ok");
    let (s, body) = send(&app, "GET", "/", None).await;
    assert_eq!(s, StatusCode::OK);
    assert!(body["endpoints"]["products"]["POST /products"].is_string());
    assert!(body["endpoints"]["auth"]["POST /auth/login"].is_string());
}
