mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{read_json, TestApp};

#[tokio::test]
async fn register_then_login_succeeds() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/register",
            Some(json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "correct-horse",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["message"], "User created successfully");

    let response = app
        .request(
            Method::POST,
            "/login",
            Some(json!({ "email": "alice@example.com", "password": "correct-horse" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["message"], "Logged in successfully");
    assert_eq!(body["username"], "alice");
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let app = TestApp::new().await;
    app.register_and_login("bob", "bob@example.com", "password123")
        .await;

    let wrong_password = app
        .request(
            Method::POST,
            "/login",
            Some(json!({ "email": "bob@example.com", "password": "nope-nope" })),
        )
        .await;
    let unknown_email = app
        .request(
            Method::POST,
            "/login",
            Some(json!({ "email": "ghost@example.com", "password": "nope-nope" })),
        )
        .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);

    let a = read_json(wrong_password).await;
    let b = read_json(unknown_email).await;
    assert_eq!(a["error"], b["error"]);
    assert_eq!(a["message"], b["message"]);
}

#[tokio::test]
async fn duplicate_username_and_email_rejected() {
    let app = TestApp::new().await;
    app.register_and_login("carol", "carol@example.com", "password123")
        .await;

    let duplicate_username = app
        .request(
            Method::POST,
            "/register",
            Some(json!({
                "username": "carol",
                "email": "other@example.com",
                "password": "password123",
            })),
        )
        .await;
    assert_eq!(duplicate_username.status(), StatusCode::BAD_REQUEST);

    let duplicate_email = app
        .request(
            Method::POST,
            "/register",
            Some(json!({
                "username": "carol2",
                "email": "carol@example.com",
                "password": "password123",
            })),
        )
        .await;
    assert_eq!(duplicate_email.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_validates_fields() {
    let app = TestApp::new().await;

    let bad_email = app
        .request(
            Method::POST,
            "/register",
            Some(json!({
                "username": "dave",
                "email": "not-an-email",
                "password": "password123",
            })),
        )
        .await;
    assert_eq!(bad_email.status(), StatusCode::BAD_REQUEST);

    let short_password = app
        .request(
            Method::POST,
            "/register",
            Some(json!({
                "username": "dave",
                "email": "dave@example.com",
                "password": "short",
            })),
        )
        .await;
    assert_eq!(short_password.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_login_distinguishes_role_from_credentials() {
    let app = TestApp::new().await;
    app.register_and_login("erin", "erin@example.com", "password123")
        .await;
    app.register_admin("frank", "frank@example.com", "password123")
        .await;

    // Valid credentials, no elevated role
    let response = app
        .request(
            Method::POST,
            "/admin-login",
            Some(json!({ "email": "erin@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Invalid credentials stay generic 401
    let response = app
        .request(
            Method::POST,
            "/admin-login",
            Some(json!({ "email": "erin@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Elevated account succeeds
    let response = app
        .request(
            Method::POST,
            "/admin-login",
            Some(json!({ "email": "frank@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["message"], "Admin login successful");
    assert_eq!(body["is_admin"], true);
    assert!(body["access_token"].as_str().is_some());
}

#[tokio::test]
async fn admin_status_reports_role() {
    let app = TestApp::new().await;
    let user_token = app
        .register_and_login("grace", "grace@example.com", "password123")
        .await;
    let admin_token = app
        .register_admin("heidi", "heidi@example.com", "password123")
        .await;

    let anonymous = app.request(Method::GET, "/admin-login", None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let regular = app
        .request_with_token(Method::GET, "/admin-login", Some(&user_token), None)
        .await;
    assert_eq!(regular.status(), StatusCode::FORBIDDEN);
    let body = read_json(regular).await;
    assert_eq!(body["is_admin"], false);

    let admin = app
        .request_with_token(Method::GET, "/admin-login", Some(&admin_token), None)
        .await;
    assert_eq!(admin.status(), StatusCode::OK);
    let body = read_json(admin).await;
    assert_eq!(body["is_admin"], true);
}

#[tokio::test]
async fn admin_register_requires_invite_code() {
    let app = TestApp::new().await;

    let missing_code = app
        .request(
            Method::POST,
            "/admin-register",
            Some(json!({
                "username": "ivan",
                "email": "ivan@example.com",
                "password": "password123",
                "invite_code": "wrong-code",
            })),
        )
        .await;
    assert_eq!(missing_code.status(), StatusCode::FORBIDDEN);

    // No account was created by the refused request
    let login = app
        .request(
            Method::POST,
            "/login",
            Some(json!({ "email": "ivan@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_register_elevates_regardless_of_payload_role_fields() {
    let app = TestApp::new().await;

    // Role fields in the payload are ignored; the account is always elevated.
    let response = app
        .request(
            Method::POST,
            "/admin-register",
            Some(json!({
                "username": "judy",
                "email": "judy@example.com",
                "password": "password123",
                "invite_code": common::TEST_INVITE_CODE,
                "is_staff": false,
                "is_superuser": false,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["message"], "Admin registered successfully");
    assert_eq!(body["is_admin"], true);
    assert_eq!(body["username"], "judy");

    let token = body["access_token"].as_str().unwrap().to_string();
    let status = app
        .request_with_token(Method::GET, "/admin-login", Some(&token), None)
        .await;
    assert_eq!(status.status(), StatusCode::OK);
    let body = read_json(status).await;
    assert_eq!(body["is_admin"], true);
}
