//! Integration tests for the auth wire endpoints.
//!
//! Uses Tower's `oneshot()` to test the full Axum app including middleware.

mod common;

use axum::http::{StatusCode, header};
use common::{PASSWORD, body_json, build_test_app, get, json_post, session_cookie, sign_up};
use serde_json::json;
use tower::ServiceExt;

// ───── sign-up / get-session / sign-out ─────

#[tokio::test]
async fn test_sign_up_session_sign_out_flow() {
    let (app, _state) = build_test_app();

    let cookie = sign_up(&app, "Jane", "jane@example.com").await;

    let resp = app
        .clone()
        .oneshot(get("/api/auth/get-session", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["user"]["email"], "jane@example.com");
    assert_eq!(body["user"]["name"], "Jane");
    assert_eq!(body["session"]["userId"], body["user"]["id"]);
    assert!(body["session"].get("token").is_none());

    let mut sign_out = json_post("/api/auth/sign-out", &json!({}));
    sign_out
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let resp = app.clone().oneshot(sign_out).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared = resp
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(body_json(resp).await["success"], true);

    // The old cookie no longer resolves.
    let resp = app
        .oneshot(get("/api/auth/get-session", Some(&cookie)))
        .await
        .unwrap();
    assert!(body_json(resp).await.is_null());
}

#[tokio::test]
async fn test_get_session_without_cookie_is_null() {
    let (app, _state) = build_test_app();
    let resp = app
        .oneshot(get("/api/auth/get-session", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json(resp).await.is_null());
}

#[tokio::test]
async fn test_sign_in_after_sign_up() {
    let (app, _state) = build_test_app();
    sign_up(&app, "Jane", "jane@example.com").await;

    let resp = app
        .oneshot(json_post(
            "/api/auth/sign-in/email",
            &json!({"email": "JANE@example.com", "password": PASSWORD}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).is_some());
    let body = body_json(resp).await;
    assert_eq!(body["user"]["email"], "jane@example.com");
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let (app, _state) = build_test_app();
    sign_up(&app, "Jane", "jane@example.com").await;

    let resp = app
        .oneshot(json_post(
            "/api/auth/sign-up/email",
            &json!({"name": "Other Jane", "email": "jane@example.com", "password": PASSWORD}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(resp).await["code"], "USER_ALREADY_EXISTS");
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let (app, _state) = build_test_app();
    sign_up(&app, "Jane", "jane@example.com").await;

    let resp = app
        .oneshot(json_post(
            "/api/auth/sign-in/email",
            &json!({"email": "jane@example.com", "password": "not-the-password"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&resp).is_none());
    assert_eq!(body_json(resp).await["code"], "INVALID_EMAIL_OR_PASSWORD");
}

#[tokio::test]
async fn test_short_password_rejected() {
    let (app, _state) = build_test_app();
    let resp = app
        .oneshot(json_post(
            "/api/auth/sign-up/email",
            &json!({"name": "Jane", "email": "jane@example.com", "password": "short"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], "PASSWORD_TOO_SHORT");
}

#[tokio::test]
async fn test_untrusted_origin_rejected() {
    let (app, _state) = build_test_app();
    let mut req = json_post(
        "/api/auth/sign-up/email",
        &json!({"name": "Jane", "email": "jane@example.com", "password": PASSWORD}),
    );
    req.headers_mut()
        .insert(header::ORIGIN, "https://evil.example.com".parse().unwrap());

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(resp).await["code"], "INVALID_ORIGIN");
}

#[tokio::test]
async fn test_web_origin_trusted() {
    let (app, _state) = build_test_app();
    let mut req = json_post(
        "/api/auth/sign-up/email",
        &json!({"name": "Jane", "email": "jane@example.com", "password": PASSWORD}),
    );
    req.headers_mut()
        .insert(header::ORIGIN, "http://localhost:3000".parse().unwrap());

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// ───── misc endpoints ─────

#[tokio::test]
async fn test_ok_endpoint() {
    let (app, _state) = build_test_app();
    let resp = app.oneshot(get("/api/auth/ok", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["ok"], true);
}

#[tokio::test]
async fn test_open_api_schema() {
    let (app, _state) = build_test_app();
    let resp = app
        .oneshot(get("/api/auth/open-api/generate-schema", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["servers"][0]["url"], "http://localhost:3001/api/auth");
    assert!(body["paths"]["/sign-in/email"]["post"].is_object());
}

#[tokio::test]
async fn test_health() {
    let (app, _state) = build_test_app();
    let resp = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["auth_base_url"], "http://localhost:3001/api/auth");
}
