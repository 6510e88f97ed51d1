//! Middleware Stack Tests
//!
//! Security headers, CORS and session cookies on the assembled router.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, Key, SignedCookieJar};

use chatty_server::presentation::middleware::SESSION_COOKIE;

use crate::common::{
    get, send, spawn_app, test_settings, MemoryPubSub, CLIENT_ORIGIN, SECRET_KEY_ONE,
    SECRET_KEY_TWO,
};

/// `session=<signed value>` pair signed with `secret`.
fn signed_session(secret: &str, value: &str) -> String {
    let jar = SignedCookieJar::new(Key::derive_from(secret.as_bytes()))
        .add(Cookie::new(SESSION_COOKIE, value.to_owned()));
    let response = (jar, ()).into_response();
    let set_cookie = response.headers().get(header::SET_COOKIE).unwrap();
    set_cookie.to_str().unwrap().split(';').next().unwrap().to_owned()
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = spawn_app(test_settings(), MemoryPubSub::new()).await.unwrap();

    for uri in ["/health", "/does-not-exist"] {
        let response = get(&app.router(), uri).await;
        let headers = response.headers();
        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "SAMEORIGIN");
        // Outside development HSTS is sent
        assert!(headers.get(header::STRICT_TRANSPORT_SECURITY).is_some());
    }
}

#[tokio::test]
async fn test_no_hsts_in_development() {
    let mut settings = test_settings();
    settings.environment = "development".into();
    let app = spawn_app(settings, MemoryPubSub::new()).await.unwrap();

    let response = get(&app.router(), "/health").await;

    assert!(response
        .headers()
        .get(header::STRICT_TRANSPORT_SECURITY)
        .is_none());
}

#[tokio::test]
async fn test_cors_allows_client_origin_with_credentials() {
    let app = spawn_app(test_settings(), MemoryPubSub::new()).await.unwrap();
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, CLIENT_ORIGIN)
        .body(Body::empty())
        .unwrap();

    let response = send(&app.router(), request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        CLIENT_ORIGIN
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_session_signed_with_previous_secret_is_reissued() {
    let app = spawn_app(test_settings(), MemoryPubSub::new()).await.unwrap();
    let request = Request::builder()
        .uri("/health")
        .header(
            header::COOKIE,
            HeaderValue::from_str(&signed_session(SECRET_KEY_TWO, "user-7")).unwrap(),
        )
        .body(Body::empty())
        .unwrap();

    let response = send(&app.router(), request).await;

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("cookie re-issued")
        .to_str()
        .unwrap()
        .to_owned();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Secure"));
    assert!(set_cookie.contains("Max-Age=3600"));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(set_cookie.split(';').next().unwrap()).unwrap(),
    );
    let jar = SignedCookieJar::from_headers(&headers, Key::derive_from(SECRET_KEY_ONE.as_bytes()));
    assert_eq!(jar.get(SESSION_COOKIE).unwrap().value(), "user-7");
}

#[tokio::test]
async fn test_session_signed_with_current_secret_is_kept() {
    let app = spawn_app(test_settings(), MemoryPubSub::new()).await.unwrap();
    let request = Request::builder()
        .uri("/health")
        .header(
            header::COOKIE,
            HeaderValue::from_str(&signed_session(SECRET_KEY_ONE, "user-7")).unwrap(),
        )
        .body(Body::empty())
        .unwrap();

    let response = send(&app.router(), request).await;

    assert!(response.headers().get(header::SET_COOKIE).is_none());
}
