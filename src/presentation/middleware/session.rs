//! Session Cookie Middleware
//!
//! Verifies the signed `session` cookie against the current and the previous
//! secret. New cookies are always signed with the current secret; a cookie
//! that only verifies against the previous one is re-issued.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use config::ConfigError;

use crate::config::{Settings, MIN_SESSION_SECRET_LENGTH};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Verified session value, inserted into request extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session(pub Option<String>);

/// Signing keys and cookie attributes for sessions.
#[derive(Clone)]
pub struct SessionKeys {
    /// Current key first
    keys: [Key; 2],
    max_age: Duration,
    secure: bool,
}

impl SessionKeys {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let session = &settings.session;
        Ok(Self {
            keys: [
                derive_key(&session.secret_key_one)?,
                derive_key(&session.secret_key_two)?,
            ],
            max_age: session.max_age(),
            secure: !settings.is_development(),
        })
    }

    pub fn current(&self) -> &Key {
        &self.keys[0]
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Build a session cookie carrying `value`, unsigned.
    pub fn cookie(&self, value: &str) -> Option<Cookie<'static>> {
        let mut cookie = Cookie::parse(format!(
            "{}={}; Max-Age={}",
            SESSION_COOKIE,
            value,
            self.max_age.as_secs()
        ))
        .ok()?;
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure);
        Some(cookie)
    }

    /// Verify the session cookie carried by `headers`.
    ///
    /// Returns the value and the index of the key that verified it.
    fn verify(&self, headers: &axum::http::HeaderMap) -> Option<(String, usize)> {
        self.keys.iter().enumerate().find_map(|(index, key)| {
            SignedCookieJar::from_headers(headers, key.clone())
                .get(SESSION_COOKIE)
                .map(|cookie| (cookie.value().to_owned(), index))
        })
    }
}

fn derive_key(secret: &str) -> Result<Key, ConfigError> {
    // `Key::derive_from` panics below this length.
    if secret.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::Message(format!(
            "session secret must be at least {} characters",
            MIN_SESSION_SECRET_LENGTH
        )));
    }
    Ok(Key::derive_from(secret.as_bytes()))
}

/// Expose the verified session and rotate cookies signed with the old key.
pub async fn session_middleware(
    State(keys): State<SessionKeys>,
    mut request: Request,
    next: Next,
) -> Response {
    let verified = keys.verify(request.headers());
    request
        .extensions_mut()
        .insert(Session(verified.as_ref().map(|(value, _)| value.clone())));

    let response = next.run(request).await;

    match verified {
        Some((value, index)) if index > 0 => match keys.cookie(&value) {
            Some(cookie) => {
                tracing::debug!(target: "server", "Re-signing session cookie with current key");
                let jar = SignedCookieJar::new(keys.current().clone()).add(cookie);
                (jar, response).into_response()
            }
            None => response,
        },
        _ => response,
    }
}
