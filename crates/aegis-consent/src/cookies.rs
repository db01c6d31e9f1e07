//! Cookie handling for the consent flow.
//!
//! Two kinds of cookies bind the browser to the server-side flow state:
//!
//! - Per-flow CSRF cookies (`login_csrf`, `consent_csrf`), signed. Their
//!   value must equal the `csrf` stored in the request record when the
//!   browser returns from a UI.
//! - The authentication session cookie (`oauth2_authentication_session`),
//!   encrypted. It carries the session id, subject and authentication time;
//!   the store row it points at stays authoritative.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use cookie::time::Duration as CookieDuration;
use cookie::{Cookie, CookieJar, Key, SameSite};
use serde::{Deserialize, Serialize};

/// Name of the encrypted authentication session cookie.
pub const SESSION_COOKIE_NAME: &str = "oauth2_authentication_session";

/// Name of the signed CSRF cookie for the login flow.
pub const LOGIN_CSRF_COOKIE: &str = "login_csrf";

/// Name of the signed CSRF cookie for the consent flow.
pub const CONSENT_CSRF_COOKIE: &str = "consent_csrf";

/// Payload of the encrypted session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCookie {
    /// Id of the backing [`aegis_model::AuthenticationSession`] row.
    pub id: String,

    /// The authenticated subject.
    pub subject: String,

    /// When the subject authenticated.
    pub authenticated_at: DateTime<Utc>,
}

/// The request's cookie jar with the derived signing/encryption keys.
pub struct CookieJars {
    jar: CookieJar,
    csrf_key: Key,
    session_key: Key,
}

impl CookieJars {
    /// Builds the jar from request headers and the derived cookie keys.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, csrf_key: &[u8; 64], session_key: &[u8; 64]) -> Self {
        let mut jar = CookieJar::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            for cookie in Cookie::split_parse_encoded(raw.to_owned()).flatten() {
                jar.add_original(cookie.into_owned());
            }
        }

        Self {
            jar,
            csrf_key: Key::from(csrf_key),
            session_key: Key::from(session_key),
        }
    }

    /// Reads and verifies a signed CSRF cookie.
    #[must_use]
    pub fn csrf_value(&self, name: &str) -> Option<String> {
        self.jar
            .signed(&self.csrf_key)
            .get(name)
            .map(|c| c.value().to_string())
    }

    /// Writes a signed CSRF cookie.
    pub fn set_csrf(&mut self, name: &'static str, value: &str) {
        let cookie = Cookie::build((name, value.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        self.jar.signed_mut(&self.csrf_key).add(cookie);
    }

    /// Reads and decrypts the session cookie. Undecryptable or malformed
    /// cookies count as absent.
    #[must_use]
    pub fn session(&self) -> Option<SessionCookie> {
        let cookie = self.jar.private(&self.session_key).get(SESSION_COOKIE_NAME)?;
        serde_json::from_str(cookie.value()).ok()
    }

    /// Writes the encrypted session cookie. A `max_age` of `None` yields a
    /// browser-session cookie (remembered until explicitly revoked).
    pub fn set_session(&mut self, session: &SessionCookie, max_age: Option<i64>) {
        let Ok(payload) = serde_json::to_string(session) else {
            return;
        };

        let mut builder = Cookie::build((SESSION_COOKIE_NAME, payload))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        if let Some(seconds) = max_age {
            builder = builder.max_age(CookieDuration::seconds(seconds));
        }

        self.jar.private_mut(&self.session_key).add(builder.build());
    }

    /// Removes the session cookie from the browser.
    pub fn clear_session(&mut self) {
        self.jar
            .private_mut(&self.session_key)
            .remove(Cookie::build((SESSION_COOKIE_NAME, "")).path("/").build());
    }

    /// Returns the `Set-Cookie` values accumulated by this jar.
    #[must_use]
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.jar
            .delta()
            .map(|c| c.encoded().to_string())
            .collect()
    }
}
