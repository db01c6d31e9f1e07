//! Authentication session model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A long-lived authentication session bound to a browser cookie.
///
/// Written when a login is accepted with `remember = true`. The store row is
/// authoritative: revoking it (by id or by subject) invalidates the cookie
/// even though the cookie itself still decrypts. A subject may hold several
/// active sessions from different browsers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationSession {
    /// Opaque session identifier.
    pub id: String,

    /// The authenticated subject.
    pub subject: String,

    /// When the subject last authenticated.
    pub authenticated_at: DateTime<Utc>,
}

impl AuthenticationSession {
    /// Whether the authentication is older than `max_age` seconds at `now`.
    #[must_use]
    pub fn is_older_than(&self, max_age: i64, now: DateTime<Utc>) -> bool {
        now - self.authenticated_at > Duration::seconds(max_age)
    }
}
