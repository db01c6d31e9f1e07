//! OAuth 2.0 code and token records.
//!
//! These back the embedded token endpoint: authorization codes are
//! single-use and short-lived, opaque tokens are looked up by signature for
//! introspection and revocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flow::ConsentSessionData;

/// A single-use authorization code issued after a granted consent flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The opaque code value.
    pub code: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// The authenticated subject.
    pub subject: String,

    /// Redirect URI used in the authorization request; must match on exchange.
    pub redirect_uri: String,

    /// Scopes granted by the consent step.
    pub granted_scope: Vec<String>,

    /// Token payloads chosen by the consent UI.
    #[serde(default)]
    pub session: ConsentSessionData,

    /// Nonce from the authorization request, echoed into the ID token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// When the subject authenticated.
    pub authenticated_at: DateTime<Utc>,

    /// Expiry; exchanges after this instant fail.
    pub expires_at: DateTime<Utc>,
}

/// Kind of an opaque token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// An access token.
    Access,
    /// A refresh token.
    Refresh,
}

impl TokenKind {
    /// Returns the wire name of this token kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// An opaque token stored for introspection and revocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Token {
    /// The opaque token value.
    pub signature: String,

    /// Access or refresh.
    pub kind: TokenKind,

    /// Client the token was issued to.
    pub client_id: String,

    /// The subject, empty for client-credentials tokens.
    pub subject: String,

    /// Scopes attached to the token.
    pub granted_scope: Vec<String>,

    /// Token payloads from the consent session.
    #[serde(default)]
    pub session: ConsentSessionData,

    /// When the token was issued.
    pub issued_at: DateTime<Utc>,

    /// Expiry instant.
    pub expires_at: DateTime<Utc>,

    /// Cleared on revocation.
    pub active: bool,
}

impl OAuth2Token {
    /// Whether the token is active and unexpired at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at > now
    }
}
