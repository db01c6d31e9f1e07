//! Login & consent flow records.
//!
//! A flow consists of paired records: an immutable request created when the
//! strategy first sees an authorization attempt, and a handled outcome
//! written when the external UI accepts or rejects it. Handled records are
//! consumed exactly once through the store's verify-and-invalidate
//! operations.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::Client;

/// OpenID Connect context captured from the authorization request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdConnectContext {
    /// Requested Authentication Context Class Reference values.
    #[serde(default)]
    pub acr_values: Vec<String>,

    /// Requested display mode (`page`, `popup`, ...).
    #[serde(default)]
    pub display: String,

    /// Requested UI locales.
    #[serde(default)]
    pub ui_locales: Vec<String>,

    /// Claims decoded from `id_token_hint`, if one was supplied.
    #[serde(default)]
    pub id_token_hint_claims: Map<String, Value>,
}

/// A provider-surfaced rejection, stored verbatim in the handled record and
/// propagated to the OAuth client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDeniedError {
    /// OAuth 2.0 error code (e.g. `access_denied`).
    #[serde(rename = "error")]
    pub name: String,

    /// Human-readable description.
    #[serde(default, rename = "error_description")]
    pub description: String,

    /// Hint shown to developers.
    #[serde(default, rename = "error_hint")]
    pub hint: String,

    /// Debug details, only exposed when error debugging is enabled.
    #[serde(default, rename = "error_debug")]
    pub debug: String,

    /// HTTP status code the provider chose for this rejection.
    #[serde(default = "default_denied_code", rename = "status_code")]
    pub code: u16,
}

const fn default_denied_code() -> u16 {
    400
}

/// A pending login (authentication) request.
///
/// Immutable once created; `challenge` is visible to the login UI, while
/// `verifier` only ever travels server-to-server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Opaque, UI-visible identifier. Primary key.
    pub challenge: String,

    /// Opaque single-shot secret exchanged for the handled record.
    pub verifier: String,

    /// CSRF value bound to the browser through a signed cookie.
    pub csrf: String,

    /// The client that initiated the authorization request.
    pub client: Client,

    /// The full original authorization URL.
    pub request_url: String,

    /// Scopes requested by the client.
    pub requested_scope: Vec<String>,

    /// Subject resolved from the session cookie; empty if unauthenticated.
    pub subject: String,

    /// Whether the server already believes the subject is authenticated.
    pub skip: bool,

    /// OpenID Connect request context.
    pub oidc_context: OpenIdConnectContext,

    /// When the request was created.
    pub requested_at: DateTime<Utc>,
}

/// The login UI's decision for a [`LoginRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandledLoginRequest {
    /// Challenge of the request this outcome belongs to.
    pub challenge: String,

    /// The authenticated subject. Empty on rejection.
    pub subject: String,

    /// Authentication Context Class Reference asserted by the UI.
    #[serde(default)]
    pub acr: String,

    /// Whether to remember this authentication in a browser session.
    pub remember: bool,

    /// Lifetime of the remembered session in seconds; 0 means indefinite.
    pub remember_for: i64,

    /// When the subject authenticated.
    pub authenticated_at: DateTime<Utc>,

    /// Rejection details; present iff the UI rejected the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RequestDeniedError>,

    /// Set once the verifier has been exchanged. One-shot.
    #[serde(default)]
    pub was_used: bool,

    /// When the outcome was recorded.
    pub requested_at: DateTime<Utc>,
}

/// A pending consent (authorization) request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRequest {
    /// Opaque, UI-visible identifier. Primary key.
    pub challenge: String,

    /// Opaque single-shot secret exchanged for the handled record.
    pub verifier: String,

    /// CSRF value bound to the browser through a signed cookie.
    pub csrf: String,

    /// The client requesting authorization.
    pub client: Client,

    /// The full original authorization URL.
    pub request_url: String,

    /// Scopes requested by the client.
    pub requested_scope: Vec<String>,

    /// The subject established by the preceding login step.
    pub subject: String,

    /// Whether consent was previously granted and the UI need only confirm.
    pub skip: bool,

    /// Challenge of the login request this consent step belongs to.
    pub login_challenge: String,

    /// OpenID Connect request context.
    pub oidc_context: OpenIdConnectContext,

    /// When the request was created.
    pub requested_at: DateTime<Utc>,
}

/// Opaque token payloads chosen by the consent UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentSessionData {
    /// Claims to embed in the access token.
    #[serde(default)]
    pub access_token: Map<String, Value>,

    /// Claims to embed in the ID token.
    #[serde(default)]
    pub id_token: Map<String, Value>,
}

/// The consent UI's decision for a [`ConsentRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandledConsentRequest {
    /// Challenge of the request this outcome belongs to.
    pub challenge: String,

    /// Scopes the subject granted; a subset of the requested scopes.
    pub granted_scope: Vec<String>,

    /// Whether to remember the grant for future skip decisions.
    pub remember: bool,

    /// Lifetime of the remembered grant in seconds; 0 means indefinite.
    pub remember_for: i64,

    /// Token payloads to hand to the OAuth framework.
    #[serde(default)]
    pub session: ConsentSessionData,

    /// Rejection details; present iff the UI rejected the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RequestDeniedError>,

    /// When the subject authenticated in the preceding login step.
    pub authenticated_at: DateTime<Utc>,

    /// Set once the verifier has been exchanged. One-shot.
    #[serde(default)]
    pub was_used: bool,

    /// When the outcome was recorded.
    pub requested_at: DateTime<Utc>,
}

/// A remembered consent grant, used to decide whether the consent UI can be
/// skipped for a returning `(client, subject)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviouslyGrantedConsent {
    /// Client the grant was issued to.
    pub client_id: String,

    /// Subject who granted it.
    pub subject: String,

    /// Scopes covered by the grant.
    pub granted_scope: Vec<String>,

    /// Grant lifetime in seconds; 0 means until explicitly revoked.
    pub remember_for: i64,

    /// When the grant was recorded.
    pub granted_at: DateTime<Utc>,
}

impl PreviouslyGrantedConsent {
    /// Whether the grant is still valid at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.remember_for == 0 || self.granted_at + Duration::seconds(self.remember_for) > now
    }
}
