//! OAuth 2.0 client model.

use serde::{Deserialize, Serialize};

/// An OAuth 2.0 client registration.
///
/// The login & consent core only reads clients; creation and mutation happen
/// through the management API, which stores the secret as an argon2 hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier.
    #[serde(rename = "client_id")]
    pub id: String,

    /// Human-readable client name.
    #[serde(default, rename = "client_name")]
    pub name: String,

    /// Hashed client secret. Never exposed through the API.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,

    /// Allowed redirect URIs (exact match).
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Allowed grant types.
    #[serde(default)]
    pub grant_types: Vec<String>,

    /// Allowed response types.
    #[serde(default)]
    pub response_types: Vec<String>,

    /// Scopes the client may request.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Whether this is a public client (no secret, e.g. SPA or mobile app).
    #[serde(default)]
    pub public: bool,
}

impl Client {
    /// Returns a copy with the secret hash removed, safe to hand to UIs.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            secret: None,
            ..self.clone()
        }
    }

    /// Checks whether `uri` is registered for this client (exact match).
    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// Checks whether the client may request every scope in `requested`.
    #[must_use]
    pub fn allows_scopes(&self, requested: &[String]) -> bool {
        crate::scope::is_subset(requested, &self.scopes)
    }

    /// Checks whether the client may use the given grant type.
    #[must_use]
    pub fn allows_grant_type(&self, grant_type: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant_type)
    }

    /// Checks whether the client may use the given response type.
    #[must_use]
    pub fn allows_response_type(&self, response_type: &str) -> bool {
        self.response_types.iter().any(|r| r == response_type)
    }
}
