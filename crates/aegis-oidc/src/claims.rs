//! Token claim types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims of an issued ID token.
///
/// Consent-session claims chosen by the consent UI are flattened into the
/// payload next to the standard claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer identifier.
    pub iss: String,

    /// Subject identifier.
    pub sub: String,

    /// Audience, the client id.
    pub aud: Vec<String>,

    /// Expiry (seconds since epoch).
    pub exp: i64,

    /// Issued-at (seconds since epoch).
    pub iat: i64,

    /// When the end user authenticated (seconds since epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    /// Nonce from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Authentication Context Class Reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,

    /// Additional claims from the consent session.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Claims of a self-encoded (JWT strategy) access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer identifier.
    pub iss: String,

    /// Subject; empty for client-credentials tokens.
    pub sub: String,

    /// The client the token was issued to.
    pub client_id: String,

    /// Granted scopes.
    pub scp: Vec<String>,

    /// Expiry (seconds since epoch).
    pub exp: i64,

    /// Issued-at (seconds since epoch).
    pub iat: i64,

    /// Token identifier.
    pub jti: String,

    /// Additional claims from the consent session.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_claims_flatten_into_payload() {
        let mut extra = Map::new();
        extra.insert("bar".to_string(), Value::String("baz".to_string()));

        let claims = IdTokenClaims {
            iss: "https://issuer".to_string(),
            sub: "user".to_string(),
            aud: vec!["client-id".to_string()],
            exp: 2_000_000_000,
            iat: 1_000_000_000,
            auth_time: None,
            nonce: None,
            acr: None,
            extra,
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["bar"], "baz");
        assert_eq!(json["sub"], "user");
        assert!(json.get("auth_time").is_none());
    }
}
