//! OpenID Connect discovery.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::OAuth2State;

/// The discovery document served at `/.well-known/openid-configuration`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WellKnownConfiguration {
    /// Issuer identifier.
    pub issuer: String,

    /// Authorization endpoint.
    pub authorization_endpoint: String,

    /// Token endpoint.
    pub token_endpoint: String,

    /// JWKS endpoint.
    pub jwks_uri: String,

    /// Userinfo endpoint.
    pub userinfo_endpoint: String,

    /// Revocation endpoint.
    pub revocation_endpoint: String,

    /// Supported subject types.
    pub subject_types_supported: Vec<String>,

    /// Supported response types.
    pub response_types_supported: Vec<String>,

    /// Supported grant types.
    pub grant_types_supported: Vec<String>,

    /// Supported ID-token signing algorithms.
    pub id_token_signing_alg_values_supported: Vec<String>,

    /// Supported client authentication methods at the token endpoint.
    pub token_endpoint_auth_methods_supported: Vec<String>,

    /// Claims the userinfo endpoint may return.
    pub claims_supported: Vec<String>,
}

/// GET `/.well-known/openid-configuration`
pub async fn openid_configuration(State(state): State<OAuth2State>) -> Json<WellKnownConfiguration> {
    let join = |path: &str| {
        state
            .issuer
            .join(path)
            .map(String::from)
            .unwrap_or_else(|_| format!("{}{path}", state.issuer))
    };

    Json(WellKnownConfiguration {
        issuer: state.issuer.to_string(),
        authorization_endpoint: join("oauth2/auth"),
        token_endpoint: join("oauth2/token"),
        jwks_uri: join(".well-known/jwks.json"),
        userinfo_endpoint: join("userinfo"),
        revocation_endpoint: join("oauth2/revoke"),
        subject_types_supported: vec!["public".to_string()],
        response_types_supported: vec!["code".to_string()],
        grant_types_supported: vec![
            "authorization_code".to_string(),
            "refresh_token".to_string(),
            "client_credentials".to_string(),
        ],
        id_token_signing_alg_values_supported: vec!["RS256".to_string()],
        token_endpoint_auth_methods_supported: vec![
            "client_secret_basic".to_string(),
            "client_secret_post".to_string(),
        ],
        claims_supported: vec!["sub".to_string()],
    })
}
