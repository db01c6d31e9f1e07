//! Shared state of the public OAuth 2.0 endpoints.

use std::str::FromStr;
use std::sync::Arc;

use url::Url;

use aegis_consent::ConsentStrategy;
use aegis_oidc::IdTokenSigner;
use aegis_storage::{ClientStore, OAuth2Store};

/// Format of issued access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessTokenStrategy {
    /// Opaque random strings, introspected against the store.
    #[default]
    Opaque,
    /// Self-encoded JWTs signed with the ID-token key.
    Jwt,
}

impl FromStr for AccessTokenStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opaque" => Ok(Self::Opaque),
            "jwt" => Ok(Self::Jwt),
            other => Err(format!(
                "unknown access token strategy '{other}', expected 'opaque' or 'jwt'"
            )),
        }
    }
}

/// Token and code lifetimes in seconds.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifespans {
    /// Access token lifetime.
    pub access_token: i64,
    /// ID token lifetime.
    pub id_token: i64,
    /// Authorization code lifetime.
    pub auth_code: i64,
    /// Refresh token lifetime.
    pub refresh_token: i64,
}

impl Default for TokenLifespans {
    fn default() -> Self {
        Self {
            access_token: 3600,
            id_token: 3600,
            auth_code: 600,
            refresh_token: 30 * 24 * 3600,
        }
    }
}

/// State shared by the public endpoints.
#[derive(Clone)]
pub struct OAuth2State {
    /// Client registrations.
    pub clients: Arc<dyn ClientStore>,

    /// Codes and opaque tokens.
    pub store: Arc<dyn OAuth2Store>,

    /// The login & consent strategy.
    pub strategy: Arc<ConsentStrategy>,

    /// ID-token signer.
    pub signer: Arc<IdTokenSigner>,

    /// OIDC issuer identifier.
    pub issuer: Url,

    /// External error UI; errors that cannot be redirected to the client
    /// land here instead of a bare JSON response.
    pub error_url: Option<Url>,

    /// Whether to expose debug details in error responses.
    pub share_error_debug: bool,

    /// Access token format.
    pub access_token_strategy: AccessTokenStrategy,

    /// Token lifetimes.
    pub lifespans: TokenLifespans,
}
