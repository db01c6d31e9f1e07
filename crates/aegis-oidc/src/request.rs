//! Authorization request types.

use serde::Deserialize;
use url::Url;

use aegis_model::Client;

use crate::error::OAuthError;

/// Raw query parameters of an `/oauth2/auth` call.
///
/// Everything the login & consent orchestration needs travels in the query
/// string: the OIDC parameters controlling re-authentication and the opaque
/// verifiers that mark a return from the login or consent UI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeQuery {
    /// OAuth 2.0 client identifier.
    #[serde(default)]
    pub client_id: String,

    /// Redirect URI requested by the client.
    #[serde(default)]
    pub redirect_uri: String,

    /// Space-delimited response types.
    #[serde(default)]
    pub response_type: String,

    /// Space-delimited requested scopes.
    #[serde(default)]
    pub scope: String,

    /// Opaque client state echoed back on redirects.
    #[serde(default)]
    pub state: String,

    /// OIDC nonce echoed into the ID token.
    #[serde(default)]
    pub nonce: String,

    /// Space-delimited prompt values: `none`, `login`, `consent`, ...
    #[serde(default)]
    pub prompt: String,

    /// Maximum allowed authentication age in seconds.
    #[serde(default)]
    pub max_age: String,

    /// Previously issued ID token identifying the expected subject.
    #[serde(default)]
    pub id_token_hint: String,

    /// Requested Authentication Context Class Reference values.
    #[serde(default)]
    pub acr_values: String,

    /// Requested display mode.
    #[serde(default)]
    pub display: String,

    /// Requested UI locales.
    #[serde(default)]
    pub ui_locales: String,

    /// Verifier handed back by the login UI. Empty outside of returns.
    #[serde(default)]
    pub login_verifier: String,

    /// Verifier handed back by the consent UI. Empty outside of returns.
    #[serde(default)]
    pub consent_verifier: String,
}

impl AuthorizeQuery {
    /// The prompt values as a list.
    #[must_use]
    pub fn prompt_values(&self) -> Vec<&str> {
        self.prompt.split_whitespace().collect()
    }

    /// Whether `prompt` contains the given value.
    #[must_use]
    pub fn has_prompt(&self, value: &str) -> bool {
        self.prompt_values().contains(&value)
    }

    /// Parses `max_age`, if present.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` if the value is not a non-negative integer.
    pub fn max_age(&self) -> Result<Option<i64>, OAuthError> {
        if self.max_age.is_empty() {
            return Ok(None);
        }
        self.max_age
            .parse::<i64>()
            .ok()
            .filter(|v| *v >= 0)
            .map(Some)
            .ok_or_else(|| {
                OAuthError::InvalidRequest("max_age must be a non-negative integer".to_string())
            })
    }

    /// The requested scopes as a list.
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(String::from).collect()
    }

    /// The response types as a list.
    #[must_use]
    pub fn response_types(&self) -> Vec<String> {
        self.response_type
            .split_whitespace()
            .map(String::from)
            .collect()
    }

    /// The requested ACR values as a list.
    #[must_use]
    pub fn acr_values_list(&self) -> Vec<String> {
        self.acr_values
            .split_whitespace()
            .map(String::from)
            .collect()
    }

    /// The requested UI locales as a list.
    #[must_use]
    pub fn ui_locales_list(&self) -> Vec<String> {
        self.ui_locales
            .split_whitespace()
            .map(String::from)
            .collect()
    }
}

/// A validated authorization request, as handed to the consent strategy.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    /// The requesting client.
    pub client: Client,

    /// The validated redirect URI.
    pub redirect_uri: Option<Url>,

    /// Requested response types.
    pub response_types: Vec<String>,

    /// Requested scopes.
    pub requested_scope: Vec<String>,

    /// Client state.
    pub state: Option<String>,

    /// OIDC nonce.
    pub nonce: Option<String>,

    /// The full original request URL, persisted with the flow records so the
    /// UIs can redirect back with all OIDC parameters intact.
    pub request_url: Url,
}

impl AuthorizeRequest {
    /// Whether the request uses exactly the authorization code response
    /// type. Other combinations force re-consent.
    #[must_use]
    pub fn is_code_flow_only(&self) -> bool {
        self.response_types == ["code".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_parsing() {
        let query = AuthorizeQuery {
            prompt: "login consent".to_string(),
            ..AuthorizeQuery::default()
        };
        assert!(query.has_prompt("login"));
        assert!(query.has_prompt("consent"));
        assert!(!query.has_prompt("none"));
    }

    #[test]
    fn max_age_parsing() {
        let mut query = AuthorizeQuery::default();
        assert_eq!(query.max_age().unwrap(), None);

        query.max_age = "300".to_string();
        assert_eq!(query.max_age().unwrap(), Some(300));

        query.max_age = "-1".to_string();
        assert!(query.max_age().is_err());

        query.max_age = "abc".to_string();
        assert!(query.max_age().is_err());
    }

    #[test]
    fn scope_splitting() {
        let query = AuthorizeQuery {
            scope: "openid offline scope-a".to_string(),
            ..AuthorizeQuery::default()
        };
        assert_eq!(query.scopes(), vec!["openid", "offline", "scope-a"]);
    }

    #[test]
    fn code_flow_detection() {
        let mut request = AuthorizeRequest {
            client: Client::default(),
            redirect_uri: None,
            response_types: vec!["code".to_string()],
            requested_scope: vec![],
            state: None,
            nonce: None,
            request_url: Url::parse("https://auth.example.org/oauth2/auth").unwrap(),
        };
        assert!(request.is_code_flow_only());

        request.response_types = vec!["code".to_string(), "id_token".to_string()];
        assert!(!request.is_code_flow_only());

        request.response_types = vec![];
        assert!(!request.is_code_flow_only());
    }
}
