//! OAuth 2.0 / OpenID Connect protocol errors.
//!
//! Error codes follow RFC 6749 and OpenID Connect Core 1.0. Provider
//! rejections recorded by the login/consent UIs are carried verbatim
//! through [`OAuthError::Denied`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use aegis_model::RequestDeniedError;

/// Protocol errors surfaced to OAuth 2.0 clients.
#[derive(Debug, Clone, Error)]
pub enum OAuthError {
    /// Malformed or invalid request parameters.
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// Client authentication failed.
    #[error("invalid_client: {0}")]
    InvalidClient(String),

    /// Invalid or expired grant (authorization code, refresh token).
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    /// The client may not use this grant type.
    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),

    /// Unsupported grant type.
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    /// Invalid or excessive scope.
    #[error("invalid_scope: {0}")]
    InvalidScope(String),

    /// Unsupported response type.
    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),

    /// The resource owner or the server denied the request.
    #[error("access_denied: {0}")]
    AccessDenied(String),

    /// The request was forbidden, e.g. on CSRF mismatch.
    #[error("request_forbidden: {0}")]
    RequestForbidden(String),

    /// End-user authentication is required but `prompt=none` was given, or
    /// identity checks failed.
    #[error("login_required: {0}")]
    LoginRequired(String),

    /// End-user consent is required but `prompt=none` was given.
    #[error("consent_required: {0}")]
    ConsentRequired(String),

    /// Interaction with the end user is required.
    #[error("interaction_required: {0}")]
    InteractionRequired(String),

    /// A login or consent provider rejected the request; propagated
    /// verbatim.
    #[error("{}: {}", .0.name, .0.description)]
    Denied(RequestDeniedError),

    /// Internal failure; details are logged, not exposed.
    #[error("server_error: {0}")]
    ServerError(String),
}

impl OAuthError {
    /// Returns the wire error code.
    #[must_use]
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidScope(_) => "invalid_scope",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::AccessDenied(_) => "access_denied",
            Self::RequestForbidden(_) => "request_forbidden",
            Self::LoginRequired(_) => "login_required",
            Self::ConsentRequired(_) => "consent_required",
            Self::InteractionRequired(_) => "interaction_required",
            Self::Denied(err) => &err.name,
            Self::ServerError(_) => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidGrant(_)
            | Self::InvalidScope(_)
            | Self::UnsupportedGrantType(_)
            | Self::UnsupportedResponseType(_)
            | Self::LoginRequired(_)
            | Self::ConsentRequired(_)
            | Self::InteractionRequired(_) => 400,
            Self::InvalidClient(_) => 401,
            Self::AccessDenied(_) | Self::RequestForbidden(_) | Self::UnauthorizedClient(_) => 403,
            Self::Denied(err) => {
                if err.code == 0 {
                    400
                } else {
                    err.code
                }
            }
            Self::ServerError(_) => 500,
        }
    }

    /// Builds the JSON error body.
    ///
    /// Debug details of provider rejections are only included when
    /// `share_debug` is set.
    #[must_use]
    pub fn to_body(&self, share_debug: bool) -> OAuthErrorBody {
        match self {
            Self::Denied(err) => OAuthErrorBody {
                error: err.name.clone(),
                error_description: err.description.clone(),
                error_hint: (!err.hint.is_empty()).then(|| err.hint.clone()),
                error_debug: (share_debug && !err.debug.is_empty()).then(|| err.debug.clone()),
                status_code: self.status_code(),
            },
            Self::ServerError(detail) => OAuthErrorBody {
                error: "server_error".to_string(),
                error_description: if share_debug {
                    detail.clone()
                } else {
                    "an internal error occurred".to_string()
                },
                error_hint: None,
                error_debug: None,
                status_code: 500,
            },
            other => OAuthErrorBody {
                error: other.error_code().to_string(),
                error_description: other.description(),
                error_hint: None,
                error_debug: None,
                status_code: other.status_code(),
            },
        }
    }

    /// Returns the human-readable description without the error code.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::InvalidRequest(d)
            | Self::InvalidClient(d)
            | Self::InvalidGrant(d)
            | Self::UnauthorizedClient(d)
            | Self::UnsupportedGrantType(d)
            | Self::InvalidScope(d)
            | Self::UnsupportedResponseType(d)
            | Self::AccessDenied(d)
            | Self::RequestForbidden(d)
            | Self::LoginRequired(d)
            | Self::ConsentRequired(d)
            | Self::InteractionRequired(d)
            | Self::ServerError(d) => d.clone(),
            Self::Denied(err) => err.description.clone(),
        }
    }
}

/// JSON error body: `{error, error_description, status_code}` plus optional
/// hint and debug fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthErrorBody {
    /// The wire error code.
    pub error: String,

    /// Human-readable description.
    pub error_description: String,

    /// Developer hint, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_hint: Option<String>,

    /// Debug details, only shared when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_debug: Option<String>,

    /// HTTP status code.
    pub status_code: u16,
}
