//! Flow errors.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use url::Url;

use aegis_oidc::OAuthError;
use aegis_storage::StorageError;

/// A prepared browser redirect that aborts the surrounding authorization
/// handler.
///
/// When the strategy needs the browser to visit the login or consent UI it
/// returns this through [`FlowError::Abort`]; the handler converts it into a
/// `303 See Other` carrying the prepared cookies and must not emit a body of
/// its own.
#[derive(Debug)]
pub struct AbortRedirect {
    /// Where to send the browser.
    pub location: Url,

    /// `Set-Cookie` header values to attach to the redirect.
    pub set_cookies: Vec<String>,
}

impl AbortRedirect {
    /// Renders the redirect response.
    #[must_use]
    pub fn into_response(self) -> Response {
        let mut builder = Response::builder()
            .status(StatusCode::SEE_OTHER)
            .header(header::LOCATION, self.location.as_str());

        for cookie in &self.set_cookies {
            builder = builder.header(header::SET_COOKIE, cookie);
        }

        builder
            .body(axum::body::Body::empty())
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

/// Errors returned by the consent strategy.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The flow continues in the browser; a redirect has been prepared.
    #[error("authorization request aborted for a browser redirect")]
    Abort(AbortRedirect),

    /// The flow terminates with an OAuth error.
    #[error(transparent)]
    OAuth(#[from] OAuthError),
}

impl FlowError {
    /// Converts a storage failure: unknown verifiers and records become
    /// `access_denied`, everything else is a server error referenced by a
    /// correlation id in the logs.
    #[must_use]
    pub fn from_storage(err: StorageError, denied_hint: &str) -> Self {
        if err.is_not_found() {
            Self::OAuth(OAuthError::AccessDenied(denied_hint.to_string()))
        } else {
            let correlation_id = aegis_crypto::random_alphanumeric(12);
            tracing::error!(
                error = %err,
                correlation_id,
                "storage failure during authorization flow"
            );
            Self::OAuth(OAuthError::ServerError(format!(
                "storage failure, correlation id {correlation_id}"
            )))
        }
    }
}
