//! The authorization endpoint.
//!
//! `/oauth2/auth` validates the client and redirect URI, hands the request
//! to the consent strategy, and - once login and consent have been granted -
//! issues a single-use authorization code and redirects back to the client.
//!
//! Errors raised before the redirect URI is trusted are answered directly
//! as JSON; afterwards they are delivered to the client as OAuth redirect
//! errors.

use axum::extract::{Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use chrono::{Duration, Utc};
use tracing::debug;
use url::Url;

use aegis_consent::FlowError;
use aegis_crypto::token_secret;
use aegis_model::{AuthorizationCode, Client};
use aegis_oidc::{AuthorizeQuery, AuthorizeRequest, OAuthError};
use aegis_storage::{ClientStore, OAuth2Store};

use crate::state::OAuth2State;

/// GET `/oauth2/auth`
pub async fn authorize(
    State(state): State<OAuth2State>,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<AuthorizeQuery>,
    headers: HeaderMap,
) -> Response {
    let request = match build_request(&state, &query, raw_query.as_deref().unwrap_or_default()).await
    {
        Ok(request) => request,
        Err(err) => return plain_error(&state, &err),
    };

    if let Err(err) = validate_request(&request) {
        return redirect_error(&state, &request, &err);
    }

    match state
        .strategy
        .handle_authorization_request(&request, &query, &headers)
        .await
    {
        Ok(accepted) => finalize(&state, &request, &query, accepted).await,
        Err(FlowError::Abort(abort)) => abort.into_response(),
        Err(FlowError::OAuth(err)) => redirect_error(&state, &request, &err),
    }
}

async fn build_request(
    state: &OAuth2State,
    query: &AuthorizeQuery,
    raw_query: &str,
) -> Result<AuthorizeRequest, OAuthError> {
    if query.client_id.is_empty() {
        return Err(OAuthError::InvalidRequest("client_id is required".to_string()));
    }

    let client = state.clients.get_client(&query.client_id).await.map_err(|err| {
        if err.is_not_found() {
            OAuthError::InvalidClient(format!("unknown client '{}'", query.client_id))
        } else {
            OAuthError::ServerError(err.to_string())
        }
    })?;

    let redirect_uri = resolve_redirect_uri(&client, &query.redirect_uri)?;

    let mut request_url = state
        .issuer
        .join("oauth2/auth")
        .map_err(|e| OAuthError::ServerError(format!("invalid issuer URL: {e}")))?;
    request_url.set_query(Some(raw_query));

    Ok(AuthorizeRequest {
        client,
        redirect_uri: Some(redirect_uri),
        response_types: query.response_types(),
        requested_scope: query.scopes(),
        state: (!query.state.is_empty()).then(|| query.state.clone()),
        nonce: (!query.nonce.is_empty()).then(|| query.nonce.clone()),
        request_url,
    })
}

/// Picks and validates the redirect URI against the client registration.
fn resolve_redirect_uri(client: &Client, requested: &str) -> Result<Url, OAuthError> {
    let uri = if requested.is_empty() {
        if client.redirect_uris.len() == 1 {
            client.redirect_uris[0].clone()
        } else {
            return Err(OAuthError::InvalidRequest(
                "redirect_uri is required when the client registers more than one".to_string(),
            ));
        }
    } else {
        if !client.has_redirect_uri(requested) {
            return Err(OAuthError::InvalidRequest(
                "redirect_uri is not registered for this client".to_string(),
            ));
        }
        requested.to_string()
    };

    Url::parse(&uri)
        .map_err(|e| OAuthError::InvalidRequest(format!("redirect_uri is not a valid URL: {e}")))
}

/// Validation that runs once the redirect URI is trusted.
fn validate_request(request: &AuthorizeRequest) -> Result<(), OAuthError> {
    if request.response_types.is_empty() {
        return Err(OAuthError::InvalidRequest(
            "response_type is required".to_string(),
        ));
    }
    if !request.is_code_flow_only() {
        return Err(OAuthError::UnsupportedResponseType(format!(
            "only the authorization code flow is supported, got '{}'",
            request.response_types.join(" ")
        )));
    }
    if !request.client.allows_response_type("code") {
        return Err(OAuthError::UnauthorizedClient(
            "the client may not use the authorization code response type".to_string(),
        ));
    }
    if !request.client.allows_scopes(&request.requested_scope) {
        return Err(OAuthError::InvalidScope(
            "the client may not request one of the given scopes".to_string(),
        ));
    }
    Ok(())
}

async fn finalize(
    state: &OAuth2State,
    request: &AuthorizeRequest,
    query: &AuthorizeQuery,
    accepted: aegis_consent::AcceptedConsent,
) -> Response {
    let Some(redirect_uri) = request.redirect_uri.clone() else {
        return plain_error(
            state,
            &OAuthError::ServerError("missing redirect URI after consent".to_string()),
        );
    };

    let code = AuthorizationCode {
        code: token_secret(),
        client_id: request.client.id.clone(),
        subject: accepted.request.subject.clone(),
        redirect_uri: redirect_uri.to_string(),
        granted_scope: accepted.granted_scope.clone(),
        session: accepted.session.clone(),
        nonce: (!query.nonce.is_empty()).then(|| query.nonce.clone()),
        authenticated_at: accepted.authenticated_at,
        expires_at: Utc::now() + Duration::seconds(state.lifespans.auth_code),
    };

    if let Err(err) = state.store.create_authorization_code(&code).await {
        return redirect_error(state, request, &OAuthError::ServerError(err.to_string()));
    }

    debug!(client = %request.client.id, "authorization code issued");

    let mut location = redirect_uri;
    {
        let mut pairs = location.query_pairs_mut();
        pairs.append_pair("code", &code.code);
        if let Some(value) = &request.state {
            pairs.append_pair("state", value);
        }
        if !accepted.granted_scope.is_empty() {
            pairs.append_pair("scope", &accepted.granted_scope.join(" "));
        }
    }

    Redirect::to(location.as_str()).into_response()
}

/// Renders an error raised before a redirect URI can be trusted: the
/// configured error UI when present, a JSON body otherwise.
fn plain_error(state: &OAuth2State, err: &OAuthError) -> Response {
    let body = err.to_body(state.share_error_debug);

    if let Some(error_url) = &state.error_url {
        let mut location = error_url.clone();
        location
            .query_pairs_mut()
            .append_pair("error", &body.error)
            .append_pair("error_description", &body.error_description);
        return Redirect::to(location.as_str()).into_response();
    }

    let status =
        StatusCode::from_u16(body.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

/// Delivers an OAuth error to the client through its redirect URI.
fn redirect_error(state: &OAuth2State, request: &AuthorizeRequest, err: &OAuthError) -> Response {
    let Some(redirect_uri) = request.redirect_uri.clone() else {
        return plain_error(state, err);
    };

    let body = err.to_body(state.share_error_debug);
    let mut location = redirect_uri;
    {
        let mut pairs = location.query_pairs_mut();
        pairs.append_pair("error", &body.error);
        pairs.append_pair("error_description", &body.error_description);
        if let Some(value) = &request.state {
            pairs.append_pair("state", value);
        }
    }

    Redirect::to(location.as_str()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_uris(uris: &[&str]) -> Client {
        Client {
            id: "client-id".to_string(),
            redirect_uris: uris.iter().map(ToString::to_string).collect(),
            response_types: vec!["code".to_string()],
            scopes: vec!["openid".to_string(), "scope-a".to_string()],
            ..Client::default()
        }
    }

    #[test]
    fn redirect_uri_defaults_to_single_registration() {
        let client = client_with_uris(&["https://app.example.org/cb"]);
        let uri = resolve_redirect_uri(&client, "").unwrap();
        assert_eq!(uri.as_str(), "https://app.example.org/cb");
    }

    #[test]
    fn redirect_uri_must_be_registered() {
        let client = client_with_uris(&["https://app.example.org/cb"]);
        assert!(resolve_redirect_uri(&client, "https://evil.example.org/cb").is_err());
        assert!(resolve_redirect_uri(&client, "https://app.example.org/cb").is_ok());
    }

    #[test]
    fn ambiguous_redirect_uri_is_rejected() {
        let client = client_with_uris(&["https://a.example.org/cb", "https://b.example.org/cb"]);
        assert!(resolve_redirect_uri(&client, "").is_err());
    }

    fn request(response_types: &[&str], scopes: &[&str]) -> AuthorizeRequest {
        AuthorizeRequest {
            client: client_with_uris(&["https://app.example.org/cb"]),
            redirect_uri: None,
            response_types: response_types.iter().map(ToString::to_string).collect(),
            requested_scope: scopes.iter().map(ToString::to_string).collect(),
            state: None,
            nonce: None,
            request_url: Url::parse("https://auth.example.org/oauth2/auth").unwrap(),
        }
    }

    #[test]
    fn only_the_code_flow_validates() {
        assert!(validate_request(&request(&["code"], &["openid"])).is_ok());
        assert!(matches!(
            validate_request(&request(&["token"], &["openid"])),
            Err(OAuthError::UnsupportedResponseType(_))
        ));
        assert!(matches!(
            validate_request(&request(&["code", "id_token"], &["openid"])),
            Err(OAuthError::UnsupportedResponseType(_))
        ));
    }

    #[test]
    fn scopes_must_be_allowed_by_the_client() {
        assert!(matches!(
            validate_request(&request(&["code"], &["openid", "email"])),
            Err(OAuthError::InvalidScope(_))
        ));
    }
}
