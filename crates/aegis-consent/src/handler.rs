//! Management HTTP API for login/consent UIs.
//!
//! The UIs fetch a pending request by challenge, then accept or reject it.
//! Both decisions return an absolute `redirect_to` URL pointing back at
//! `/oauth2/auth` with the single-shot verifier filled in; the original
//! query parameters survive the round trip because the redirect is built
//! from the stored `request_url`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

use aegis_model::{
    Client, ConsentSessionData, HandledConsentRequest, HandledLoginRequest,
    OpenIdConnectContext, PreviouslyGrantedConsent, RequestDeniedError, scope,
};
use aegis_storage::{ConsentStore, StorageError};

/// State for the consent management API.
#[derive(Clone)]
pub struct ConsentApiState {
    /// The backing consent store.
    pub store: Arc<dyn ConsentStore>,
}

/// Builds the consent management router.
pub fn consent_router(state: ConsentApiState) -> Router {
    Router::new()
        .route("/oauth2/auth/requests/login/{challenge}", get(get_login_request))
        .route(
            "/oauth2/auth/requests/login/{challenge}/accept",
            put(accept_login_request),
        )
        .route(
            "/oauth2/auth/requests/login/{challenge}/reject",
            put(reject_login_request),
        )
        .route(
            "/oauth2/auth/requests/consent/{challenge}",
            get(get_consent_request),
        )
        .route(
            "/oauth2/auth/requests/consent/{challenge}/accept",
            put(accept_consent_request),
        )
        .route(
            "/oauth2/auth/requests/consent/{challenge}/reject",
            put(reject_consent_request),
        )
        .route(
            "/oauth2/auth/sessions/consent/{subject}",
            get(list_granted_consents).delete(revoke_consent_sessions),
        )
        .route(
            "/oauth2/auth/sessions/consent/{subject}/{client}",
            delete(revoke_client_consent_sessions),
        )
        .route(
            "/oauth2/auth/sessions/login/{subject}",
            delete(revoke_login_sessions),
        )
        .with_state(state)
}

/// JSON error body shared by all management endpoints.
#[derive(Debug, Serialize, Deserialize)]
struct ApiError {
    error: String,
    error_description: String,
    status_code: u16,
}

impl ApiError {
    fn new(status: StatusCode, error: &str, description: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            error_description: description.into(),
            status_code: status.as_u16(),
        }
    }

    fn bad_request(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", description)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::NotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            StorageError::Duplicate { .. } => {
                Self::new(StatusCode::CONFLICT, "conflict", err.to_string())
            }
            StorageError::InvalidData(_) => Self::bad_request(err.to_string()),
            _ => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "the storage backend failed",
            ),
        }
    }
}

/// UI-facing view of a pending login request.
#[derive(Debug, Serialize)]
struct LoginRequestView {
    challenge: String,
    requested_scope: Vec<String>,
    skip: bool,
    subject: String,
    client: Client,
    request_url: String,
    oidc_context: OpenIdConnectContext,
}

/// UI-facing view of a pending consent request.
#[derive(Debug, Serialize)]
struct ConsentRequestView {
    challenge: String,
    requested_scope: Vec<String>,
    skip: bool,
    subject: String,
    client: Client,
    request_url: String,
    login_challenge: String,
    oidc_context: OpenIdConnectContext,
}

/// Body of a login accept call.
#[derive(Debug, Deserialize)]
struct AcceptLoginBody {
    subject: String,
    #[serde(default)]
    remember: bool,
    #[serde(default)]
    remember_for: i64,
    #[serde(default)]
    acr: String,
}

/// Body of a consent accept call.
#[derive(Debug, Deserialize)]
struct AcceptConsentBody {
    #[serde(default)]
    grant_scope: Vec<String>,
    #[serde(default)]
    remember: bool,
    #[serde(default)]
    remember_for: i64,
    #[serde(default)]
    session: ConsentSessionData,
}

/// Response of accept/reject calls.
#[derive(Debug, Serialize)]
struct CompletedRequest {
    redirect_to: String,
}

/// Rebuilds the original authorization URL with the verifier parameter
/// replaced.
fn redirect_to(request_url: &str, param: &str, verifier: &str) -> Result<String, ApiError> {
    let mut url = Url::parse(request_url).map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            format!("stored request URL is invalid: {e}"),
        )
    })?;

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        pairs.append_pair(param, verifier);
    }

    Ok(url.into())
}

async fn get_login_request(
    State(state): State<ConsentApiState>,
    Path(challenge): Path<String>,
) -> Result<Json<LoginRequestView>, ApiError> {
    let request = state.store.get_login_request(&challenge).await?;
    Ok(Json(LoginRequestView {
        challenge: request.challenge,
        requested_scope: request.requested_scope,
        skip: request.skip,
        subject: request.subject,
        client: request.client.sanitized(),
        request_url: request.request_url,
        oidc_context: request.oidc_context,
    }))
}

async fn accept_login_request(
    State(state): State<ConsentApiState>,
    Path(challenge): Path<String>,
    Json(body): Json<AcceptLoginBody>,
) -> Result<Json<CompletedRequest>, ApiError> {
    if body.subject.is_empty() {
        return Err(ApiError::bad_request("subject must not be empty"));
    }
    if body.remember_for < 0 {
        return Err(ApiError::bad_request("remember_for must not be negative"));
    }

    let handled = HandledLoginRequest {
        challenge: challenge.clone(),
        subject: body.subject,
        acr: body.acr,
        remember: body.remember,
        remember_for: body.remember_for,
        authenticated_at: Utc::now(),
        error: None,
        was_used: false,
        requested_at: Utc::now(),
    };

    let request = state.store.handle_login_request(&challenge, &handled).await?;
    Ok(Json(CompletedRequest {
        redirect_to: redirect_to(&request.request_url, "login_verifier", &request.verifier)?,
    }))
}

async fn reject_login_request(
    State(state): State<ConsentApiState>,
    Path(challenge): Path<String>,
    Json(error): Json<RequestDeniedError>,
) -> Result<Json<CompletedRequest>, ApiError> {
    let handled = HandledLoginRequest {
        challenge: challenge.clone(),
        subject: String::new(),
        acr: String::new(),
        remember: false,
        remember_for: 0,
        authenticated_at: Utc::now(),
        error: Some(error),
        was_used: false,
        requested_at: Utc::now(),
    };

    let request = state.store.handle_login_request(&challenge, &handled).await?;
    Ok(Json(CompletedRequest {
        redirect_to: redirect_to(&request.request_url, "login_verifier", &request.verifier)?,
    }))
}

async fn get_consent_request(
    State(state): State<ConsentApiState>,
    Path(challenge): Path<String>,
) -> Result<Json<ConsentRequestView>, ApiError> {
    let request = state.store.get_consent_request(&challenge).await?;
    Ok(Json(ConsentRequestView {
        challenge: request.challenge,
        requested_scope: request.requested_scope,
        skip: request.skip,
        subject: request.subject,
        client: request.client.sanitized(),
        request_url: request.request_url,
        login_challenge: request.login_challenge,
        oidc_context: request.oidc_context,
    }))
}

async fn accept_consent_request(
    State(state): State<ConsentApiState>,
    Path(challenge): Path<String>,
    Json(body): Json<AcceptConsentBody>,
) -> Result<Json<CompletedRequest>, ApiError> {
    if body.remember_for < 0 {
        return Err(ApiError::bad_request("remember_for must not be negative"));
    }

    let request = state.store.get_consent_request(&challenge).await?;
    if !scope::is_subset(&body.grant_scope, &request.requested_scope) {
        return Err(ApiError::bad_request(
            "granted scope must be a subset of the requested scope",
        ));
    }

    let handled = HandledConsentRequest {
        challenge: challenge.clone(),
        granted_scope: body.grant_scope,
        remember: body.remember,
        remember_for: body.remember_for,
        session: body.session,
        error: None,
        authenticated_at: Utc::now(),
        was_used: false,
        requested_at: Utc::now(),
    };

    let request = state
        .store
        .handle_consent_request(&challenge, &handled)
        .await?;
    Ok(Json(CompletedRequest {
        redirect_to: redirect_to(&request.request_url, "consent_verifier", &request.verifier)?,
    }))
}

async fn reject_consent_request(
    State(state): State<ConsentApiState>,
    Path(challenge): Path<String>,
    Json(error): Json<RequestDeniedError>,
) -> Result<Json<CompletedRequest>, ApiError> {
    let handled = HandledConsentRequest {
        challenge: challenge.clone(),
        granted_scope: Vec::new(),
        remember: false,
        remember_for: 0,
        session: ConsentSessionData::default(),
        error: Some(error),
        authenticated_at: Utc::now(),
        was_used: false,
        requested_at: Utc::now(),
    };

    let request = state
        .store
        .handle_consent_request(&challenge, &handled)
        .await?;
    Ok(Json(CompletedRequest {
        redirect_to: redirect_to(&request.request_url, "consent_verifier", &request.verifier)?,
    }))
}

async fn list_granted_consents(
    State(state): State<ConsentApiState>,
    Path(subject): Path<String>,
) -> Result<Json<Vec<PreviouslyGrantedConsent>>, ApiError> {
    Ok(Json(state.store.list_subject_granted_consents(&subject).await?))
}

async fn revoke_consent_sessions(
    State(state): State<ConsentApiState>,
    Path(subject): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.revoke_subject_consents(&subject).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn revoke_client_consent_sessions(
    State(state): State<ConsentApiState>,
    Path((subject, client)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .revoke_subject_client_consents(&subject, &client)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn revoke_login_sessions(
    State(state): State<ConsentApiState>,
    Path(subject): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .revoke_subject_authentication_sessions(&subject)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
