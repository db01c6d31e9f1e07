//! Token introspection, revocation and userinfo.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use aegis_model::TokenKind;
use aegis_oidc::claims::AccessTokenClaims;
use aegis_oidc::OAuthError;
use aegis_storage::OAuth2Store;

use crate::state::OAuth2State;
use crate::token::{authenticate_client, extract_client_credentials, TokenRequestBody};

/// Form body of introspection and revocation calls.
#[derive(Debug, Deserialize)]
pub struct TokenBody {
    /// The token under inspection.
    #[serde(default)]
    pub token: String,

    /// Optional hint, accepted but not required.
    #[serde(default)]
    pub token_type_hint: String,

    /// Client id, when not using HTTP basic authentication.
    #[serde(default)]
    pub client_id: String,

    /// Client secret, when not using HTTP basic authentication.
    #[serde(default)]
    pub client_secret: String,
}

impl TokenBody {
    fn as_client_form(&self) -> TokenRequestBody {
        TokenRequestBody {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            ..TokenRequestBody::default()
        }
    }
}

/// Introspection response per RFC 7662.
#[derive(Debug, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is active.
    pub active: bool,

    /// Subject of the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Client the token was issued to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Space-delimited scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Expiry (seconds since epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued-at (seconds since epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Token type, `access_token` or `refresh_token`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl IntrospectionResponse {
    fn inactive() -> Self {
        Self {
            active: false,
            sub: None,
            client_id: None,
            scope: None,
            exp: None,
            iat: None,
            token_type: None,
        }
    }
}

fn oauth_error_response(state: &OAuth2State, err: &OAuthError) -> Response {
    let body = err.to_body(state.share_error_debug);
    let status =
        StatusCode::from_u16(body.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

/// POST `/oauth2/introspect`
pub async fn introspect(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(body): Form<TokenBody>,
) -> Response {
    let client_form = body.as_client_form();
    let credentials = match extract_client_credentials(&headers, &client_form) {
        Ok(credentials) => credentials,
        Err(err) => return oauth_error_response(&state, &err),
    };
    if let Err(err) = authenticate_client(&state, &credentials.0, credentials.1.as_deref()).await {
        return oauth_error_response(&state, &err);
    }

    Json(introspect_token(&state, &body.token).await).into_response()
}

async fn introspect_token(state: &OAuth2State, token: &str) -> IntrospectionResponse {
    if token.is_empty() {
        return IntrospectionResponse::inactive();
    }

    // Opaque tokens live in the store; JWT access tokens verify against the
    // signing key. Trying both keeps introspection correct across strategy
    // changes.
    if let Ok(stored) = state.store.get_token(token).await {
        if !stored.is_active_at(Utc::now()) {
            return IntrospectionResponse::inactive();
        }
        return IntrospectionResponse {
            active: true,
            sub: Some(stored.subject.clone()),
            client_id: Some(stored.client_id.clone()),
            scope: Some(stored.granted_scope.join(" ")),
            exp: Some(stored.expires_at.timestamp()),
            iat: Some(stored.issued_at.timestamp()),
            token_type: Some(
                match stored.kind {
                    TokenKind::Access => "access_token",
                    TokenKind::Refresh => "refresh_token",
                }
                .to_string(),
            ),
        };
    }

    match state.signer.verify::<AccessTokenClaims>(token) {
        Ok(claims) => IntrospectionResponse {
            active: true,
            sub: Some(claims.sub),
            client_id: Some(claims.client_id),
            scope: Some(claims.scp.join(" ")),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            token_type: Some("access_token".to_string()),
        },
        Err(_) => IntrospectionResponse::inactive(),
    }
}

/// POST `/oauth2/revoke`
pub async fn revoke(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(body): Form<TokenBody>,
) -> Response {
    let client_form = body.as_client_form();
    let credentials = match extract_client_credentials(&headers, &client_form) {
        Ok(credentials) => credentials,
        Err(err) => return oauth_error_response(&state, &err),
    };
    if let Err(err) = authenticate_client(&state, &credentials.0, credentials.1.as_deref()).await {
        return oauth_error_response(&state, &err);
    }

    // RFC 7009: revoking an unknown token still answers 200.
    if state.store.revoke_token(&body.token).await.is_err() {
        return oauth_error_response(
            &state,
            &OAuthError::ServerError("revocation failed".to_string()),
        );
    }
    StatusCode::OK.into_response()
}

/// GET/POST `/userinfo`
pub async fn userinfo(State(state): State<OAuth2State>, headers: HeaderMap) -> Response {
    let token = match bearer_token(&headers) {
        Some(token) => token,
        None => {
            return oauth_error_response(
                &state,
                &OAuthError::InvalidRequest("missing bearer token".to_string()),
            )
        }
    };

    if let Ok(stored) = state.store.get_token(&token).await {
        if stored.kind != TokenKind::Access || !stored.is_active_at(Utc::now()) {
            return unauthorized(&state);
        }
        let mut claims = stored.session.id_token.clone();
        claims.insert("sub".to_string(), Value::String(stored.subject.clone()));
        return Json(claims).into_response();
    }

    match state.signer.verify::<AccessTokenClaims>(&token) {
        Ok(verified) => {
            let mut claims: Map<String, Value> = Map::new();
            claims.insert("sub".to_string(), Value::String(verified.sub));
            Json(claims).into_response()
        }
        Err(_) => unauthorized(&state),
    }
}

fn unauthorized(state: &OAuth2State) -> Response {
    let body =
        OAuthError::InvalidClient("the access token is invalid or expired".to_string())
            .to_body(state.share_error_debug);
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(ToString::to_string)
}
