//! The token endpoint.
//!
//! Supports the `authorization_code`, `refresh_token` and
//! `client_credentials` grants. Access tokens are opaque (introspected
//! against the store) or self-encoded JWTs depending on the configured
//! strategy; refresh tokens are always opaque; ID tokens are issued when the
//! granted scope contains `openid`.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use aegis_crypto::token_secret;
use aegis_model::{Client, ConsentSessionData, OAuth2Token, TokenKind};
use aegis_oidc::claims::AccessTokenClaims;
use aegis_oidc::{IdTokenClaims, OAuthError};
use aegis_storage::{ClientStore, OAuth2Store};

use crate::state::{AccessTokenStrategy, OAuth2State};

/// Form body of a token request.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequestBody {
    /// The grant type.
    #[serde(default)]
    pub grant_type: String,

    /// Authorization code (`authorization_code` grant).
    #[serde(default)]
    pub code: String,

    /// Redirect URI used in the authorization request.
    #[serde(default)]
    pub redirect_uri: String,

    /// Refresh token (`refresh_token` grant).
    #[serde(default)]
    pub refresh_token: String,

    /// Requested scopes (`client_credentials` grant).
    #[serde(default)]
    pub scope: String,

    /// Client id, when not using HTTP basic authentication.
    #[serde(default)]
    pub client_id: String,

    /// Client secret, when not using HTTP basic authentication.
    #[serde(default)]
    pub client_secret: String,
}

/// A successful token response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// Always `bearer`.
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: i64,

    /// Refresh token, when the `offline` scope was granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token, when the `openid` scope was granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Granted scopes.
    pub scope: String,
}

/// POST `/oauth2/token`
pub async fn token(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(body): Form<TokenRequestBody>,
) -> Response {
    match handle_token_request(&state, &headers, &body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => {
            let body = err.to_body(state.share_error_debug);
            let status = StatusCode::from_u16(body.status_code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(body)).into_response()
        }
    }
}

async fn handle_token_request(
    state: &OAuth2State,
    headers: &HeaderMap,
    body: &TokenRequestBody,
) -> Result<TokenResponse, OAuthError> {
    let (client_id, client_secret) = extract_client_credentials(headers, body)?;
    let client = authenticate_client(state, &client_id, client_secret.as_deref()).await?;

    match body.grant_type.as_str() {
        "authorization_code" => authorization_code_grant(state, &client, body).await,
        "refresh_token" => refresh_token_grant(state, &client, body).await,
        "client_credentials" => client_credentials_grant(state, &client, body).await,
        other => Err(OAuthError::UnsupportedGrantType(format!(
            "grant type '{other}' is not supported"
        ))),
    }
}

/// Pulls client credentials from HTTP basic auth or the form body.
pub(crate) fn extract_client_credentials(
    headers: &HeaderMap,
    body: &TokenRequestBody,
) -> Result<(String, Option<String>), OAuthError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| OAuthError::InvalidClient("malformed authorization header".to_string()))?;

        if let Some(encoded) = value.strip_prefix("Basic ") {
            let decoded = STANDARD.decode(encoded).map_err(|_| {
                OAuthError::InvalidClient("malformed basic authorization header".to_string())
            })?;
            let decoded = String::from_utf8(decoded).map_err(|_| {
                OAuthError::InvalidClient("malformed basic authorization header".to_string())
            })?;

            let (id, secret) = decoded.split_once(':').ok_or_else(|| {
                OAuthError::InvalidClient("malformed basic authorization header".to_string())
            })?;
            return Ok((id.to_string(), Some(secret.to_string())));
        }
    }

    if body.client_id.is_empty() {
        return Err(OAuthError::InvalidClient(
            "client authentication is required".to_string(),
        ));
    }

    let secret = (!body.client_secret.is_empty()).then(|| body.client_secret.clone());
    Ok((body.client_id.clone(), secret))
}

pub(crate) async fn authenticate_client(
    state: &OAuth2State,
    client_id: &str,
    client_secret: Option<&str>,
) -> Result<Client, OAuthError> {
    let client = state.clients.get_client(client_id).await.map_err(|err| {
        if err.is_not_found() {
            OAuthError::InvalidClient(format!("unknown client '{client_id}'"))
        } else {
            OAuthError::ServerError(err.to_string())
        }
    })?;

    if client.public {
        return Ok(client);
    }

    let (Some(secret), Some(hash)) = (client_secret, client.secret.as_deref()) else {
        return Err(OAuthError::InvalidClient(
            "client authentication failed".to_string(),
        ));
    };
    if !crate::secret::verify_secret(hash, secret) {
        return Err(OAuthError::InvalidClient(
            "client authentication failed".to_string(),
        ));
    }

    Ok(client)
}

async fn authorization_code_grant(
    state: &OAuth2State,
    client: &Client,
    body: &TokenRequestBody,
) -> Result<TokenResponse, OAuthError> {
    if !client.allows_grant_type("authorization_code") {
        return Err(OAuthError::UnauthorizedClient(
            "the client may not use the authorization_code grant".to_string(),
        ));
    }
    if body.code.is_empty() {
        return Err(OAuthError::InvalidRequest("code is required".to_string()));
    }

    let code = state
        .store
        .consume_authorization_code(&body.code)
        .await
        .map_err(|err| {
            if err.is_not_found() {
                OAuthError::InvalidGrant(
                    "the authorization code is invalid, expired or already used".to_string(),
                )
            } else {
                OAuthError::ServerError(err.to_string())
            }
        })?;

    if code.client_id != client.id {
        return Err(OAuthError::InvalidGrant(
            "the authorization code was issued to another client".to_string(),
        ));
    }
    if body.redirect_uri != code.redirect_uri {
        return Err(OAuthError::InvalidGrant(
            "redirect_uri does not match the authorization request".to_string(),
        ));
    }

    debug!(client = %client.id, "exchanging authorization code");

    let access_token = issue_access_token(
        state,
        client,
        &code.subject,
        &code.granted_scope,
        &code.session,
    )
    .await?;

    let refresh_token = if code.granted_scope.iter().any(|s| s == "offline") {
        Some(
            issue_opaque_token(
                state,
                TokenKind::Refresh,
                client,
                &code.subject,
                &code.granted_scope,
                &code.session,
                state.lifespans.refresh_token,
            )
            .await?,
        )
    } else {
        None
    };

    let id_token = if code.granted_scope.iter().any(|s| s == "openid") {
        Some(issue_id_token(state, client, &code)?)
    } else {
        None
    };

    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.lifespans.access_token,
        refresh_token,
        id_token,
        scope: code.granted_scope.join(" "),
    })
}

async fn refresh_token_grant(
    state: &OAuth2State,
    client: &Client,
    body: &TokenRequestBody,
) -> Result<TokenResponse, OAuthError> {
    if body.refresh_token.is_empty() {
        return Err(OAuthError::InvalidRequest(
            "refresh_token is required".to_string(),
        ));
    }

    let stored = state
        .store
        .get_token(&body.refresh_token)
        .await
        .map_err(|err| {
            if err.is_not_found() {
                OAuthError::InvalidGrant("the refresh token is unknown".to_string())
            } else {
                OAuthError::ServerError(err.to_string())
            }
        })?;

    if stored.kind != TokenKind::Refresh
        || !stored.is_active_at(Utc::now())
        || stored.client_id != client.id
    {
        return Err(OAuthError::InvalidGrant(
            "the refresh token is invalid or expired".to_string(),
        ));
    }

    let access_token = issue_access_token(
        state,
        client,
        &stored.subject,
        &stored.granted_scope,
        &stored.session,
    )
    .await?;

    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.lifespans.access_token,
        refresh_token: Some(body.refresh_token.clone()),
        id_token: None,
        scope: stored.granted_scope.join(" "),
    })
}

async fn client_credentials_grant(
    state: &OAuth2State,
    client: &Client,
    body: &TokenRequestBody,
) -> Result<TokenResponse, OAuthError> {
    if client.public {
        return Err(OAuthError::UnauthorizedClient(
            "public clients may not use the client_credentials grant".to_string(),
        ));
    }
    if !client.allows_grant_type("client_credentials") {
        return Err(OAuthError::UnauthorizedClient(
            "the client may not use the client_credentials grant".to_string(),
        ));
    }

    let scopes: Vec<String> = body.scope.split_whitespace().map(String::from).collect();
    if !client.allows_scopes(&scopes) {
        return Err(OAuthError::InvalidScope(
            "the client may not request one of the given scopes".to_string(),
        ));
    }

    let access_token = issue_access_token(
        state,
        client,
        &client.id,
        &scopes,
        &ConsentSessionData::default(),
    )
    .await?;

    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: state.lifespans.access_token,
        refresh_token: None,
        id_token: None,
        scope: scopes.join(" "),
    })
}

async fn issue_access_token(
    state: &OAuth2State,
    client: &Client,
    subject: &str,
    granted_scope: &[String],
    session: &ConsentSessionData,
) -> Result<String, OAuthError> {
    match state.access_token_strategy {
        AccessTokenStrategy::Opaque => {
            issue_opaque_token(
                state,
                TokenKind::Access,
                client,
                subject,
                granted_scope,
                session,
                state.lifespans.access_token,
            )
            .await
        }
        AccessTokenStrategy::Jwt => {
            let now = Utc::now().timestamp();
            let claims = AccessTokenClaims {
                iss: state.issuer.to_string(),
                sub: subject.to_string(),
                client_id: client.id.clone(),
                scp: granted_scope.to_vec(),
                exp: now + state.lifespans.access_token,
                iat: now,
                jti: Uuid::new_v4().to_string(),
                extra: session.access_token.clone(),
            };
            state
                .signer
                .sign_claims(&claims)
                .map_err(|e| OAuthError::ServerError(format!("access token signing failed: {e}")))
        }
    }
}

async fn issue_opaque_token(
    state: &OAuth2State,
    kind: TokenKind,
    client: &Client,
    subject: &str,
    granted_scope: &[String],
    session: &ConsentSessionData,
    lifetime: i64,
) -> Result<String, OAuthError> {
    let token = OAuth2Token {
        signature: token_secret(),
        kind,
        client_id: client.id.clone(),
        subject: subject.to_string(),
        granted_scope: granted_scope.to_vec(),
        session: session.clone(),
        issued_at: Utc::now(),
        expires_at: Utc::now() + Duration::seconds(lifetime),
        active: true,
    };

    state
        .store
        .create_token(&token)
        .await
        .map_err(|e| OAuthError::ServerError(e.to_string()))?;
    Ok(token.signature)
}

fn issue_id_token(
    state: &OAuth2State,
    client: &Client,
    code: &aegis_model::AuthorizationCode,
) -> Result<String, OAuthError> {
    let now = Utc::now().timestamp();
    let claims = IdTokenClaims {
        iss: state.issuer.to_string(),
        sub: code.subject.clone(),
        aud: vec![client.id.clone()],
        exp: now + state.lifespans.id_token,
        iat: now,
        auth_time: Some(code.authenticated_at.timestamp()),
        nonce: code.nonce.clone(),
        acr: None,
        extra: code.session.id_token.clone(),
    };

    state
        .signer
        .sign(&claims)
        .map_err(|e| OAuthError::ServerError(format!("ID token signing failed: {e}")))
}
