//! Client management API.
//!
//! Secrets are hashed with argon2 before they hit the store; the plaintext
//! secret appears exactly once, in the create response.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aegis_crypto::token_secret;
use aegis_model::Client;
use aegis_storage::{ClientStore, StorageError};

use crate::secret::hash_secret;
use crate::state::OAuth2State;

/// JSON error body shared by all management endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ApiError {
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
            StorageError::InvalidData(_) => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_request", err.to_string())
            }
            _ => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "the storage backend failed",
            ),
        }
    }
}

/// Body of client create and update calls.
#[derive(Debug, Default, Deserialize)]
pub struct ClientBody {
    /// Client id; generated when omitted on create.
    #[serde(default)]
    pub client_id: String,

    /// Human-readable name.
    #[serde(default)]
    pub client_name: String,

    /// Plaintext secret; generated for confidential clients when omitted.
    #[serde(default)]
    pub client_secret: String,

    /// Allowed redirect URIs.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Allowed grant types.
    #[serde(default)]
    pub grant_types: Vec<String>,

    /// Allowed response types.
    #[serde(default)]
    pub response_types: Vec<String>,

    /// Scopes the client may request.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Whether this is a public client.
    #[serde(default)]
    pub public: bool,
}

/// Client representation returned by the API. The plaintext secret is only
/// present in the create response.
#[derive(Debug, Serialize)]
pub struct ClientResponse {
    #[serde(flatten)]
    client: Client,

    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
}

/// POST `/clients`
pub async fn create_client(
    State(state): State<OAuth2State>,
    Json(body): Json<ClientBody>,
) -> Result<(StatusCode, Json<ClientResponse>), ApiError> {
    let id = if body.client_id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        body.client_id.clone()
    };

    let plaintext_secret = if body.public {
        None
    } else if body.client_secret.is_empty() {
        Some(token_secret())
    } else {
        Some(body.client_secret.clone())
    };

    let secret_hash = match &plaintext_secret {
        Some(secret) => Some(hash_secret(secret).map_err(|e| {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "server_error", e)
        })?),
        None => None,
    };

    let client = Client {
        id,
        name: body.client_name,
        secret: secret_hash,
        redirect_uris: body.redirect_uris,
        grant_types: body.grant_types,
        response_types: body.response_types,
        scopes: body.scopes,
        public: body.public,
    };

    state.clients.create_client(&client).await?;

    Ok((
        StatusCode::CREATED,
        Json(ClientResponse {
            client: client.sanitized(),
            client_secret: plaintext_secret,
        }),
    ))
}

/// GET `/clients/{id}`
pub async fn get_client(
    State(state): State<OAuth2State>,
    Path(id): Path<String>,
) -> Result<Json<ClientResponse>, ApiError> {
    let client = state.clients.get_client(&id).await?;
    Ok(Json(ClientResponse {
        client: client.sanitized(),
        client_secret: None,
    }))
}

/// GET `/clients`
pub async fn list_clients(
    State(state): State<OAuth2State>,
) -> Result<Json<Vec<ClientResponse>>, ApiError> {
    let clients = state.clients.list_clients().await?;
    Ok(Json(
        clients
            .into_iter()
            .map(|c| ClientResponse {
                client: c.sanitized(),
                client_secret: None,
            })
            .collect(),
    ))
}

/// PUT `/clients/{id}`
pub async fn update_client(
    State(state): State<OAuth2State>,
    Path(id): Path<String>,
    Json(body): Json<ClientBody>,
) -> Result<Json<ClientResponse>, ApiError> {
    let existing = state.clients.get_client(&id).await?;

    let secret_hash = if body.client_secret.is_empty() {
        existing.secret.clone()
    } else {
        Some(hash_secret(&body.client_secret).map_err(|e| {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "server_error", e)
        })?)
    };

    let client = Client {
        id: id.clone(),
        name: body.client_name,
        secret: secret_hash,
        redirect_uris: body.redirect_uris,
        grant_types: body.grant_types,
        response_types: body.response_types,
        scopes: body.scopes,
        public: body.public,
    };

    state.clients.update_client(&client).await?;
    Ok(Json(ClientResponse {
        client: client.sanitized(),
        client_secret: None,
    }))
}

/// DELETE `/clients/{id}`
pub async fn delete_client(
    State(state): State<OAuth2State>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.clients.delete_client(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
