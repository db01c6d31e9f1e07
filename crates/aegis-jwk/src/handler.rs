//! Key management HTTP API.
//!
//! Thin REST layer on top of the [`KeyStore`], plus the well-known JWKS
//! endpoint which exposes only the `public:` keys of the ID-token set.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use aegis_model::{JsonWebKey, JsonWebKeySet};
use aegis_storage::{KeyStore, StorageError};

use crate::generator::{generate_key_set, KeyGenError};
use crate::provision::ID_TOKEN_KEY_SET;

/// Path of the well-known JWKS endpoint.
pub const WELL_KNOWN_KEYS_PATH: &str = "/.well-known/jwks.json";

/// State for the key management API.
#[derive(Clone)]
pub struct JwkApiState {
    /// The backing key store.
    pub store: Arc<dyn KeyStore>,
}

/// Builds the key management router.
pub fn jwk_router(state: JwkApiState) -> Router {
    Router::new()
        .route(WELL_KNOWN_KEYS_PATH, get(well_known))
        .route(
            "/keys/{set}",
            get(get_key_set)
                .post(create_key_set)
                .put(update_key_set)
                .delete(delete_key_set),
        )
        .route(
            "/keys/{set}/{kid}",
            get(get_key).put(update_key).delete(delete_key),
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

impl From<KeyGenError> for ApiError {
    fn from(err: KeyGenError) -> Self {
        match err {
            KeyGenError::UnsupportedAlgorithm(_) => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_request", err.to_string())
            }
            KeyGenError::Generation(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "key generation failed",
            ),
        }
    }
}

/// Body of `POST /keys/{set}`.
#[derive(Debug, Deserialize)]
struct CreateKeySetRequest {
    /// Algorithm to generate keys for: RS256, ES512, HS256 or HS512.
    alg: String,

    /// Base kid of the generated pair; random when omitted.
    #[serde(default)]
    kid: String,
}

async fn well_known(State(state): State<JwkApiState>) -> Result<Json<JsonWebKeySet>, ApiError> {
    let keys = state.store.get_key_set(ID_TOKEN_KEY_SET).await?;
    Ok(Json(keys.public_keys()))
}

async fn get_key_set(
    State(state): State<JwkApiState>,
    Path(set): Path<String>,
) -> Result<Json<JsonWebKeySet>, ApiError> {
    Ok(Json(state.store.get_key_set(&set).await?))
}

async fn create_key_set(
    State(state): State<JwkApiState>,
    Path(set): Path<String>,
    Json(body): Json<CreateKeySetRequest>,
) -> Result<(StatusCode, Json<JsonWebKeySet>), ApiError> {
    let keys = generate_key_set(&body.alg, &body.kid)?;
    state.store.add_key_set(&set, &keys).await?;
    Ok((StatusCode::CREATED, Json(keys)))
}

async fn update_key_set(
    State(state): State<JwkApiState>,
    Path(set): Path<String>,
    Json(keys): Json<JsonWebKeySet>,
) -> Result<Json<JsonWebKeySet>, ApiError> {
    state.store.add_key_set(&set, &keys).await?;
    Ok(Json(keys))
}

async fn delete_key_set(
    State(state): State<JwkApiState>,
    Path(set): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_key_set(&set).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_key(
    State(state): State<JwkApiState>,
    Path((set, kid)): Path<(String, String)>,
) -> Result<Json<JsonWebKey>, ApiError> {
    Ok(Json(state.store.get_key(&set, &kid).await?))
}

async fn update_key(
    State(state): State<JwkApiState>,
    Path((set, _kid)): Path<(String, String)>,
    Json(key): Json<JsonWebKey>,
) -> Result<Json<JsonWebKey>, ApiError> {
    state.store.add_key(&set, &key).await?;
    Ok(Json(key))
}

async fn delete_key(
    State(state): State<JwkApiState>,
    Path((set, kid)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_key(&set, &kid).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_storage::MemoryKeyStore;

    fn state() -> JwkApiState {
        JwkApiState {
            store: Arc::new(MemoryKeyStore::new()),
        }
    }

    #[tokio::test]
    async fn well_known_exposes_only_public_keys() {
        let state = state();
        let keys = generate_key_set("RS256", "signing").unwrap();
        state
            .store
            .add_key_set(ID_TOKEN_KEY_SET, &keys)
            .await
            .unwrap();

        let Json(set) = well_known(State(state)).await.unwrap();
        assert_eq!(set.keys.len(), 1);
        assert_eq!(set.keys[0].key_id(), "public:signing");
        assert!(!set.keys[0].is_private());
    }

    #[tokio::test]
    async fn create_rejects_unknown_algorithm() {
        let err = create_key_set(
            State(state()),
            Path("my-set".to_string()),
            Json(CreateKeySetRequest {
                alg: "PS256".to_string(),
                kid: String::new(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status_code, 400);
        assert_eq!(err.error, "invalid_request");
    }

    #[tokio::test]
    async fn create_and_fetch_set() {
        let state = state();

        let (status, Json(created)) = create_key_set(
            State(state.clone()),
            Path("my-set".to_string()),
            Json(CreateKeySetRequest {
                alg: "HS256".to_string(),
                kid: "k1".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.keys.len(), 1);

        let Json(fetched) = get_key_set(State(state), Path("my-set".to_string()))
            .await
            .unwrap();
        assert_eq!(fetched.keys[0].key_id(), "private:k1");
    }

    #[tokio::test]
    async fn missing_set_is_404() {
        let err = get_key_set(State(state()), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code, 404);
        assert_eq!(err.error, "not_found");
    }
}
