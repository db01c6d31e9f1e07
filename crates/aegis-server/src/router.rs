//! Router assembly.

use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use aegis_consent::{consent_router, ConsentApiState};
use aegis_jwk::{jwk_router, JwkApiState};
use aegis_oauth2::{clients_router, oauth2_router, OAuth2State, TokenLifespans};

use crate::context::Context;

/// Builds the full application router: public protocol endpoints plus the
/// management APIs, wrapped in trace and CORS layers.
pub fn create_router(context: &Context) -> Router {
    let oauth2_state = OAuth2State {
        clients: context.client_store.clone(),
        store: context.oauth2_store.clone(),
        strategy: context.strategy.clone(),
        signer: context.signer.clone(),
        issuer: context.config.issuer_url.clone(),
        error_url: context.config.error_url.clone(),
        share_error_debug: context.config.share_error_debug,
        access_token_strategy: context.config.access_token_strategy,
        lifespans: TokenLifespans::default(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(oauth2_router(oauth2_state.clone()))
        .merge(clients_router(oauth2_state))
        .merge(jwk_router(JwkApiState {
            store: context.key_store.clone(),
        }))
        .merge(consent_router(ConsentApiState {
            store: context.consent_store.clone(),
        }))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
