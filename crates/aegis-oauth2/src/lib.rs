//! # aegis-oauth2
//!
//! The public OAuth 2.0 / OpenID Connect surface of Aegis:
//!
//! - `/oauth2/auth`, wired into the consent strategy and finalizing granted
//!   flows with a single-use authorization code.
//! - `/oauth2/token` (`authorization_code`, `refresh_token`,
//!   `client_credentials`), `/oauth2/introspect`, `/oauth2/revoke`,
//!   `/userinfo`.
//! - `/.well-known/openid-configuration`.
//! - The `/clients` management API.
//! - Fallback pages shown when no login/consent/error UI is configured.

#![forbid(unsafe_code)]

pub mod authorize;
pub mod clients;
pub mod fallback;
pub mod introspect;
pub mod secret;
pub mod state;
pub mod token;
pub mod wellknown;

use axum::routing::{get, post};
use axum::Router;

pub use state::{AccessTokenStrategy, OAuth2State, TokenLifespans};

/// Builds the public OAuth 2.0 router.
pub fn oauth2_router(state: OAuth2State) -> Router {
    Router::new()
        .route("/oauth2/auth", get(authorize::authorize))
        .route("/oauth2/token", post(token::token))
        .route("/oauth2/introspect", post(introspect::introspect))
        .route("/oauth2/revoke", post(introspect::revoke))
        .route(
            "/userinfo",
            get(introspect::userinfo).post(introspect::userinfo),
        )
        .route(
            "/.well-known/openid-configuration",
            get(wellknown::openid_configuration),
        )
        .route("/oauth2/fallbacks/consent", get(fallback::fallback_consent))
        .route("/oauth2/fallbacks/error", get(fallback::fallback_error))
        .with_state(state)
}

/// Builds the `/clients` management router.
pub fn clients_router(state: OAuth2State) -> Router {
    Router::new()
        .route(
            "/clients",
            get(clients::list_clients).post(clients::create_client),
        )
        .route(
            "/clients/{id}",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        )
        .with_state(state)
}
