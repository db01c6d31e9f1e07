//! # aegis-model
//!
//! Domain models shared by the storage and protocol layers:
//!
//! - [`Client`] - OAuth 2.0 client registrations (the core flow only reads
//!   them; management CRUD lives in the admin API).
//! - [`LoginRequest`] / [`HandledLoginRequest`] and [`ConsentRequest`] /
//!   [`HandledConsentRequest`] - the paired request/outcome records of the
//!   login & consent orchestration.
//! - [`AuthenticationSession`] - the long-lived record behind the session
//!   cookie.
//! - [`PreviouslyGrantedConsent`] - the denormalized view used for consent
//!   skipping.

#![forbid(unsafe_code)]

pub mod client;
pub mod flow;
pub mod jwk;
pub mod oauth2;
pub mod scope;
pub mod session;

pub use client::Client;
pub use flow::{
    ConsentRequest, ConsentSessionData, HandledConsentRequest, HandledLoginRequest, LoginRequest,
    OpenIdConnectContext, PreviouslyGrantedConsent, RequestDeniedError,
};
pub use jwk::{JsonWebKey, JsonWebKeySet};
pub use oauth2::{AuthorizationCode, OAuth2Token, TokenKind};
pub use session::AuthenticationSession;
