//! # aegis-oidc
//!
//! OAuth 2.0 and OpenID Connect protocol types shared across the server:
//!
//! - The error taxonomy with RFC 6749 error codes and HTTP mappings.
//! - Authorization request parsing, including the OIDC parameters that
//!   drive the login & consent orchestration (`prompt`, `max_age`,
//!   `id_token_hint`) and the flow verifiers.
//! - ID-token claims and the RS256 signer built on the provisioned JWK.

#![forbid(unsafe_code)]

pub mod claims;
pub mod error;
pub mod request;
pub mod token;

pub use claims::IdTokenClaims;
pub use error::{OAuthError, OAuthErrorBody};
pub use request::{AuthorizeQuery, AuthorizeRequest};
pub use token::{IdTokenSigner, TokenError};
