//! # aegis-consent
//!
//! The login & consent orchestration subsystem. Aegis renders no end-user
//! screens itself; it routes each `/oauth2/auth` request through external
//! login and consent UIs with a redirect + verifier handshake:
//!
//! 1. The strategy persists a request, binds it to the browser with a
//!    signed CSRF cookie, and redirects to the UI with an opaque
//!    `challenge`.
//! 2. The UI inspects the request through the management API and accepts or
//!    rejects it, receiving a `redirect_to` URL carrying a single-shot
//!    `verifier`.
//! 3. Back on `/oauth2/auth`, the strategy exchanges the verifier for the
//!    handled outcome, re-checks every identity-relevant invariant, and
//!    either moves the flow forward or converts the outcome into an OAuth
//!    error.
//!
//! The UI is untrusted for identity claims: everything it asserts is
//! re-validated server-side after the redirect returns.

#![forbid(unsafe_code)]

pub mod cookies;
pub mod error;
pub mod handler;
pub mod strategy;

pub use cookies::{CookieJars, SessionCookie};
pub use error::{AbortRedirect, FlowError};
pub use handler::{consent_router, ConsentApiState};
pub use strategy::{AcceptedConsent, ConsentStrategy};
