//! # aegis-server
//!
//! Assembly of the Aegis authorization server: environment configuration,
//! the `Context` bundle of configured stores and strategies, router
//! construction and the listener loop.

#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod router;
pub mod tls;

use std::net::SocketAddr;

use anyhow::Context as _;
use tracing::info;

pub use config::{Config, TlsConfig};
pub use context::Context;

/// The assembled server.
pub struct Server {
    context: Context,
}

impl Server {
    /// Builds the server: connects stores, provisions the signing key and
    /// wires the routers.
    ///
    /// # Errors
    ///
    /// Fails when the database is unreachable, the system secret is too
    /// weak, or signing-key provisioning fails.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let context = Context::new(config).await?;
        Ok(Self { context })
    }

    /// Returns the server context.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Builds the full router, including the TLS-termination guard when one
    /// is configured.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        let mut app = router::create_router(&self.context);
        if !self.context.config.tls.allow_termination_from.is_empty() {
            app = tls::enforce_termination(app, &self.context.config.tls.allow_termination_from);
        }
        app
    }

    /// Binds and serves until the process is stopped.
    ///
    /// # Errors
    ///
    /// Fails when the listener cannot bind or the accept loop errors.
    pub async fn run(self) -> anyhow::Result<()> {
        if self.context.config.tls.cert_path.is_some() || self.context.config.tls.key_path.is_some()
        {
            anyhow::bail!(
                "direct TLS serving is not supported; terminate TLS upstream and set \
                 HTTPS_ALLOW_TERMINATION_FROM"
            );
        }

        let addr = format!(
            "{}:{}",
            self.context.config.host, self.context.config.port
        );
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("could not bind {addr}"))?;

        info!(%addr, issuer = %self.context.config.issuer_url, "server listening");

        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .context("server loop failed")
    }
}
