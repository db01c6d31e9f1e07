//! The configured singleton bundle.
//!
//! Everything stateful is assembled here once at startup and passed
//! explicitly into handlers; there is no ambient global state.

use std::sync::Arc;

use anyhow::{bail, Context as _};
use chrono::Duration;
use url::Url;

use aegis_consent::ConsentStrategy;
use aegis_crypto::KeyRing;
use aegis_jwk::{ensure_signing_key, ID_TOKEN_KEY_SET};
use aegis_oidc::IdTokenSigner;
use aegis_storage::{
    ClientStore, ConsentStore, KeyStore, MemoryClientStore, MemoryConsentStore, MemoryKeyStore,
    MemoryOAuth2Store, OAuth2Store,
};
use aegis_storage_sql::{
    create_pool, PoolConfig, SqlClientStore, SqlConsentStore, SqlKeyStore, SqlOAuth2Store,
};

use crate::config::Config;

/// The configured stores, signer and strategy.
#[derive(Clone)]
pub struct Context {
    /// Server configuration.
    pub config: Config,

    /// Login/consent flow records.
    pub consent_store: Arc<dyn ConsentStore>,

    /// JSON Web Key sets.
    pub key_store: Arc<dyn KeyStore>,

    /// OAuth 2.0 client registrations.
    pub client_store: Arc<dyn ClientStore>,

    /// Authorization codes and opaque tokens.
    pub oauth2_store: Arc<dyn OAuth2Store>,

    /// ID-token signer bound to the provisioned key.
    pub signer: Arc<IdTokenSigner>,

    /// The login & consent strategy.
    pub strategy: Arc<ConsentStrategy>,
}

impl Context {
    /// Assembles the context from configuration.
    ///
    /// # Errors
    ///
    /// Fails on unsupported DSNs, unreachable databases, weak secrets, or
    /// signing-key provisioning errors.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let ring = KeyRing::derive(config.system_secret.as_bytes())
            .context("SYSTEM_SECRET is unusable")?;

        let ttl = Duration::seconds(config.request_ttl);
        let (consent_store, key_store, client_store, oauth2_store) =
            build_stores(&config, &ring, ttl).await?;

        let signing_key = ensure_signing_key(key_store.as_ref(), ID_TOKEN_KEY_SET, "private:")
            .await
            .context("could not provision the ID-token signing key")?;
        let signer = Arc::new(
            IdTokenSigner::from_jwk(&signing_key)
                .context("the provisioned signing key is unusable")?,
        );

        let login_url = resolve_ui_url(&config, config.login_url.as_ref())?;
        let consent_url = resolve_ui_url(&config, config.consent_url.as_ref())?;

        let strategy = Arc::new(ConsentStrategy::new(
            consent_store.clone(),
            login_url,
            consent_url,
            *ring.csrf_cookie_key(),
            *ring.session_cookie_key(),
            signer.clone(),
        ));

        Ok(Self {
            config,
            consent_store,
            key_store,
            client_store,
            oauth2_store,
            signer,
            strategy,
        })
    }
}

fn resolve_ui_url(config: &Config, configured: Option<&Url>) -> anyhow::Result<Url> {
    match configured {
        Some(url) => Ok(url.clone()),
        None => config
            .issuer_url
            .join("oauth2/fallbacks/consent")
            .context("issuer URL cannot host the fallback pages"),
    }
}

type Stores = (
    Arc<dyn ConsentStore>,
    Arc<dyn KeyStore>,
    Arc<dyn ClientStore>,
    Arc<dyn OAuth2Store>,
);

async fn build_stores(config: &Config, ring: &KeyRing, ttl: Duration) -> anyhow::Result<Stores> {
    let dsn = config.database_url.as_str();

    if dsn.starts_with("memory://") {
        return Ok((
            Arc::new(MemoryConsentStore::with_ttl(ttl)),
            Arc::new(MemoryKeyStore::new()),
            Arc::new(MemoryClientStore::new()),
            Arc::new(MemoryOAuth2Store::new()),
        ));
    }

    if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
        let pool = create_pool(&PoolConfig::new(dsn))
            .await
            .context("could not connect to PostgreSQL")?;

        let client_store: Arc<dyn ClientStore> = Arc::new(SqlClientStore::new(pool.clone()));
        return Ok((
            Arc::new(SqlConsentStore::new(pool.clone(), client_store.clone(), ttl)),
            Arc::new(SqlKeyStore::new(pool.clone(), ring.sealer())),
            client_store,
            Arc::new(SqlOAuth2Store::new(pool)),
        ));
    }

    if dsn.starts_with("mysql://") {
        bail!(
            "MySQL is not supported by this build; use a postgres:// or memory:// DATABASE_URL"
        );
    }

    bail!("unrecognized DATABASE_URL scheme in '{dsn}'");
}
