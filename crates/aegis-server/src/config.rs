//! Server configuration.
//!
//! Configuration is loaded from environment variables. The server starts
//! with insecure generated defaults for local experimentation but logs
//! loudly when it does.

use anyhow::{bail, Context as _};
use url::Url;

use aegis_oauth2::AccessTokenStrategy;

use crate::tls::Cidr;

/// Default request lifetime for login/consent flows in seconds.
pub const DEFAULT_REQUEST_TTL_SECS: i64 = 3600;

/// TLS-related settings.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// PEM certificate path (`HTTPS_TLS_CERT`).
    pub cert_path: Option<String>,

    /// PEM key path (`HTTPS_TLS_KEY`).
    pub key_path: Option<String>,

    /// CIDRs allowed to terminate TLS upstream
    /// (`HTTPS_ALLOW_TERMINATION_FROM`).
    pub allow_termination_from: Vec<Cidr>,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind (`HOST`).
    pub host: String,

    /// Port to bind (`PORT`).
    pub port: u16,

    /// OIDC issuer identifier (`ISSUER_URL`).
    pub issuer_url: Url,

    /// Storage DSN (`DATABASE_URL`): `memory://` or `postgres://...`.
    pub database_url: String,

    /// Secret seed for cookie and at-rest key derivation (`SYSTEM_SECRET`).
    pub system_secret: String,

    /// External login UI (`LOGIN_URL`); fallback page when unset.
    pub login_url: Option<Url>,

    /// External consent UI (`CONSENT_URL`); fallback page when unset.
    pub consent_url: Option<Url>,

    /// External error UI (`ERROR_URL`); JSON errors when unset.
    pub error_url: Option<Url>,

    /// OIDC subject type (`OIDC_SUBJECT_TYPE`); only `public` is supported.
    pub subject_type: String,

    /// Access token format (`OAUTH2_ACCESS_TOKEN_STRATEGY`).
    pub access_token_strategy: AccessTokenStrategy,

    /// Expose debug details in error responses
    /// (`OAUTH2_SHARE_ERROR_DEBUG`).
    pub share_error_debug: bool,

    /// Login/consent request lifetime in seconds (`REQUEST_TTL`).
    pub request_ttl: i64,

    /// TLS settings.
    pub tls: TlsConfig,
}

fn env_url(name: &str) -> anyhow::Result<Option<Url>> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => {
            let url = Url::parse(&value).with_context(|| format!("{name} is not a valid URL"))?;
            Ok(Some(url))
        }
        _ => Ok(None),
    }
}

fn env_bool(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Fails on malformed URLs, unsupported option values, or unparsable
    /// CIDRs.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(4444);

        let issuer_url = env_url("ISSUER_URL")?
            .unwrap_or_else(|| Url::parse(&format!("http://localhost:{port}/")).expect("static URL"));

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "memory://".to_string());
        if database_url == "memory://" {
            tracing::warn!(
                "DATABASE_URL is not set, falling back to the ephemeral in-memory store"
            );
        }

        let system_secret = match std::env::var("SYSTEM_SECRET") {
            Ok(secret) => secret,
            Err(_) => {
                tracing::warn!(
                    "SYSTEM_SECRET is not set, generating a random one; sessions and stored \
                     keys will not survive a restart"
                );
                aegis_crypto::random_alphanumeric(32)
            }
        };

        let subject_type =
            std::env::var("OIDC_SUBJECT_TYPE").unwrap_or_else(|_| "public".to_string());
        if subject_type != "public" {
            bail!("OIDC_SUBJECT_TYPE '{subject_type}' is not supported, only 'public' is");
        }

        let access_token_strategy = std::env::var("OAUTH2_ACCESS_TOKEN_STRATEGY")
            .unwrap_or_else(|_| "opaque".to_string())
            .parse::<AccessTokenStrategy>()
            .map_err(|e| anyhow::anyhow!(e))?;

        let request_ttl = std::env::var("REQUEST_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TTL_SECS);

        let allow_termination_from = match std::env::var("HTTPS_ALLOW_TERMINATION_FROM") {
            Ok(value) if !value.is_empty() => value
                .split(',')
                .map(str::trim)
                .map(str::parse)
                .collect::<Result<Vec<Cidr>, _>>()
                .map_err(|e| anyhow::anyhow!("HTTPS_ALLOW_TERMINATION_FROM: {e}"))?,
            _ => Vec::new(),
        };

        Ok(Self {
            host,
            port,
            issuer_url,
            database_url,
            system_secret,
            login_url: env_url("LOGIN_URL")?,
            consent_url: env_url("CONSENT_URL")?,
            error_url: env_url("ERROR_URL")?,
            subject_type,
            access_token_strategy,
            share_error_debug: env_bool("OAUTH2_SHARE_ERROR_DEBUG"),
            request_ttl,
            tls: TlsConfig {
                cert_path: std::env::var("HTTPS_TLS_CERT").ok().filter(|v| !v.is_empty()),
                key_path: std::env::var("HTTPS_TLS_KEY").ok().filter(|v| !v.is_empty()),
                allow_termination_from,
            },
        })
    }

    /// Creates a configuration for tests: in-memory store, fixed secret,
    /// debug errors enabled.
    #[must_use]
    pub fn for_testing(issuer_url: Url, login_url: Url, consent_url: Url) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            issuer_url,
            database_url: "memory://".to_string(),
            system_secret: "test-system-secret-0123456789abcdef".to_string(),
            login_url: Some(login_url),
            consent_url: Some(consent_url),
            error_url: None,
            subject_type: "public".to_string(),
            access_token_strategy: AccessTokenStrategy::Opaque,
            share_error_debug: true,
            request_ttl: DEFAULT_REQUEST_TTL_SECS,
            tls: TlsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testing_config_is_valid() {
        let config = Config::for_testing(
            Url::parse("http://127.0.0.1:4444/").unwrap(),
            Url::parse("http://127.0.0.1:3000/login").unwrap(),
            Url::parse("http://127.0.0.1:3000/consent").unwrap(),
        );
        assert_eq!(config.database_url, "memory://");
        assert!(config.system_secret.len() >= 32);
    }
}
