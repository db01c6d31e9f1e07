//! TLS termination guard.
//!
//! Aegis itself listens on plain HTTP; deployments terminate TLS at a load
//! balancer or reverse proxy. When `HTTPS_ALLOW_TERMINATION_FROM` is set,
//! every request (except health checks) must originate from one of the
//! listed CIDRs and carry `X-Forwarded-Proto: https`.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum::Router;
use serde_json::json;
use tracing::debug;

/// An IPv4 or IPv6 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    addr: IpAddr,
    prefix: u8,
}

impl Cidr {
    /// Whether `ip` falls inside this network.
    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = if self.prefix == 0 {
                    0
                } else {
                    u32::MAX << (32 - u32::from(self.prefix))
                };
                (u32::from(net) & mask) == (u32::from(ip) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = if self.prefix == 0 {
                    0
                } else {
                    u128::MAX << (128 - u32::from(self.prefix))
                };
                (u128::from(net) & mask) == (u128::from(ip) & mask)
            }
            _ => false,
        }
    }
}

impl FromStr for Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => {
                let prefix: u8 = prefix
                    .parse()
                    .map_err(|_| format!("invalid CIDR prefix in '{s}'"))?;
                (addr, prefix)
            }
            None => (s, 255),
        };

        let addr: IpAddr = addr
            .parse()
            .map_err(|_| format!("invalid IP address in '{s}'"))?;

        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix = if prefix == 255 { max } else { prefix };
        if prefix > max {
            return Err(format!("CIDR prefix out of range in '{s}'"));
        }

        Ok(Self { addr, prefix })
    }
}

async fn check_termination(
    State(allowed): State<Arc<Vec<Cidr>>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let forwarded_https = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("https"));

    let peer_allowed = allowed.iter().any(|cidr| cidr.contains(peer.ip()));

    if forwarded_https && peer_allowed {
        return next.run(request).await;
    }

    debug!(peer = %peer, forwarded_https, "rejecting request outside the TLS termination allow-list");
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": "request_forbidden",
            "error_description":
                "requests must arrive via an allowed TLS-terminating proxy",
            "status_code": 403,
        })),
    )
        .into_response()
}

/// Wraps `app` with the termination guard.
#[must_use]
pub fn enforce_termination(app: Router, allowed: &[Cidr]) -> Router {
    let allowed = Arc::new(allowed.to_vec());
    app.layer(from_fn_with_state(allowed, check_termination))
}
