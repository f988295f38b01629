use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to resolve {host}:{port}")]
    Lookup {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("resolver returned no addresses for {host}:{port}")]
    Empty { host: String, port: u16 },
}

/// A member's network location as advertised: the original host text (a
/// literal IP or a DNS name) plus a port.
///
/// If the host text is a literal IP the endpoint is built once here and every
/// [`resolve`](HostAddress::resolve) call returns it without a lookup. If it
/// is a DNS name, every call performs a fresh lookup against the cached port.
/// Never mutated; a changed address is a new `HostAddress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "HostAddressWire", into = "HostAddressWire")]
pub struct HostAddress {
    host: String,
    port: u16,
    ip_literal: bool,
    cached: Option<SocketAddr>,
}

impl HostAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let cached = host
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, port));
        Self {
            ip_literal: cached.is_some(),
            host,
            port,
            cached,
        }
    }

    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_ip_literal(&self) -> bool {
        self.ip_literal
    }

    /// The endpoint built at construction, present only for literal IPs.
    /// Retry loops hold the `HostAddress` itself rather than this value so
    /// hostname-based addresses keep re-resolving.
    pub fn cached_endpoint(&self) -> Option<SocketAddr> {
        self.cached
    }

    /// Resolves to a connectable endpoint.
    ///
    /// Literal-IP addresses return the cached endpoint with no resolver call.
    /// Hostnames perform a fresh DNS lookup on every invocation.
    pub async fn resolve(&self) -> Result<SocketAddr, ResolveError> {
        if let Some(endpoint) = self.cached {
            return Ok(endpoint);
        }

        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|source| ResolveError::Lookup {
                host: self.host.clone(),
                port: self.port,
                source,
            })?;

        addrs.next().ok_or_else(|| ResolveError::Empty {
            host: self.host.clone(),
            port: self.port,
        })
    }
}

impl PartialEq for HostAddress {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port && self.ip_literal == other.ip_literal
    }
}

impl Eq for HostAddress {}

impl Hash for HostAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
        self.ip_literal.hash(state);
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Wire form: only host and port travel; the literal flag and cache are
/// rebuilt on arrival so the caching invariant holds on every node.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HostAddressWire {
    host: String,
    port: u16,
}

impl From<HostAddressWire> for HostAddress {
    fn from(wire: HostAddressWire) -> Self {
        HostAddress::new(wire.host, wire.port)
    }
}

impl From<HostAddress> for HostAddressWire {
    fn from(addr: HostAddress) -> Self {
        HostAddressWire {
            host: addr.host,
            port: addr.port,
        }
    }
}
