//! Address Resolver Tests
//!
//! Validates the resolution behavior of `HostAddress`.
//!
//! ## Test Scopes
//! - **Literal Caching**: A literal-IP address resolves once at construction
//!   and never touches the resolver again.
//! - **Hostname Freshness**: A DNS name goes through the resolver on every
//!   access and surfaces lookup failures.
//! - **Value Semantics**: Structural equality, hashing, and the serde wire
//!   form that rebuilds the cache on arrival.

#[cfg(test)]
mod tests {
    use crate::address::{HostAddress, ResolveError};

    // ============================================================
    // LITERAL IP CACHING
    // ============================================================

    #[test]
    fn test_literal_ip_caches_endpoint_at_construction() {
        let addr = HostAddress::new("192.0.2.7", 5000);

        assert!(addr.is_ip_literal());
        let cached = addr.cached_endpoint().expect("literal must cache");
        assert_eq!(cached, "192.0.2.7:5000".parse().unwrap());
    }

    #[tokio::test]
    async fn test_literal_ip_resolves_from_cache_on_every_access() {
        // TEST-NET-1 address: no resolver could answer for it, so a
        // successful resolve proves the cache is used and no lookup happens.
        let addr = HostAddress::new("192.0.2.7", 5000);

        for _ in 0..16 {
            let endpoint = addr.resolve().await.expect("cached resolve");
            assert_eq!(endpoint, addr.cached_endpoint().unwrap());
        }
    }

    #[test]
    fn test_ipv6_literal_is_detected() {
        let addr = HostAddress::new("::1", 7000);
        assert!(addr.is_ip_literal());
        assert_eq!(
            addr.cached_endpoint().unwrap(),
            "[::1]:7000".parse().unwrap()
        );
    }

    // ============================================================
    // HOSTNAME RESOLUTION
    // ============================================================

    #[test]
    fn test_hostname_is_never_cached() {
        let addr = HostAddress::new("localhost", 5000);
        assert!(!addr.is_ip_literal());
        assert!(addr.cached_endpoint().is_none());
    }

    #[tokio::test]
    async fn test_hostname_resolves_freshly_each_call() {
        let addr = HostAddress::new("localhost", 5000);

        // Each call goes through the resolver; all must agree on the port.
        for _ in 0..3 {
            let endpoint = addr.resolve().await.expect("localhost resolves");
            assert_eq!(endpoint.port(), 5000);
            assert!(endpoint.ip().is_loopback());
        }
    }

    #[tokio::test]
    async fn test_unresolvable_hostname_errors() {
        let addr = HostAddress::new("no-such-host.invalid", 5000);

        match addr.resolve().await {
            Err(ResolveError::Lookup { host, port, .. }) => {
                assert_eq!(host, "no-such-host.invalid");
                assert_eq!(port, 5000);
            }
            Err(ResolveError::Empty { .. }) => {}
            Ok(endpoint) => panic!("resolved unexpectedly to {endpoint}"),
        }
    }

    // ============================================================
    // VALUE SEMANTICS
    // ============================================================

    #[test]
    fn test_equality_is_structural() {
        let a = HostAddress::new("10.0.0.1", 5000);
        let b = HostAddress::new("10.0.0.1", 5000);
        let c = HostAddress::new("10.0.0.1", 5001);
        let d = HostAddress::new("node-1", 5000);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_hash_matches_equality() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(HostAddress::new("10.0.0.1", 5000));
        set.insert(HostAddress::new("10.0.0.1", 5000));
        set.insert(HostAddress::new("10.0.0.2", 5000));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_serde_round_trip_rebuilds_cache() {
        let original = HostAddress::new("192.0.2.9", 6000);

        let bytes = bincode::serialize(&original).expect("serialize");
        let restored: HostAddress = bincode::deserialize(&bytes).expect("deserialize");

        assert_eq!(restored, original);
        assert!(restored.is_ip_literal());
        assert_eq!(restored.cached_endpoint(), original.cached_endpoint());

        let named = HostAddress::new("node-a", 6000);
        let bytes = bincode::serialize(&named).expect("serialize");
        let restored: HostAddress = bincode::deserialize(&bytes).expect("deserialize");
        assert!(!restored.is_ip_literal());
        assert!(restored.cached_endpoint().is_none());
    }

    #[test]
    fn test_display_is_host_colon_port() {
        let addr = HostAddress::new("node-1", 5000);
        assert_eq!(addr.to_string(), "node-1:5000");
    }
}
