//! Node Configuration
//!
//! Externally supplied settings for a member process. The core consumes but
//! does not own these values; `validate` runs once at startup and rejects
//! out-of-range combinations fatally before any socket is bound.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::address::HostAddress;
use crate::membership::types::MemberRole;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("heartbeat_interval must be greater than zero")]
    ZeroHeartbeatInterval,

    #[error("suspicion_timeout ({suspicion:?}) must not be shorter than heartbeat_interval ({heartbeat:?})")]
    SuspicionShorterThanHeartbeat {
        suspicion: Duration,
        heartbeat: Duration,
    },

    #[error("failure_timeout ({failure:?}) must be longer than suspicion_timeout ({suspicion:?})")]
    FailureNotAfterSuspicion {
        failure: Duration,
        suspicion: Duration,
    },

    #[error("quorum_threshold {0} must lie in (0, 1]")]
    QuorumThresholdOutOfRange(f64),

    #[error("join_attempts must be at least 1")]
    ZeroJoinAttempts,

    #[error("member weight must be at least 1")]
    ZeroWeight,
}

/// Settings for one member process.
#[derive(Debug, Clone)]
pub struct MembershipConfig {
    /// Local socket the datagram transport binds.
    pub bind_addr: SocketAddr,
    /// Address advertised to peers. May be a hostname; peers resolve it
    /// through [`HostAddress`] on every contact.
    pub advertised: HostAddress,
    /// Role this process plays in the cluster.
    pub role: MemberRole,
    /// Voting weight for the quorum check.
    pub weight: u32,
    /// Rendezvous addresses contacted during discovery. An empty list (or a
    /// list naming only this node) founds a new cluster.
    pub locators: Vec<HostAddress>,
    /// Interval between heartbeat rounds.
    pub heartbeat_interval: Duration,
    /// Silence after which a peer turns SUSPECT.
    pub suspicion_timeout: Duration,
    /// Additional silence after SUSPECT before FAILED may be ratified.
    pub failure_timeout: Duration,
    /// Fraction of total view weight that must survive a partition.
    /// The surviving side must hold strictly more than this fraction.
    pub quorum_threshold: f64,
    /// Rounds through the locator list before a join attempt is abandoned.
    pub join_attempts: usize,
    /// Per-request wait during discovery and admission.
    pub join_timeout: Duration,
}

impl MembershipConfig {
    /// Builds a configuration with the default protocol timings.
    pub fn new(bind_addr: SocketAddr, advertised: HostAddress) -> Self {
        Self {
            bind_addr,
            advertised,
            role: MemberRole::Server,
            weight: 1,
            locators: Vec::new(),
            heartbeat_interval: Duration::from_millis(500),
            suspicion_timeout: Duration::from_secs(5),
            failure_timeout: Duration::from_secs(10),
            quorum_threshold: 0.5,
            join_attempts: 3,
            join_timeout: Duration::from_secs(2),
        }
    }

    /// Checks cross-field invariants. Called once at startup; any error here
    /// is fatal to the process.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroHeartbeatInterval);
        }
        if self.suspicion_timeout < self.heartbeat_interval {
            return Err(ConfigError::SuspicionShorterThanHeartbeat {
                suspicion: self.suspicion_timeout,
                heartbeat: self.heartbeat_interval,
            });
        }
        if self.failure_timeout <= self.suspicion_timeout {
            return Err(ConfigError::FailureNotAfterSuspicion {
                failure: self.failure_timeout,
                suspicion: self.suspicion_timeout,
            });
        }
        if !(self.quorum_threshold > 0.0 && self.quorum_threshold <= 1.0) {
            return Err(ConfigError::QuorumThresholdOutOfRange(
                self.quorum_threshold,
            ));
        }
        if self.join_attempts == 0 {
            return Err(ConfigError::ZeroJoinAttempts);
        }
        if self.weight == 0 {
            return Err(ConfigError::ZeroWeight);
        }
        Ok(())
    }

    /// True when the locator list gives this node nobody to join through,
    /// meaning it founds a fresh cluster.
    pub fn is_founder(&self) -> bool {
        self.locators.iter().all(|l| *l == self.advertised)
    }
}
