//! Protocol Error Taxonomy
//!
//! Typed failures of the membership protocol. Locally recoverable conditions
//! (a missed heartbeat, one dead locator) are absorbed inside the components
//! and never surface here; these types cover the outcomes a caller or an
//! operator must act on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::HostAddress;

/// Why a coordinator refused an admission request.
///
/// Every variant is retryable after backoff: a colliding member may be
/// removed, an in-flight view change completes, and a stale coordinator
/// hint is corrected by re-running discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum JoinRejection {
    /// A live member with the same advertised address is already in the view.
    #[error("a live member already holds this address")]
    DuplicateIdentity,

    /// The coordinator is mid-broadcast of another view change.
    /// At most one view transition is in flight at a time.
    #[error("a view change is already in flight")]
    ChangeInProgress,

    /// The contacted node is not the coordinator. Carries the address of the
    /// coordinator it knows about so the joiner can re-aim.
    #[error("contacted node is not the coordinator")]
    NotCoordinator { coordinator: Option<HostAddress> },
}

/// Terminal outcome of a join attempt.
#[derive(Debug, Error)]
pub enum JoinError {
    /// The coordinator refused admission and retries did not help.
    #[error("admission refused: {0}")]
    Rejected(JoinRejection),

    /// Every configured locator failed across the allowed attempts.
    /// Fatal to the join attempt; surfaced to the operator, never
    /// silently retried.
    #[error("all locators exhausted after {attempts} attempt(s)")]
    Exhausted { attempts: usize },

    /// The transport failed in a way retries cannot absorb.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Why local cluster participation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The surviving partition fell below the quorum threshold. Participation
    /// stops rather than risk a split-brain; deliberately not retried.
    QuorumLost,
    /// The operator asked this node to leave.
    LeftGracefully,
    /// A published view no longer contains this node.
    Removed,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::QuorumLost => write!(f, "quorum lost"),
            ExitReason::LeftGracefully => write!(f, "left gracefully"),
            ExitReason::Removed => write!(f, "removed from view"),
        }
    }
}
