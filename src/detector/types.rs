use std::time::Instant;

use crate::membership::types::MemberIdentity;

/// Liveness state of one tracked peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Alive,
    Suspect,
    /// Terminal: only removal from the view (and a rejoin under a new
    /// identity) resets it.
    Failed,
}

/// Everything known about one peer's liveness.
///
/// Created on first contact, refreshed on every heartbeat or ack, destroyed
/// when the peer leaves the view.
#[derive(Debug, Clone)]
pub struct SuspicionRecord {
    /// Last time any traffic from this peer was seen.
    pub last_heard: Instant,
    pub status: PeerStatus,
    /// When the peer entered SUSPECT; the failure clock counts from here.
    pub suspected_at: Option<Instant>,
    /// Distinct members that reported this peer suspect, for
    /// cross-verification.
    pub reported_by: Vec<MemberIdentity>,
}

impl SuspicionRecord {
    pub fn fresh(now: Instant) -> Self {
        Self {
            last_heard: now,
            status: PeerStatus::Alive,
            suspected_at: None,
            reported_by: Vec::new(),
        }
    }
}

/// A state transition the detector proposes to the view manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escalation {
    Suspected(MemberIdentity),
    Failed(MemberIdentity),
}
