//! Membership Wire Protocol
//!
//! The datagram vocabulary of the membership layer, serialized with bincode.
//!
//! - `Ping/Ack`: heartbeat round between view members.
//! - `FindCoordinator/CoordinatorReply`: locator-assisted discovery.
//! - `JoinRequest/JoinGranted/JoinRefused`: admission handshake with the
//!   coordinator.
//! - `Leave`: graceful departure announcement.
//! - `Suspect`: suspicion report gossiped toward the coordinator.
//! - `InstallView`: coordinator broadcast of the next agreed view.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{MemberIdentity, MemberRole, View};
use crate::address::HostAddress;
use crate::error::JoinRejection;

/// A prospective member, before the coordinator has assigned an incarnation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinCandidate {
    pub address: HostAddress,
    pub role: MemberRole,
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MembershipMessage {
    Ping {
        from: MemberIdentity,
    },

    Ack {
        from: MemberIdentity,
    },

    /// Discovery probe. The `token` correlates the reply; stale replies are
    /// ignored, which makes abandoning an attempt side-effect free.
    FindCoordinator {
        token: Uuid,
    },

    CoordinatorReply {
        token: Uuid,
        coordinator: HostAddress,
    },

    JoinRequest {
        token: Uuid,
        candidate: JoinCandidate,
    },

    JoinGranted {
        token: Uuid,
        identity: MemberIdentity,
        view: View,
    },

    JoinRefused {
        token: Uuid,
        rejection: JoinRejection,
    },

    Leave {
        from: MemberIdentity,
    },

    Suspect {
        target: MemberIdentity,
        reporter: MemberIdentity,
    },

    /// Coordinator broadcast of a newly built view. `graceful` names the
    /// members that departed voluntarily since the previous view, so every
    /// node reports the same departure reasons.
    InstallView {
        view: View,
        graceful: Vec<MemberIdentity>,
    },
}

pub fn encode(msg: &MembershipMessage) -> Result<Vec<u8>> {
    Ok(bincode::serialize(msg)?)
}

pub fn decode(payload: &[u8]) -> Result<MembershipMessage> {
    Ok(bincode::deserialize(payload)?)
}
