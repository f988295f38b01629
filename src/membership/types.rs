use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::address::HostAddress;

/// What a process contributes to the cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MemberRole {
    /// A rendezvous process answering discovery requests. Not eligible to
    /// coordinate while any other kind of member is present.
    Locator,
    /// A member hosting grid data.
    DataHost,
    /// A client-facing member.
    Server,
}

impl MemberRole {
    pub fn is_coordinator_eligible(&self) -> bool {
        !matches!(self, MemberRole::Locator)
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberRole::Locator => write!(f, "locator"),
            MemberRole::DataHost => write!(f, "data-host"),
            MemberRole::Server => write!(f, "server"),
        }
    }
}

/// Identifier of a published view. Strictly increasing over the lifetime of
/// the cluster; comparisons drive the at-most-once installation guard.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct ViewId(u64);

impl ViewId {
    /// The identifier a founding member publishes first.
    pub fn initial() -> Self {
        ViewId(1)
    }

    pub fn next(self) -> Self {
        ViewId(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Stable identity of a participant.
///
/// Equality and hashing cover address + incarnation only: two identities with
/// the same address but different incarnations are different members (a
/// rejoin), and role/weight are attributes rather than identity. The
/// incarnation orders members deterministically; the oldest surviving member
/// carries the smallest one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberIdentity {
    pub address: HostAddress,
    pub incarnation: u64,
    pub role: MemberRole,
    pub weight: u32,
}

impl MemberIdentity {
    pub fn new(address: HostAddress, incarnation: u64, role: MemberRole, weight: u32) -> Self {
        Self {
            address,
            incarnation,
            role,
            weight,
        }
    }
}

impl PartialEq for MemberIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.incarnation == other.incarnation
    }
}

impl Eq for MemberIdentity {}

impl Hash for MemberIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
        self.incarnation.hash(state);
    }
}

impl fmt::Display for MemberIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}({})", self.address, self.incarnation, self.role)
    }
}

/// An agreed membership snapshot.
///
/// Member order is join order and is meaningful: election tie-breaks and the
/// "identical member lists" agreement property both include it. Immutable
/// once built; every membership change produces a new `View`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct View {
    id: ViewId,
    members: Vec<MemberIdentity>,
    coordinator: MemberIdentity,
}

impl View {
    /// Assembles a view. The coordinator must be one of the members.
    pub fn new(id: ViewId, members: Vec<MemberIdentity>, coordinator: MemberIdentity) -> Self {
        debug_assert!(
            members.contains(&coordinator),
            "coordinator must be a view member"
        );
        Self {
            id,
            members,
            coordinator,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn members(&self) -> &[MemberIdentity] {
        &self.members
    }

    pub fn coordinator(&self) -> &MemberIdentity {
        &self.coordinator
    }

    pub fn contains(&self, member: &MemberIdentity) -> bool {
        self.members.contains(member)
    }

    /// True when another member already advertises this address, regardless
    /// of incarnation. Used for join collision checks.
    pub fn contains_address(&self, address: &HostAddress) -> bool {
        self.members.iter().any(|m| m.address == *address)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Structural sanity of a view received from the wire.
    pub fn is_well_formed(&self) -> bool {
        !self.members.is_empty() && self.members.contains(&self.coordinator)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{} members, coordinator {}]",
            self.id,
            self.members.len(),
            self.coordinator
        )
    }
}

/// The local node's position in its own lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLifecycle {
    /// Admission requested, not yet granted.
    Joining,
    /// Participating in the current view.
    Member,
    /// A member additionally authorized to publish new views.
    Coordinator,
    /// Left or removed. Terminal; rejoining means a new identity.
    Departed,
}

impl fmt::Display for NodeLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeLifecycle::Joining => write!(f, "joining"),
            NodeLifecycle::Member => write!(f, "member"),
            NodeLifecycle::Coordinator => write!(f, "coordinator"),
            NodeLifecycle::Departed => write!(f, "departed"),
        }
    }
}
