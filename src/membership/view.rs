//! View Manager State Machine
//!
//! The single owner of the authoritative view. All joins, departures, and
//! ratified failures funnel through one instance on one task; every other
//! component submits requests and reads immutable snapshots. Methods mutate
//! state synchronously and return [`Action`]s for the surrounding service to
//! execute (broadcasts, shutdown), which keeps the protocol logic free of
//! I/O and directly testable.

use std::mem;

use tracing::{debug, info, warn};

use super::election::elect;
use super::listener::{DepartureReason, ListenerSet};
use super::protocol::JoinCandidate;
use super::quorum::has_quorum;
use super::types::{MemberIdentity, NodeLifecycle, View, ViewId};
use crate::error::{ExitReason, JoinRejection};

/// Side effects the service must perform after a state transition.
#[derive(Debug)]
pub enum Action {
    /// Send `InstallView` for `view` to each recipient.
    Broadcast {
        view: View,
        graceful: Vec<MemberIdentity>,
        recipients: Vec<MemberIdentity>,
    },
    /// Stop local cluster participation.
    Shutdown { reason: ExitReason },
}

/// Outcome of offering a received view for installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { old: ViewId, new: ViewId },
    /// Identifier not strictly greater than the installed one; ignored.
    /// Retransmissions and reordering land here, making application
    /// at-most-once.
    Stale { current: ViewId, offered: ViewId },
    /// The view no longer contains this node.
    Excluded,
    /// Structurally invalid (empty, or coordinator not a member).
    Malformed,
}

/// A successful admission: the identity the coordinator assigned and the
/// view that now contains it.
#[derive(Debug, Clone)]
pub struct JoinGrant {
    pub identity: MemberIdentity,
    pub view: View,
}

pub struct ViewManager {
    local: MemberIdentity,
    lifecycle: NodeLifecycle,
    view: View,
    quorum_threshold: f64,
    listeners: ListenerSet,
    /// In-flight-change guard: set from the moment a locally built view is
    /// accepted until its broadcast completes. At most one pending view
    /// transition exists at a time.
    broadcast_in_flight: bool,
    /// Detector-confirmed failures not yet reflected in a published view.
    failed: Vec<MemberIdentity>,
    /// Announced graceful departures not yet reflected in a published view.
    pending_graceful: Vec<MemberIdentity>,
}

impl ViewManager {
    /// Founds a new cluster: a single-member view with self as coordinator.
    pub fn found(local: MemberIdentity, quorum_threshold: f64, listeners: ListenerSet) -> Self {
        let view = View::new(ViewId::initial(), vec![local.clone()], local.clone());
        info!("founding cluster with {}", view);
        listeners.notify_view_changed(&view, &view);
        Self {
            local,
            lifecycle: NodeLifecycle::Coordinator,
            view,
            quorum_threshold,
            listeners,
            broadcast_in_flight: false,
            failed: Vec::new(),
            pending_graceful: Vec::new(),
        }
    }

    /// Starts from a view received through admission.
    pub fn admitted(
        local: MemberIdentity,
        view: View,
        quorum_threshold: f64,
        listeners: ListenerSet,
    ) -> Self {
        let lifecycle = if view.coordinator() == &local {
            NodeLifecycle::Coordinator
        } else {
            NodeLifecycle::Member
        };
        info!("admitted into {}", view);
        listeners.notify_view_changed(&view, &view);
        Self {
            local,
            lifecycle,
            view,
            quorum_threshold,
            listeners,
            broadcast_in_flight: false,
            failed: Vec::new(),
            pending_graceful: Vec::new(),
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn local(&self) -> &MemberIdentity {
        &self.local
    }

    pub fn lifecycle(&self) -> NodeLifecycle {
        self.lifecycle
    }

    pub fn is_coordinator(&self) -> bool {
        self.lifecycle == NodeLifecycle::Coordinator
    }

    /// Handles an admission request. Coordinator only; serialized against any
    /// in-flight view change; rejects candidates whose address collides with
    /// a member that will survive the next view.
    pub fn request_join(
        &mut self,
        candidate: JoinCandidate,
    ) -> Result<(JoinGrant, Vec<Action>), JoinRejection> {
        if !self.is_coordinator() {
            return Err(JoinRejection::NotCoordinator {
                coordinator: Some(self.view.coordinator().address.clone()),
            });
        }
        if self.broadcast_in_flight {
            return Err(JoinRejection::ChangeInProgress);
        }

        let survives = |m: &MemberIdentity| {
            !self.failed.contains(m) && !self.pending_graceful.contains(m)
        };
        let collision = self
            .view
            .members()
            .iter()
            .any(|m| m.address == candidate.address && survives(m));
        if collision {
            return Err(JoinRejection::DuplicateIdentity);
        }

        let incarnation = self
            .view
            .members()
            .iter()
            .map(|m| m.incarnation)
            .max()
            .unwrap_or(0)
            + 1;
        let identity = MemberIdentity::new(
            candidate.address,
            incarnation,
            candidate.role,
            candidate.weight,
        );
        info!("admitting {}", identity);

        let actions = self.build_and_install(vec![identity.clone()]);
        Ok((
            JoinGrant {
                identity,
                view: self.view.clone(),
            },
            actions,
        ))
    }

    /// Ratifies a batch of detector-confirmed failures, normally one sweep's
    /// worth. Runs the quorum check against the current view before anything
    /// is published; a batch that leaves this side below threshold shuts the
    /// node down instead of producing a view. Ratified failures and
    /// still-suspect peers both count as unreachable in that check.
    pub fn peers_failed(
        &mut self,
        targets: Vec<MemberIdentity>,
        suspects: &[MemberIdentity],
    ) -> Vec<Action> {
        if self.lifecycle == NodeLifecycle::Departed {
            return Vec::new();
        }

        for target in targets {
            if target == self.local || !self.view.contains(&target) {
                continue;
            }
            if !self.failed.contains(&target) {
                warn!("failure ratified for {}", target);
                self.failed.push(target);
            }
        }
        if self.failed.is_empty() {
            return Vec::new();
        }

        let mut unreachable = self.failed.clone();
        for peer in suspects {
            if *peer != self.local && self.view.contains(peer) && !unreachable.contains(peer) {
                unreachable.push(peer.clone());
            }
        }

        if !has_quorum(&self.view, &unreachable, self.quorum_threshold) {
            tracing::error!(
                "quorum lost: {} of {} members unreachable, shutting down participation",
                unreachable.len(),
                self.view.len()
            );
            self.lifecycle = NodeLifecycle::Departed;
            return vec![Action::Shutdown {
                reason: ExitReason::QuorumLost,
            }];
        }

        if self.is_coordinator() {
            return self.try_flush_departures();
        }

        // The coordinator itself is among the failed: survivors re-run the
        // election, and whoever wins resumes publishing.
        if self.failed.contains(self.view.coordinator()) {
            let survivors: Vec<MemberIdentity> = self
                .view
                .members()
                .iter()
                .filter(|m| !self.failed.contains(m) && !self.pending_graceful.contains(m))
                .cloned()
                .collect();
            if elect(&survivors, None) == Some(&self.local) {
                info!("coordinator failed, assuming coordinator role");
                self.lifecycle = NodeLifecycle::Coordinator;
                return self.try_flush_departures();
            }
        }

        Vec::new()
    }

    /// Records a graceful departure announcement. Coordinator only; the
    /// removal rides the next published view with reason `Graceful`.
    pub fn member_leaving(&mut self, member: MemberIdentity) -> Vec<Action> {
        if !self.is_coordinator() || member == self.local || !self.view.contains(&member) {
            return Vec::new();
        }
        if !self.pending_graceful.contains(&member) {
            info!("{} announced departure", member);
            self.pending_graceful.push(member);
        }
        self.try_flush_departures()
    }

    /// Leaves the cluster voluntarily. A departing coordinator publishes one
    /// final view without itself, with a successor already elected, so the
    /// cluster does not need a failure detection round to move on.
    pub fn leave_local(&mut self) -> Vec<Action> {
        if self.lifecycle == NodeLifecycle::Departed {
            return Vec::new();
        }
        let was_coordinator = self.is_coordinator();
        self.lifecycle = NodeLifecycle::Departed;

        if !was_coordinator || self.view.len() <= 1 {
            return Vec::new();
        }

        let survivors: Vec<MemberIdentity> = self
            .view
            .members()
            .iter()
            .filter(|m| {
                **m != self.local && !self.failed.contains(m) && !self.pending_graceful.contains(m)
            })
            .cloned()
            .collect();
        let Some(successor) = elect(&survivors, None) else {
            return Vec::new();
        };

        let mut graceful = vec![self.local.clone()];
        graceful.append(&mut self.pending_graceful);
        let final_view = View::new(self.view.id().next(), survivors.clone(), successor.clone());
        info!("departing, handing coordination to {}", successor);

        vec![Action::Broadcast {
            view: final_view,
            graceful,
            recipients: survivors,
        }]
    }

    /// Applies a coordinator-broadcast view. `graceful` is the broadcast's
    /// list of voluntarily departed members, used only to pick departure
    /// reasons for the listeners.
    pub fn install_view(
        &mut self,
        offered: View,
        graceful: &[MemberIdentity],
    ) -> (InstallOutcome, Vec<Action>) {
        if self.lifecycle == NodeLifecycle::Departed {
            return (
                InstallOutcome::Stale {
                    current: self.view.id(),
                    offered: offered.id(),
                },
                Vec::new(),
            );
        }
        if !offered.is_well_formed() {
            warn!("discarding malformed view {}", offered.id());
            return (InstallOutcome::Malformed, Vec::new());
        }
        if offered.id() <= self.view.id() {
            debug!(
                "ignoring stale view {} (installed {})",
                offered.id(),
                self.view.id()
            );
            return (
                InstallOutcome::Stale {
                    current: self.view.id(),
                    offered: offered.id(),
                },
                Vec::new(),
            );
        }
        if !offered.contains(&self.local) {
            tracing::error!("view {} no longer contains this node", offered.id());
            self.lifecycle = NodeLifecycle::Departed;
            return (
                InstallOutcome::Excluded,
                vec![Action::Shutdown {
                    reason: ExitReason::Removed,
                }],
            );
        }

        let outcome = InstallOutcome::Installed {
            old: self.view.id(),
            new: offered.id(),
        };
        self.apply(offered, graceful);

        // A handoff may have made this node coordinator with departures
        // still queued from its own detector.
        let actions = if self.is_coordinator() {
            self.try_flush_departures()
        } else {
            Vec::new()
        };
        (outcome, actions)
    }

    /// Clears the in-flight-change guard once the service finished sending a
    /// broadcast, and publishes any departures queued behind it.
    pub fn broadcast_complete(&mut self) -> Vec<Action> {
        self.broadcast_in_flight = false;
        if self.lifecycle == NodeLifecycle::Departed {
            return Vec::new();
        }
        if self.is_coordinator() {
            return self.try_flush_departures();
        }
        Vec::new()
    }

    fn try_flush_departures(&mut self) -> Vec<Action> {
        if self.broadcast_in_flight
            || (self.failed.is_empty() && self.pending_graceful.is_empty())
        {
            return Vec::new();
        }
        self.build_and_install(Vec::new())
    }

    /// Builds the next view: survivors of the current view, minus ratified
    /// failures and announced leavers, plus admitted members in acceptance
    /// order, under the next identifier, with the coordinator re-elected.
    fn build_and_install(&mut self, admitted: Vec<MemberIdentity>) -> Vec<Action> {
        let mut members: Vec<MemberIdentity> = self
            .view
            .members()
            .iter()
            .filter(|m| !self.failed.contains(m) && !self.pending_graceful.contains(m))
            .cloned()
            .collect();
        members.extend(admitted);

        let Some(coordinator) = elect(&members, Some(self.view.coordinator())).cloned() else {
            warn!("refusing to build an empty view");
            return Vec::new();
        };

        let graceful = mem::take(&mut self.pending_graceful);
        let next = View::new(self.view.id().next(), members, coordinator);
        self.apply(next.clone(), &graceful);

        self.broadcast_in_flight = true;
        let recipients: Vec<MemberIdentity> = next
            .members()
            .iter()
            .filter(|m| **m != self.local)
            .cloned()
            .collect();
        vec![Action::Broadcast {
            view: next,
            graceful,
            recipients,
        }]
    }

    /// Replaces the installed view and fires listeners: view-changed first,
    /// then one member-departed per removed member, all synchronous and in
    /// view order.
    fn apply(&mut self, next: View, graceful: &[MemberIdentity]) {
        let departed: Vec<MemberIdentity> = self
            .view
            .members()
            .iter()
            .filter(|m| !next.contains(m))
            .cloned()
            .collect();

        self.failed.retain(|m| next.contains(m));
        self.pending_graceful.retain(|m| next.contains(m));
        self.lifecycle = if next.coordinator() == &self.local {
            NodeLifecycle::Coordinator
        } else {
            NodeLifecycle::Member
        };

        let old = mem::replace(&mut self.view, next);
        info!("installed {}", self.view);
        self.listeners.notify_view_changed(&old, &self.view);
        for member in departed {
            let reason = if graceful.contains(&member) {
                DepartureReason::Graceful
            } else {
                DepartureReason::Failed
            };
            self.listeners.notify_member_departed(&member, reason);
        }
    }
}
