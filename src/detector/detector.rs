use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::policy::ConfirmationPolicy;
use super::types::{Escalation, PeerStatus, SuspicionRecord};
use crate::membership::types::MemberIdentity;

/// Tracks liveness for every peer in the current view.
///
/// Records are updated concurrently by the receive path and read by the
/// periodic sweep; the proposed transitions go to the view manager for
/// ratification.
pub struct FailureDetector {
    records: DashMap<MemberIdentity, SuspicionRecord>,
    suspicion_timeout: Duration,
    failure_timeout: Duration,
    policy: Arc<dyn ConfirmationPolicy>,
}

impl FailureDetector {
    pub fn new(
        suspicion_timeout: Duration,
        failure_timeout: Duration,
        policy: Arc<dyn ConfirmationPolicy>,
    ) -> Self {
        Self {
            records: DashMap::new(),
            suspicion_timeout,
            failure_timeout,
            policy,
        }
    }

    /// Starts tracking a peer if it is not tracked yet. Called when a view
    /// installs so that a member which never says anything still times out.
    pub fn track(&self, peer: &MemberIdentity) {
        self.track_at(peer, Instant::now());
    }

    pub fn track_at(&self, peer: &MemberIdentity, now: Instant) {
        self.records
            .entry(peer.clone())
            .or_insert_with(|| SuspicionRecord::fresh(now));
    }

    /// Records a sign of life from a peer. Recovers SUSPECT back to ALIVE;
    /// FAILED is terminal until the peer is forgotten.
    pub fn observe(&self, peer: &MemberIdentity) {
        self.observe_at(peer, Instant::now());
    }

    pub fn observe_at(&self, peer: &MemberIdentity, now: Instant) {
        let mut record = self
            .records
            .entry(peer.clone())
            .or_insert_with(|| SuspicionRecord::fresh(now));

        record.last_heard = now;
        if record.status == PeerStatus::Suspect {
            info!("{} recovered from suspicion", peer);
            record.status = PeerStatus::Alive;
            record.suspected_at = None;
            record.reported_by.clear();
        }
    }

    /// Records another member's suspicion about a peer. Starts the SUSPECT
    /// clock if the peer looked alive locally, and stacks up the evidence
    /// the confirmation policy counts.
    pub fn report(&self, target: &MemberIdentity, reporter: MemberIdentity) {
        self.report_at(target, reporter, Instant::now());
    }

    pub fn report_at(&self, target: &MemberIdentity, reporter: MemberIdentity, now: Instant) {
        let mut record = self
            .records
            .entry(target.clone())
            .or_insert_with(|| SuspicionRecord::fresh(now));

        if !record.reported_by.contains(&reporter) {
            debug!("{} reported suspect by {}", target, reporter);
            record.reported_by.push(reporter);
        }
        if record.status == PeerStatus::Alive {
            warn!("{} suspected on peer report", target);
            record.status = PeerStatus::Suspect;
            record.suspected_at = Some(now);
        }
    }

    /// Advances every record's clock and returns the proposed transitions:
    /// ALIVE peers silent past `suspicion_timeout` turn SUSPECT; SUSPECT
    /// peers silent a further `failure_timeout` and confirmed by the policy
    /// turn FAILED.
    pub fn sweep(&self, now: Instant) -> Vec<Escalation> {
        let mut escalations = Vec::new();

        for mut entry in self.records.iter_mut() {
            let (peer, record) = entry.pair_mut();
            match record.status {
                PeerStatus::Alive => {
                    let silent = now.saturating_duration_since(record.last_heard);
                    if silent > self.suspicion_timeout {
                        warn!("{} suspected (silent for {:?})", peer, silent);
                        record.status = PeerStatus::Suspect;
                        record.suspected_at = Some(now);
                        escalations.push(Escalation::Suspected(peer.clone()));
                    }
                }
                PeerStatus::Suspect => {
                    let since_suspected = record
                        .suspected_at
                        .map(|at| now.saturating_duration_since(at))
                        .unwrap_or_default();
                    if since_suspected > self.failure_timeout {
                        if self.policy.confirm_failure(record) {
                            warn!("{} declared failed (suspect for {:?})", peer, since_suspected);
                            record.status = PeerStatus::Failed;
                            escalations.push(Escalation::Failed(peer.clone()));
                        } else {
                            debug!("{} past failure timeout, awaiting confirmation", peer);
                        }
                    }
                }
                PeerStatus::Failed => {}
            }
        }

        escalations
    }

    /// Drops a peer's record once it left the view. A rejoin under a new
    /// identity starts from a fresh record.
    pub fn forget(&self, peer: &MemberIdentity) {
        self.records.remove(peer);
    }

    pub fn status(&self, peer: &MemberIdentity) -> Option<PeerStatus> {
        self.records.get(peer).map(|r| r.status)
    }

    /// Peers currently under suspicion. The quorum check counts these as
    /// unreachable alongside confirmed failures.
    pub fn suspects(&self) -> Vec<MemberIdentity> {
        self.records
            .iter()
            .filter(|entry| entry.value().status == PeerStatus::Suspect)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }
}
