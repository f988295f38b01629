//! Membership Listener Interface
//!
//! The outward notification channel. Dependent subsystems (replication,
//! cache coherence, routing) register listeners and receive callbacks
//! synchronously, in view-identifier order, never concurrently and never
//! skipped. The very first notification after founding or admission carries
//! the same view as both `old` and `new`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::types::{MemberIdentity, View};

/// Why a member is no longer in the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepartureReason {
    /// The member announced its departure.
    Graceful,
    /// The member was removed after failure detection.
    Failed,
}

pub trait MembershipListener: Send + Sync {
    fn on_view_changed(&self, old: &View, new: &View);

    fn on_member_departed(&self, member: &MemberIdentity, reason: DepartureReason);
}

/// The registered listeners of one node. Dispatch happens only from the view
/// manager's single mutation path, which is what guarantees ordering.
pub struct ListenerSet {
    listeners: Vec<Arc<dyn MembershipListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn register(&mut self, listener: Arc<dyn MembershipListener>) {
        self.listeners.push(listener);
    }

    pub fn notify_view_changed(&self, old: &View, new: &View) {
        for listener in &self.listeners {
            listener.on_view_changed(old, new);
        }
    }

    pub fn notify_member_departed(&self, member: &MemberIdentity, reason: DepartureReason) {
        for listener in &self.listeners {
            listener.on_member_departed(member, reason);
        }
    }
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs every membership event. Registered by the node binary so operators
/// can follow view history from the process output.
pub struct LoggingListener;

impl MembershipListener for LoggingListener {
    fn on_view_changed(&self, old: &View, new: &View) {
        tracing::info!("view changed: {} -> {}", old, new);
    }

    fn on_member_departed(&self, member: &MemberIdentity, reason: DepartureReason) {
        match reason {
            DepartureReason::Graceful => tracing::info!("member departed gracefully: {}", member),
            DepartureReason::Failed => tracing::warn!("member crashed: {}", member),
        }
    }
}
