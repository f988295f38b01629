//! Membership Service
//!
//! The running node. Owns the datagram transport, the failure detector, and
//! the background loops (receive, heartbeat, sweep), and funnels every state
//! change through one serialized command channel into the [`ViewManager`].
//! The loops never touch view state directly: they submit commands and read
//! the immutable snapshot published after each one, which is what keeps
//! concurrent joins, suspicions, and installs applied in order.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::address::HostAddress;
use crate::config::MembershipConfig;
use crate::detector::{ConfirmationPolicy, Escalation, FailureDetector, PeerStatus, TimeoutOnly};
use crate::discovery::JoinClient;
use crate::error::{ExitReason, JoinRejection};
use crate::membership::listener::ListenerSet;
use crate::membership::protocol::{decode, encode, JoinCandidate, MembershipMessage};
use crate::membership::types::{MemberIdentity, NodeLifecycle, View};
use crate::membership::view::{Action, JoinGrant, ViewManager};
use crate::transport::Transport;

/// Immutable read of the node's membership state, republished after every
/// command the view manager processes.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub view: View,
    pub lifecycle: NodeLifecycle,
}

/// The serialized mutation path into the view manager.
enum ViewCommand {
    RequestJoin {
        candidate: JoinCandidate,
        reply: oneshot::Sender<Result<JoinGrant, JoinRejection>>,
    },
    InstallView {
        view: View,
        graceful: Vec<MemberIdentity>,
    },
    MemberLeaving {
        member: MemberIdentity,
    },
    PeersFailed {
        targets: Vec<MemberIdentity>,
        suspects: Vec<MemberIdentity>,
    },
    BroadcastComplete,
    Leave {
        reply: oneshot::Sender<()>,
    },
}

/// Pieces handed to the manager loop when [`MembershipService::start`] runs.
struct Startup {
    manager: ViewManager,
    commands_rx: mpsc::Receiver<ViewCommand>,
    snapshot_tx: watch::Sender<Snapshot>,
}

pub struct MembershipService {
    config: MembershipConfig,
    local: MemberIdentity,
    transport: Arc<dyn Transport>,
    detector: Arc<FailureDetector>,
    commands: mpsc::Sender<ViewCommand>,
    snapshot_rx: watch::Receiver<Snapshot>,
    shutdown_tx: watch::Sender<Option<ExitReason>>,
    startup: Mutex<Option<Startup>>,
}

impl MembershipService {
    /// Creates the node and brings it into a cluster: founding one when the
    /// locator list names nobody else, joining through the locators
    /// otherwise. Joining runs the full discovery protocol and fails fatally
    /// once every locator and attempt is exhausted.
    pub async fn new(
        config: MembershipConfig,
        transport: Arc<dyn Transport>,
        listeners: ListenerSet,
    ) -> Result<Arc<Self>> {
        config.validate().context("invalid membership configuration")?;

        let policy: Arc<dyn ConfirmationPolicy> = Arc::new(TimeoutOnly);
        let detector = Arc::new(FailureDetector::new(
            config.suspicion_timeout,
            config.failure_timeout,
            policy,
        ));

        let manager = if config.is_founder() {
            let local =
                MemberIdentity::new(config.advertised.clone(), 1, config.role, config.weight);
            ViewManager::found(local, config.quorum_threshold, listeners)
        } else {
            info!("joining cluster via {} locator(s)", config.locators.len());
            let admission = JoinClient::new(Arc::clone(&transport), &config)
                .join()
                .await?;
            ViewManager::admitted(
                admission.identity,
                admission.view,
                config.quorum_threshold,
                listeners,
            )
        };

        let local = manager.local().clone();
        for member in manager.view().members() {
            if *member != local {
                detector.track(member);
            }
        }

        let (commands, commands_rx) = mpsc::channel(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot {
            view: manager.view().clone(),
            lifecycle: manager.lifecycle(),
        });
        let (shutdown_tx, _) = watch::channel(None::<ExitReason>);

        Ok(Arc::new(Self {
            config,
            local,
            transport,
            detector,
            commands,
            snapshot_rx,
            shutdown_tx,
            startup: Mutex::new(Some(Startup {
                manager,
                commands_rx,
                snapshot_tx,
            })),
        }))
    }

    /// Spawns the background loops. Called once after `new`.
    pub async fn start(self: Arc<Self>) {
        info!("starting membership service as {}", self.local);

        let startup = self
            .startup
            .lock()
            .unwrap()
            .take()
            .expect("membership service started twice");

        let _manager_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service
                    .manager_loop(startup.manager, startup.commands_rx, startup.snapshot_tx)
                    .await;
            })
        };

        let _receive_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.receive_loop().await;
            })
        };

        let _heartbeat_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.heartbeat_loop().await;
            })
        };

        let _sweep_handle = {
            let service = self.clone();
            tokio::spawn(async move {
                service.sweep_loop().await;
            })
        };

        info!("all background loops started");
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn current_view(&self) -> View {
        self.snapshot_rx.borrow().view.clone()
    }

    pub fn lifecycle(&self) -> NodeLifecycle {
        self.snapshot_rx.borrow().lifecycle
    }

    pub fn local(&self) -> &MemberIdentity {
        &self.local
    }

    pub fn peer_status(&self, peer: &MemberIdentity) -> Option<PeerStatus> {
        self.detector.status(peer)
    }

    pub fn shutdown_reason(&self) -> Option<ExitReason> {
        *self.shutdown_tx.borrow()
    }

    /// Resolves once local participation has ended, for whatever reason.
    pub async fn wait_shutdown(&self) -> ExitReason {
        let mut shutdown = self.shutdown_tx.subscribe();
        loop {
            if let Some(reason) = *shutdown.borrow() {
                return reason;
            }
            if shutdown.changed().await.is_err() {
                return ExitReason::LeftGracefully;
            }
        }
    }

    /// Leaves the cluster gracefully: announces the departure (or, as
    /// coordinator, publishes a final handoff view) and stops participation.
    pub async fn leave(&self) {
        if self.shutdown_reason().is_some() {
            return;
        }

        let snapshot = self.snapshot();
        if snapshot.lifecycle == NodeLifecycle::Member {
            let message = MembershipMessage::Leave {
                from: self.local.clone(),
            };
            if let Ok(payload) = encode(&message) {
                self.send_to_address(&snapshot.view.coordinator().address, &payload)
                    .await;
            }
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(ViewCommand::Leave { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    // ------------------------------------------------------------
    // Background loops
    // ------------------------------------------------------------

    /// The single writer. Every mutation of membership state happens here,
    /// one command at a time, in arrival order.
    async fn manager_loop(
        self: Arc<Self>,
        mut manager: ViewManager,
        mut commands: mpsc::Receiver<ViewCommand>,
        snapshot_tx: watch::Sender<Snapshot>,
    ) {
        while let Some(command) = commands.recv().await {
            let previous = snapshot_tx.borrow().view.clone();

            match command {
                ViewCommand::RequestJoin { candidate, reply } => {
                    match manager.request_join(candidate) {
                        Ok((grant, actions)) => {
                            let _ = reply.send(Ok(grant));
                            self.execute(actions);
                        }
                        Err(rejection) => {
                            let _ = reply.send(Err(rejection));
                        }
                    }
                }
                ViewCommand::InstallView { view, graceful } => {
                    let (_, actions) = manager.install_view(view, &graceful);
                    self.execute(actions);
                }
                ViewCommand::MemberLeaving { member } => {
                    let actions = manager.member_leaving(member);
                    self.execute(actions);
                }
                ViewCommand::PeersFailed { targets, suspects } => {
                    let actions = manager.peers_failed(targets, &suspects);
                    self.execute(actions);
                }
                ViewCommand::BroadcastComplete => {
                    let actions = manager.broadcast_complete();
                    self.execute(actions);
                }
                ViewCommand::Leave { reply } => {
                    // The final handoff view must be on the wire before the
                    // caller proceeds to exit, so this broadcast is awaited
                    // instead of spawned.
                    for action in manager.leave_local() {
                        match action {
                            Action::Broadcast {
                                view,
                                graceful,
                                recipients,
                            } => {
                                self.broadcast_view(&view, &graceful, &recipients).await;
                            }
                            Action::Shutdown { reason } => self.shutdown(reason),
                        }
                    }
                    self.shutdown(ExitReason::LeftGracefully);
                    let _ = reply.send(());
                }
            }

            self.sync_detector(&previous, manager.view());
            snapshot_tx.send_replace(Snapshot {
                view: manager.view().clone(),
                lifecycle: manager.lifecycle(),
            });

            if self.shutdown_reason().is_some() {
                break;
            }
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if shutdown.borrow().is_some() {
                        break;
                    }
                }
                received = self.transport.recv() => match received {
                    Ok((payload, src)) => match decode(&payload) {
                        Ok(message) => self.handle_message(message, src).await,
                        Err(error) => {
                            warn!("undecodable datagram from {}: {:#}", src, error);
                        }
                    },
                    Err(error) => {
                        warn!("transport receive failed: {:#}", error);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }
    }

    async fn handle_message(&self, message: MembershipMessage, src: std::net::SocketAddr) {
        match message {
            MembershipMessage::Ping { from } => {
                self.detector.observe(&from);
                let ack = MembershipMessage::Ack {
                    from: self.local.clone(),
                };
                if let Ok(payload) = encode(&ack) {
                    if let Err(error) = self.transport.send(src, &payload).await {
                        debug!("failed to ack {}: {:#}", from, error);
                    }
                }
            }
            MembershipMessage::Ack { from } => {
                self.detector.observe(&from);
            }
            MembershipMessage::FindCoordinator { token } => {
                let coordinator = self.snapshot_rx.borrow().view.coordinator().address.clone();
                let reply = MembershipMessage::CoordinatorReply { token, coordinator };
                if let Ok(payload) = encode(&reply) {
                    let _ = self.transport.send(src, &payload).await;
                }
            }
            MembershipMessage::JoinRequest { token, candidate } => {
                let (reply_tx, reply_rx) = oneshot::channel();
                if self
                    .commands
                    .send(ViewCommand::RequestJoin {
                        candidate,
                        reply: reply_tx,
                    })
                    .await
                    .is_err()
                {
                    return;
                }
                let reply = match reply_rx.await {
                    Ok(Ok(grant)) => MembershipMessage::JoinGranted {
                        token,
                        identity: grant.identity,
                        view: grant.view,
                    },
                    Ok(Err(rejection)) => MembershipMessage::JoinRefused { token, rejection },
                    Err(_) => return,
                };
                if let Ok(payload) = encode(&reply) {
                    let _ = self.transport.send(src, &payload).await;
                }
            }
            MembershipMessage::Leave { from } => {
                let _ = self
                    .commands
                    .send(ViewCommand::MemberLeaving { member: from })
                    .await;
            }
            MembershipMessage::Suspect { target, reporter } => {
                if target != self.local {
                    self.detector.report(&target, reporter);
                }
            }
            MembershipMessage::InstallView { view, graceful } => {
                let _ = self
                    .commands
                    .send(ViewCommand::InstallView { view, graceful })
                    .await;
            }
            // Discovery replies outside an active join are stale.
            MembershipMessage::CoordinatorReply { .. }
            | MembershipMessage::JoinGranted { .. }
            | MembershipMessage::JoinRefused { .. } => {
                debug!("ignoring stale discovery reply from {}", src);
            }
        }
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut interval = tokio::time::interval(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if shutdown.borrow().is_some() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let view = self.snapshot_rx.borrow().view.clone();
                    let message = MembershipMessage::Ping {
                        from: self.local.clone(),
                    };
                    let payload = match encode(&message) {
                        Ok(payload) => payload,
                        Err(error) => {
                            tracing::error!("failed to serialize heartbeat: {:#}", error);
                            continue;
                        }
                    };
                    for member in view.members() {
                        if *member == self.local {
                            continue;
                        }
                        self.send_to_address(&member.address, &payload).await;
                    }
                }
            }
        }
    }

    /// Advances the suspicion clocks on its own schedule, decoupled from
    /// message handling. Suspicions are gossiped to the coordinator; locally
    /// confirmed failures go to the view manager for ratification together
    /// with the current suspect set as quorum evidence.
    async fn sweep_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut interval = tokio::time::interval(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if shutdown.borrow().is_some() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let escalations = self.detector.sweep(Instant::now());
                    if escalations.is_empty() {
                        continue;
                    }

                    let snapshot = self.snapshot_rx.borrow().clone();
                    let mut failed = Vec::new();
                    for escalation in escalations {
                        match escalation {
                            Escalation::Suspected(peer) => {
                                let coordinator = snapshot.view.coordinator();
                                if snapshot.lifecycle != NodeLifecycle::Coordinator
                                    && peer != *coordinator
                                {
                                    let report = MembershipMessage::Suspect {
                                        target: peer,
                                        reporter: self.local.clone(),
                                    };
                                    if let Ok(payload) = encode(&report) {
                                        self.send_to_address(&coordinator.address, &payload).await;
                                    }
                                }
                            }
                            Escalation::Failed(peer) => failed.push(peer),
                        }
                    }

                    if !failed.is_empty() {
                        let suspects = self.detector.suspects();
                        let _ = self
                            .commands
                            .send(ViewCommand::PeersFailed {
                                targets: failed,
                                suspects,
                            })
                            .await;
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------

    /// Performs the side effects a state transition produced. Broadcasts run
    /// on their own task and report back through `BroadcastComplete`, which
    /// is what holds the in-flight-change guard open while datagrams are
    /// still going out.
    fn execute(self: &Arc<Self>, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Broadcast {
                    view,
                    graceful,
                    recipients,
                } => {
                    let service = Arc::clone(self);
                    tokio::spawn(async move {
                        service.broadcast_view(&view, &graceful, &recipients).await;
                        let _ = service.commands.send(ViewCommand::BroadcastComplete).await;
                    });
                }
                Action::Shutdown { reason } => self.shutdown(reason),
            }
        }
    }

    async fn broadcast_view(
        &self,
        view: &View,
        graceful: &[MemberIdentity],
        recipients: &[MemberIdentity],
    ) {
        let message = MembershipMessage::InstallView {
            view: view.clone(),
            graceful: graceful.to_vec(),
        };
        let payload = match encode(&message) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!("failed to serialize view broadcast: {:#}", error);
                return;
            }
        };
        debug!("broadcasting {} to {} member(s)", view, recipients.len());
        for recipient in recipients {
            self.send_to_address(&recipient.address, &payload).await;
        }
    }

    async fn send_to_address(&self, address: &HostAddress, payload: &[u8]) {
        let endpoint =
            match tokio::time::timeout(self.config.join_timeout, address.resolve()).await {
                Ok(Ok(endpoint)) => endpoint,
                Ok(Err(error)) => {
                    warn!("cannot resolve {}: {}", address, error);
                    return;
                }
                Err(_) => {
                    warn!("resolving {} timed out", address);
                    return;
                }
            };
        if let Err(error) = self.transport.send(endpoint, payload).await {
            warn!("failed to send to {}: {:#}", address, error);
        }
    }

    /// Keeps the detector's working set aligned with the installed view:
    /// newly admitted members are tracked, removed ones forgotten so a
    /// rejoin starts from a fresh record.
    fn sync_detector(&self, previous: &View, current: &View) {
        for member in current.members() {
            if *member != self.local && !previous.contains(member) {
                self.detector.track(member);
            }
        }
        for member in previous.members() {
            if !current.contains(member) {
                self.detector.forget(member);
            }
        }
    }

    fn shutdown(&self, reason: ExitReason) {
        self.shutdown_tx.send_if_modified(|current| {
            if current.is_none() {
                info!("membership participation ending: {}", reason);
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::address::HostAddress;
    use crate::config::MembershipConfig;
    use crate::error::ExitReason;
    use crate::membership::listener::ListenerSet;
    use crate::membership::types::NodeLifecycle;
    use crate::service::MembershipService;
    use crate::transport::{MemoryHub, Transport};

    const HOST: &str = "10.9.1.1";

    fn addr(port: u16) -> SocketAddr {
        format!("{HOST}:{port}").parse().unwrap()
    }

    /// Fast protocol timings so whole cluster lifecycles fit in a test.
    async fn node(
        hub: &Arc<MemoryHub>,
        port: u16,
        locator_ports: Vec<u16>,
    ) -> Arc<MembershipService> {
        let bind = addr(port);
        let mut config = MembershipConfig::new(bind, HostAddress::new(HOST, port));
        config.locators = locator_ports
            .into_iter()
            .map(|p| HostAddress::new(HOST, p))
            .collect();
        config.heartbeat_interval = Duration::from_millis(50);
        config.suspicion_timeout = Duration::from_millis(200);
        config.failure_timeout = Duration::from_millis(250);
        config.join_timeout = Duration::from_millis(150);

        let transport: Arc<dyn Transport> = Arc::new(hub.endpoint(bind));
        let service = MembershipService::new(config, transport, ListenerSet::new())
            .await
            .expect("service starts");
        Arc::clone(&service).start().await;
        service
    }

    async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !condition() {
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {what}");
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    // ============================================================
    // FOUNDING & JOINING
    // ============================================================

    #[tokio::test]
    async fn test_founder_starts_as_coordinator() {
        let hub = MemoryHub::new();
        let founder = node(&hub, 5000, vec![]).await;

        let snapshot = founder.snapshot();
        assert_eq!(snapshot.lifecycle, NodeLifecycle::Coordinator);
        assert_eq!(snapshot.view.id().value(), 1);
        assert_eq!(snapshot.view.len(), 1);
    }

    #[tokio::test]
    async fn test_joiner_is_admitted_and_both_sides_converge() {
        let hub = MemoryHub::new();
        let founder = node(&hub, 5000, vec![]).await;
        let joiner = node(&hub, 5001, vec![5000]).await;

        assert_eq!(joiner.lifecycle(), NodeLifecycle::Member);
        assert!(joiner.current_view().contains(joiner.local()));

        let admitted = joiner.local().clone();
        wait_for("founder to install the two-member view", || {
            founder.current_view().contains(&admitted)
        })
        .await;
        wait_for("views to agree", || {
            founder.current_view() == joiner.current_view()
        })
        .await;
    }

    #[tokio::test]
    async fn test_join_succeeds_through_the_second_locator() {
        let hub = MemoryHub::new();
        let _founder = node(&hub, 5000, vec![]).await;

        // 5999 never binds: requests to it are lost until the timeout.
        let joiner = node(&hub, 5001, vec![5999, 5000]).await;
        assert_eq!(joiner.lifecycle(), NodeLifecycle::Member);
        assert!(joiner.current_view().contains(joiner.local()));
    }

    // ============================================================
    // FAILURE & PARTITION
    // ============================================================

    #[tokio::test]
    async fn test_silent_member_is_suspected_then_removed() {
        let hub = MemoryHub::new();
        let founder = node(&hub, 5100, vec![]).await;
        let second = node(&hub, 5101, vec![5100]).await;
        let third = node(&hub, 5102, vec![5100]).await;
        let isolated = third.local().clone();
        wait_for("three-member view", || founder.current_view().len() == 3).await;

        hub.partition(&[addr(5102)], &[addr(5100), addr(5101)]);

        wait_for("removal view on the coordinator", || {
            !founder.current_view().contains(&isolated)
        })
        .await;
        wait_for("removal view on the second member", || {
            !second.current_view().contains(&isolated)
        })
        .await;
        assert_eq!(founder.current_view().len(), 2);

        // The isolated side holds one third of the weight and exits.
        wait_for("minority exit", || {
            third.shutdown_reason() == Some(ExitReason::QuorumLost)
        })
        .await;
    }

    #[tokio::test]
    async fn test_majority_survives_a_partition_and_the_minority_exits() {
        let hub = MemoryHub::new();
        let n1 = node(&hub, 6000, vec![]).await;
        let n2 = node(&hub, 6001, vec![6000]).await;
        let n3 = node(&hub, 6002, vec![6000]).await;
        let n4 = node(&hub, 6003, vec![6000]).await;
        let n5 = node(&hub, 6004, vec![6000]).await;

        wait_for("five-member view everywhere", || {
            [&n1, &n2, &n3, &n4, &n5]
                .iter()
                .all(|n| n.current_view().len() == 5)
        })
        .await;

        // The sitting coordinator lands on the minority side.
        hub.partition(
            &[addr(6000), addr(6001)],
            &[addr(6002), addr(6003), addr(6004)],
        );

        wait_for("minority exits on quorum loss", || {
            n1.shutdown_reason() == Some(ExitReason::QuorumLost)
                && n2.shutdown_reason() == Some(ExitReason::QuorumLost)
        })
        .await;

        wait_for("majority converges on a three-member view", || {
            [&n3, &n4, &n5].iter().all(|n| {
                let view = n.current_view();
                view.len() == 3
                    && view.contains(n3.local())
                    && view.contains(n4.local())
                    && view.contains(n5.local())
            })
        })
        .await;

        // The survivors agree on a coordinator from among themselves, and
        // exactly one of them holds the role.
        assert_eq!(
            n3.current_view().coordinator(),
            n4.current_view().coordinator()
        );
        assert_eq!(
            n4.current_view().coordinator(),
            n5.current_view().coordinator()
        );
        let coordinator = n3.current_view().coordinator().clone();
        assert!([&n3, &n4, &n5].iter().any(|n| *n.local() == coordinator));
        assert_eq!(
            [&n3, &n4, &n5]
                .iter()
                .filter(|n| n.lifecycle() == NodeLifecycle::Coordinator)
                .count(),
            1
        );
        assert!(n3.shutdown_reason().is_none());
    }

    // ============================================================
    // GRACEFUL DEPARTURE
    // ============================================================

    #[tokio::test]
    async fn test_graceful_leave_publishes_a_view_without_the_leaver() {
        let hub = MemoryHub::new();
        let founder = node(&hub, 7000, vec![]).await;
        let joiner = node(&hub, 7001, vec![7000]).await;
        let leaver = joiner.local().clone();
        wait_for("two-member view", || founder.current_view().contains(&leaver)).await;

        joiner.leave().await;
        assert_eq!(joiner.shutdown_reason(), Some(ExitReason::LeftGracefully));

        wait_for("founder removes the leaver", || {
            !founder.current_view().contains(&leaver)
        })
        .await;
        assert_eq!(founder.lifecycle(), NodeLifecycle::Coordinator);
    }

    #[tokio::test]
    async fn test_departing_coordinator_hands_off_before_exit() {
        let hub = MemoryHub::new();
        let founder = node(&hub, 7100, vec![]).await;
        let joiner = node(&hub, 7101, vec![7100]).await;
        wait_for("two-member view", || founder.current_view().len() == 2).await;

        founder.leave().await;
        assert_eq!(founder.shutdown_reason(), Some(ExitReason::LeftGracefully));

        wait_for("survivor takes over", || {
            joiner.lifecycle() == NodeLifecycle::Coordinator && joiner.current_view().len() == 1
        })
        .await;
    }
}
