//! Membership Module Tests
//!
//! Validates the view state machine and its pure helpers. No sockets, no
//! timers; every scenario drives the manager directly.
//!
//! ## Test Scopes
//! - **Election & Quorum**: Deterministic coordinator choice and the weight
//!   arithmetic behind partition survival.
//! - **State Machine**: Admission, the monotonic install guard, failure
//!   ratification, failover, and graceful departure.
//! - **Listeners & Wire**: Ordered event dispatch and bincode round-trips of
//!   the protocol messages.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::address::HostAddress;
    use crate::error::{ExitReason, JoinRejection};
    use crate::membership::election::elect;
    use crate::membership::listener::{DepartureReason, ListenerSet, MembershipListener};
    use crate::membership::protocol::{decode, encode, JoinCandidate, MembershipMessage};
    use crate::membership::quorum::{has_quorum, surviving_fraction, total_weight};
    use crate::membership::types::{MemberIdentity, MemberRole, NodeLifecycle, View, ViewId};
    use crate::membership::view::{Action, InstallOutcome, ViewManager};

    fn member(port: u16, incarnation: u64) -> MemberIdentity {
        MemberIdentity::new(
            HostAddress::new("10.0.0.1", port),
            incarnation,
            MemberRole::Server,
            1,
        )
    }

    fn locator(port: u16, incarnation: u64) -> MemberIdentity {
        MemberIdentity::new(
            HostAddress::new("10.0.0.1", port),
            incarnation,
            MemberRole::Locator,
            1,
        )
    }

    fn candidate(port: u16) -> JoinCandidate {
        JoinCandidate {
            address: HostAddress::new("10.0.0.1", port),
            role: MemberRole::Server,
            weight: 1,
        }
    }

    /// A view carrying the given identifier, coordinator elected fresh.
    fn view(id: u64, members: Vec<MemberIdentity>) -> View {
        let mut view_id = ViewId::initial();
        for _ in 1..id {
            view_id = view_id.next();
        }
        let coordinator = elect(&members, None).expect("non-empty view").clone();
        View::new(view_id, members, coordinator)
    }

    // ============================================================
    // COORDINATOR ELECTION
    // ============================================================

    #[test]
    fn test_elect_prefers_oldest_eligible_member() {
        let members = vec![member(3, 3), member(1, 1), member(2, 2)];
        assert_eq!(elect(&members, None), Some(&members[1]));
    }

    #[test]
    fn test_elect_keeps_sitting_coordinator() {
        let members = vec![member(1, 1), member(2, 2)];
        let sitting = members[1].clone();
        assert_eq!(elect(&members, Some(&sitting)), Some(&members[1]));
    }

    #[test]
    fn test_elect_skips_locators_while_members_exist() {
        let members = vec![locator(1, 1), member(2, 5)];
        assert_eq!(elect(&members, None), Some(&members[1]));

        // A sitting locator coordinator yields to an eligible member.
        let sitting = members[0].clone();
        assert_eq!(elect(&members, Some(&sitting)), Some(&members[1]));
    }

    #[test]
    fn test_elect_falls_back_to_oldest_locator() {
        let members = vec![locator(2, 2), locator(1, 1)];
        assert_eq!(elect(&members, None), Some(&members[1]));
    }

    #[test]
    fn test_elect_is_pure() {
        let members = vec![member(1, 4), member(2, 2), member(3, 7)];
        let first = elect(&members, None).cloned();
        for _ in 0..8 {
            assert_eq!(elect(&members, None).cloned(), first);
        }
    }

    #[test]
    fn test_elect_on_empty_list_is_none() {
        assert_eq!(elect(&[], None), None);
    }

    // ============================================================
    // QUORUM ARITHMETIC
    // ============================================================

    #[test]
    fn test_quorum_majority_split_three_two() {
        let members: Vec<_> = (1u16..=5).map(|i| member(i, u64::from(i))).collect();
        let v = view(1, members.clone());

        // Losing two of five keeps the majority.
        assert!(has_quorum(&v, &members[3..], 0.5));
        // Losing three does not.
        assert!(!has_quorum(&v, &members[2..], 0.5));
    }

    #[test]
    fn test_quorum_exact_half_loses_on_both_sides() {
        let members: Vec<_> = (1u16..=4).map(|i| member(i, u64::from(i))).collect();
        let v = view(1, members.clone());

        assert!(!has_quorum(&v, &members[..2], 0.5));
        assert!(!has_quorum(&v, &members[2..], 0.5));
    }

    #[test]
    fn test_quorum_weights_shift_the_balance() {
        let mut heavy = member(1, 1);
        heavy.weight = 3;
        let members = vec![heavy, member(2, 2), member(3, 3)];
        let v = view(1, members.clone());
        assert_eq!(total_weight(&v), 5);

        // Losing both light members keeps 3/5 of the weight.
        assert!(has_quorum(&v, &members[1..], 0.5));
        // Losing the heavy one leaves 2/5.
        assert!(!has_quorum(&v, &members[..1], 0.5));
        assert!((surviving_fraction(&v, &members[..1]) - 0.4).abs() < f64::EPSILON);
    }

    // ============================================================
    // ADMISSION
    // ============================================================

    #[test]
    fn test_founding_creates_single_member_view() {
        let local = member(1, 1);
        let manager = ViewManager::found(local.clone(), 0.5, ListenerSet::new());

        assert_eq!(manager.view().id().value(), 1);
        assert_eq!(manager.view().members().to_vec(), vec![local.clone()]);
        assert_eq!(manager.view().coordinator(), &local);
        assert_eq!(manager.lifecycle(), NodeLifecycle::Coordinator);
    }

    #[test]
    fn test_join_appends_candidate_with_next_incarnation() {
        let local = member(1, 1);
        let mut manager = ViewManager::found(local.clone(), 0.5, ListenerSet::new());

        let (grant, actions) = manager.request_join(candidate(2)).expect("admission");
        assert_eq!(grant.identity.incarnation, 2);
        assert_eq!(grant.view.id().value(), 2);
        assert_eq!(
            grant.view.members().to_vec(),
            vec![local.clone(), grant.identity.clone()]
        );
        assert_eq!(grant.view.coordinator(), &local);

        // The new view goes out to everyone but the coordinator itself.
        match &actions[..] {
            [Action::Broadcast {
                view, recipients, ..
            }] => {
                assert_eq!(view.id().value(), 2);
                assert_eq!(recipients.to_vec(), vec![grant.identity.clone()]);
            }
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[test]
    fn test_join_rejects_address_collision() {
        let local = member(1, 1);
        let mut manager = ViewManager::found(local, 0.5, ListenerSet::new());
        manager.request_join(candidate(2)).expect("first admission");
        manager.broadcast_complete();

        assert!(matches!(
            manager.request_join(candidate(2)),
            Err(JoinRejection::DuplicateIdentity)
        ));
    }

    #[test]
    fn test_join_serialized_behind_in_flight_broadcast() {
        let local = member(1, 1);
        let mut manager = ViewManager::found(local, 0.5, ListenerSet::new());
        manager.request_join(candidate(2)).expect("admission");

        // The broadcast has not completed: at most one change in flight.
        assert!(matches!(
            manager.request_join(candidate(3)),
            Err(JoinRejection::ChangeInProgress)
        ));

        manager.broadcast_complete();
        assert!(manager.request_join(candidate(3)).is_ok());
    }

    #[test]
    fn test_join_refused_by_non_coordinator_names_the_coordinator() {
        let a = member(1, 1);
        let b = member(2, 2);
        let v = view(1, vec![a.clone(), b.clone()]);
        let mut manager = ViewManager::admitted(b, v, 0.5, ListenerSet::new());

        match manager.request_join(candidate(3)) {
            Err(JoinRejection::NotCoordinator { coordinator }) => {
                assert_eq!(coordinator, Some(a.address.clone()));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    // ============================================================
    // VIEW INSTALLATION
    // ============================================================

    #[test]
    fn test_install_ignores_stale_and_duplicate_views() {
        let a = member(1, 1);
        let b = member(2, 2);
        let v1 = view(1, vec![a.clone(), b.clone()]);
        let mut manager = ViewManager::admitted(b.clone(), v1.clone(), 0.5, ListenerSet::new());

        let c = member(3, 3);
        let v2 = view(2, vec![a.clone(), b.clone(), c]);
        let (outcome, _) = manager.install_view(v2.clone(), &[]);
        assert!(matches!(outcome, InstallOutcome::Installed { .. }));
        assert_eq!(manager.view(), &v2);

        // Retransmission of the same identifier.
        let (outcome, _) = manager.install_view(v2.clone(), &[]);
        assert!(matches!(outcome, InstallOutcome::Stale { .. }));

        // Reordered older view.
        let (outcome, _) = manager.install_view(v1, &[]);
        assert!(matches!(outcome, InstallOutcome::Stale { .. }));
        assert_eq!(manager.view(), &v2);
    }

    #[test]
    fn test_install_of_view_without_local_shuts_down() {
        let a = member(1, 1);
        let b = member(2, 2);
        let v1 = view(1, vec![a.clone(), b.clone()]);
        let mut manager = ViewManager::admitted(b, v1, 0.5, ListenerSet::new());

        let v2 = view(2, vec![a]);
        let (outcome, actions) = manager.install_view(v2, &[]);
        assert_eq!(outcome, InstallOutcome::Excluded);
        assert!(matches!(
            &actions[..],
            [Action::Shutdown {
                reason: ExitReason::Removed
            }]
        ));
        assert_eq!(manager.lifecycle(), NodeLifecycle::Departed);
    }

    #[test]
    fn test_install_rejects_malformed_views() {
        let a = member(1, 1);
        let b = member(2, 2);
        let v1 = view(1, vec![a.clone(), b.clone()]);
        let mut manager = ViewManager::admitted(b.clone(), v1, 0.5, ListenerSet::new());

        // A view with no members, as a buggy or hostile peer might send it.
        let mut crafted = serde_json::to_value(view(2, vec![a, b])).expect("serialize");
        crafted["members"] = serde_json::json!([]);
        let empty: View = serde_json::from_value(crafted).expect("deserialize");

        let (outcome, _) = manager.install_view(empty, &[]);
        assert_eq!(outcome, InstallOutcome::Malformed);
        assert_eq!(manager.view().id().value(), 1);
    }

    #[test]
    fn test_members_installing_same_view_agree_on_the_list() {
        let a = member(1, 1);
        let b = member(2, 2);
        let c = member(3, 3);
        let v1 = view(1, vec![a.clone(), b.clone(), c.clone()]);
        let mut on_b = ViewManager::admitted(b.clone(), v1.clone(), 0.5, ListenerSet::new());
        let mut on_c = ViewManager::admitted(c.clone(), v1, 0.5, ListenerSet::new());

        let d = member(4, 4);
        let v2 = view(2, vec![a, b, c, d]);
        on_b.install_view(v2.clone(), &[]);
        on_c.install_view(v2, &[]);

        assert_eq!(on_b.view(), on_c.view());
        assert_eq!(
            on_b.view().members().to_vec(),
            on_c.view().members().to_vec()
        );
    }

    // ============================================================
    // FAILURE RATIFICATION & FAILOVER
    // ============================================================

    #[test]
    fn test_ratified_failure_produces_exactly_one_view_change() {
        let local = member(1, 1);
        let mut manager = ViewManager::found(local, 0.5, ListenerSet::new());
        let (grant_b, _) = manager.request_join(candidate(2)).expect("admit b");
        manager.broadcast_complete();
        let (grant_c, _) = manager.request_join(candidate(3)).expect("admit c");
        manager.broadcast_complete();
        let b = grant_b.identity;
        let c = grant_c.identity;
        assert_eq!(manager.view().id().value(), 3);

        let actions = manager.peers_failed(vec![b.clone()], &[]);
        match &actions[..] {
            [Action::Broadcast {
                view,
                graceful,
                recipients,
            }] => {
                assert_eq!(view.id().value(), 4);
                assert!(!view.contains(&b));
                assert!(view.contains(&c));
                assert!(graceful.is_empty());
                assert_eq!(recipients.to_vec(), vec![c.clone()]);
            }
            other => panic!("unexpected actions: {other:?}"),
        }
        manager.broadcast_complete();

        // Ratifying the same peer again changes nothing.
        assert!(manager.peers_failed(vec![b], &[]).is_empty());
        assert_eq!(manager.view().id().value(), 4);
    }

    #[test]
    fn test_survivor_with_smallest_incarnation_takes_over_after_coordinator_failure() {
        let a = member(1, 1);
        let b = member(2, 2);
        let c = member(3, 3);
        let v1 = view(1, vec![a.clone(), b.clone(), c.clone()]);
        let mut on_b = ViewManager::admitted(b.clone(), v1.clone(), 0.5, ListenerSet::new());
        let mut on_c = ViewManager::admitted(c, v1, 0.5, ListenerSet::new());

        // b is next in line: it promotes itself and republishes.
        let actions = on_b.peers_failed(vec![a.clone()], &[]);
        assert_eq!(on_b.lifecycle(), NodeLifecycle::Coordinator);
        let broadcast_view = match &actions[..] {
            [Action::Broadcast { view, .. }] => view.clone(),
            other => panic!("unexpected actions: {other:?}"),
        };
        assert_eq!(broadcast_view.id().value(), 2);
        assert_eq!(broadcast_view.coordinator(), &b);
        assert!(!broadcast_view.contains(&a));

        // c is not: it waits for the new coordinator's broadcast.
        assert!(on_c.peers_failed(vec![a], &[]).is_empty());
        let (outcome, _) = on_c.install_view(broadcast_view, &[]);
        assert!(matches!(outcome, InstallOutcome::Installed { .. }));
        assert_eq!(on_b.view(), on_c.view());
    }

    #[test]
    fn test_minority_side_shuts_down_on_quorum_loss() {
        let members: Vec<_> = (1u16..=5).map(|i| member(i, u64::from(i))).collect();
        let v1 = view(1, members.clone());
        let mut manager = ViewManager::admitted(members[0].clone(), v1, 0.5, ListenerSet::new());

        let actions = manager.peers_failed(members[2..].to_vec(), &[]);
        assert!(matches!(
            &actions[..],
            [Action::Shutdown {
                reason: ExitReason::QuorumLost
            }]
        ));
        assert_eq!(manager.lifecycle(), NodeLifecycle::Departed);
    }

    #[test]
    fn test_suspect_evidence_counts_toward_quorum_loss() {
        let members: Vec<_> = (1u16..=5).map(|i| member(i, u64::from(i))).collect();
        let v1 = view(1, members.clone());
        let mut manager = ViewManager::admitted(members[0].clone(), v1, 0.5, ListenerSet::new());

        // One ratified failure plus two still-suspect peers: 2/5 reachable.
        let actions = manager.peers_failed(vec![members[2].clone()], &members[3..]);
        assert!(matches!(
            &actions[..],
            [Action::Shutdown {
                reason: ExitReason::QuorumLost
            }]
        ));
    }

    // ============================================================
    // GRACEFUL DEPARTURE
    // ============================================================

    #[test]
    fn test_departing_coordinator_hands_over_with_a_final_view() {
        let local = member(1, 1);
        let mut manager = ViewManager::found(local.clone(), 0.5, ListenerSet::new());
        let (grant, _) = manager.request_join(candidate(2)).expect("admission");
        manager.broadcast_complete();
        let successor = grant.identity;

        let actions = manager.leave_local();
        match &actions[..] {
            [Action::Broadcast {
                view,
                graceful,
                recipients,
            }] => {
                assert_eq!(view.id().value(), 3);
                assert_eq!(view.members().to_vec(), vec![successor.clone()]);
                assert_eq!(view.coordinator(), &successor);
                assert!(graceful.contains(&local));
                assert_eq!(recipients.to_vec(), vec![successor]);
            }
            other => panic!("unexpected actions: {other:?}"),
        }
        assert_eq!(manager.lifecycle(), NodeLifecycle::Departed);
    }

    // ============================================================
    // LISTENER DISPATCH
    // ============================================================

    #[derive(Debug, PartialEq)]
    enum Event {
        Changed { old: u64, new: u64 },
        Departed { port: u16, reason: DepartureReason },
    }

    struct Recorder(Arc<Mutex<Vec<Event>>>);

    impl MembershipListener for Recorder {
        fn on_view_changed(&self, old: &View, new: &View) {
            self.0.lock().unwrap().push(Event::Changed {
                old: old.id().value(),
                new: new.id().value(),
            });
        }

        fn on_member_departed(&self, member: &MemberIdentity, reason: DepartureReason) {
            self.0.lock().unwrap().push(Event::Departed {
                port: member.address.port(),
                reason,
            });
        }
    }

    #[test]
    fn test_listeners_observe_changes_in_view_order_with_reasons() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = ListenerSet::new();
        listeners.register(Arc::new(Recorder(Arc::clone(&events))));

        let local = member(1, 1);
        let mut manager = ViewManager::found(local, 0.5, listeners);
        let (grant_b, _) = manager.request_join(candidate(2)).expect("admit b");
        manager.broadcast_complete();
        let (grant_c, _) = manager.request_join(candidate(3)).expect("admit c");
        manager.broadcast_complete();
        manager.request_join(candidate(4)).expect("admit d");
        manager.broadcast_complete();

        manager.member_leaving(grant_b.identity.clone());
        manager.broadcast_complete();
        manager.peers_failed(vec![grant_c.identity.clone()], &[]);

        let events = events.lock().unwrap();
        assert_eq!(
            &events[..],
            &[
                Event::Changed { old: 1, new: 1 }, // founding notification
                Event::Changed { old: 1, new: 2 },
                Event::Changed { old: 2, new: 3 },
                Event::Changed { old: 3, new: 4 },
                Event::Changed { old: 4, new: 5 },
                Event::Departed {
                    port: 2,
                    reason: DepartureReason::Graceful
                },
                Event::Changed { old: 5, new: 6 },
                Event::Departed {
                    port: 3,
                    reason: DepartureReason::Failed
                },
            ]
        );
    }

    // ============================================================
    // WIRE PROTOCOL
    // ============================================================

    #[test]
    fn test_wire_messages_round_trip() {
        let ping = MembershipMessage::Ping { from: member(1, 1) };
        match decode(&encode(&ping).expect("encode")).expect("decode") {
            MembershipMessage::Ping { from } => assert_eq!(from, member(1, 1)),
            other => panic!("unexpected: {other:?}"),
        }

        let v = view(7, vec![member(1, 1), member(2, 2)]);
        let install = MembershipMessage::InstallView {
            view: v.clone(),
            graceful: vec![member(3, 3)],
        };
        match decode(&encode(&install).expect("encode")).expect("decode") {
            MembershipMessage::InstallView { view, graceful } => {
                assert_eq!(view, v);
                assert_eq!(graceful, vec![member(3, 3)]);
            }
            other => panic!("unexpected: {other:?}"),
        }

        let hint = JoinRejection::NotCoordinator {
            coordinator: Some(HostAddress::new("node-9", 4000)),
        };
        let refused = MembershipMessage::JoinRefused {
            token: uuid::Uuid::new_v4(),
            rejection: hint.clone(),
        };
        match decode(&encode(&refused).expect("encode")).expect("decode") {
            MembershipMessage::JoinRefused { rejection, .. } => assert_eq!(rejection, hint),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
