//! Coordinator Election
//!
//! A deterministic, side-effect-free choice over a member list. Every node
//! runs the same function over the same view and lands on the same
//! coordinator without any communication.

use super::types::MemberIdentity;

/// Picks the coordinator for a member list.
///
/// Rules, in order:
/// 1. Stability: if `current` is still in the list and eligible, it stays.
/// 2. The eligible (non-locator) member with the smallest incarnation,
///    i.e. the oldest surviving member.
/// 3. Locator fallback: with only locators present, the oldest locator
///    coordinates so a bootstrapping cluster can still admit members.
///
/// Returns `None` only for an empty list.
pub fn elect<'a>(
    members: &'a [MemberIdentity],
    current: Option<&MemberIdentity>,
) -> Option<&'a MemberIdentity> {
    if let Some(current) = current {
        if current.role.is_coordinator_eligible() {
            if let Some(found) = members.iter().find(|m| *m == current) {
                return Some(found);
            }
        }
    }

    members
        .iter()
        .filter(|m| m.role.is_coordinator_eligible())
        .min_by_key(|m| m.incarnation)
        .or_else(|| members.iter().min_by_key(|m| m.incarnation))
}
