//! Quorum / Weight Arithmetic
//!
//! Decides whether the reachable side of a partition keeps enough of the
//! last agreed view's voting weight to continue. The losing side shuts down
//! its participation so at most one side of a partition stays active.

use super::types::{MemberIdentity, View};

/// Sum of member weights in a view.
pub fn total_weight(view: &View) -> u64 {
    view.members().iter().map(|m| u64::from(m.weight)).sum()
}

/// Fraction of the view's total weight not claimed by `unreachable` members.
/// Members listed in `unreachable` but absent from the view carry no weight.
pub fn surviving_fraction(view: &View, unreachable: &[MemberIdentity]) -> f64 {
    let total = total_weight(view);
    if total == 0 {
        return 0.0;
    }

    let lost: u64 = view
        .members()
        .iter()
        .filter(|m| unreachable.contains(m))
        .map(|m| u64::from(m.weight))
        .sum();

    (total - lost) as f64 / total as f64
}

/// True when the surviving side holds strictly more than `threshold` of the
/// view's weight. At the default majority threshold an exact half loses on
/// both sides, which keeps a symmetric split from producing two survivors.
pub fn has_quorum(view: &View, unreachable: &[MemberIdentity], threshold: f64) -> bool {
    surviving_fraction(view, unreachable) > threshold
}
