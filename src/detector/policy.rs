use super::types::SuspicionRecord;

/// Decides whether a timed-out suspicion may escalate to FAILED.
///
/// The timeout itself is necessary but, depending on deployment, not
/// sufficient: one flaky link should not be able to remove a healthy member.
/// The policy is the seam where deployments choose how much independent
/// confirmation they demand.
pub trait ConfirmationPolicy: Send + Sync {
    fn confirm_failure(&self, record: &SuspicionRecord) -> bool;
}

/// Escalate on timeout expiry alone. The default.
pub struct TimeoutOnly;

impl ConfirmationPolicy for TimeoutOnly {
    fn confirm_failure(&self, _record: &SuspicionRecord) -> bool {
        true
    }
}

/// Additionally require suspicion reports from at least `min_reports`
/// distinct peers. A peer nobody else can see stays SUSPECT until the
/// evidence arrives, trading removal latency for false-positive resistance.
pub struct CrossVerified {
    pub min_reports: usize,
}

impl ConfirmationPolicy for CrossVerified {
    fn confirm_failure(&self, record: &SuspicionRecord) -> bool {
        record.reported_by.len() >= self.min_reports
    }
}
