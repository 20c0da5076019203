//! Optimistic insight counters.
//!
//! Maintained incrementally from channel events, so they can drift on
//! missed messages; [`InsightCounters::reconcile`] overwrites them from
//! the authoritative counts endpoint.

use caseflow_core::{ChangeKind, InsightCounts, InsightStatus};

use crate::protocol::InsightChange;

/// Locally projected per-status counts for one organization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsightCounters {
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub total: i64,
}

impl InsightCounters {
    /// Apply a channel event to the projection.
    pub fn apply(&mut self, change: &InsightChange) {
        match change.kind {
            ChangeKind::Insert => {
                self.total += 1;
                if change.new_status == Some(InsightStatus::Pending) {
                    self.pending += 1;
                }
            }
            ChangeKind::Update => {
                if change.old_status == Some(InsightStatus::Pending)
                    && change.new_status != Some(InsightStatus::Pending)
                {
                    self.pending = (self.pending - 1).max(0);
                }
                match change.new_status {
                    Some(InsightStatus::Accepted)
                        if change.old_status != Some(InsightStatus::Accepted) =>
                    {
                        self.accepted += 1;
                    }
                    Some(InsightStatus::Rejected)
                        if change.old_status != Some(InsightStatus::Rejected) =>
                    {
                        self.rejected += 1;
                    }
                    _ => {}
                }
            }
            ChangeKind::Delete => {
                self.total = (self.total - 1).max(0);
                if change.old_status == Some(InsightStatus::Pending) {
                    self.pending = (self.pending - 1).max(0);
                }
            }
        }
    }

    /// Overwrite the projection with authoritative counts.
    pub fn reconcile(&mut self, counts: &InsightCounts) {
        self.pending = counts.pending;
        self.accepted = counts.accepted;
        self.rejected = counts.rejected;
        self.total = counts.total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn change(
        kind: ChangeKind,
        old: Option<InsightStatus>,
        new: Option<InsightStatus>,
    ) -> InsightChange {
        InsightChange {
            kind,
            insight_id: Some(Uuid::new_v4()),
            new_status: new,
            old_status: old,
        }
    }

    #[test]
    fn test_insert_pending_increments_pending_and_total() {
        let mut counters = InsightCounters::default();
        counters.apply(&change(
            ChangeKind::Insert,
            None,
            Some(InsightStatus::Pending),
        ));

        assert_eq!(counters.pending, 1);
        assert_eq!(counters.total, 1);
        assert_eq!(counters.accepted, 0);
    }

    #[test]
    fn test_insert_non_pending_only_increments_total() {
        let mut counters = InsightCounters::default();
        counters.apply(&change(
            ChangeKind::Insert,
            None,
            Some(InsightStatus::AutoApplied),
        ));

        assert_eq!(counters.pending, 0);
        assert_eq!(counters.total, 1);
    }

    #[test]
    fn test_update_pending_to_accepted() {
        let mut counters = InsightCounters {
            pending: 2,
            accepted: 1,
            rejected: 0,
            total: 3,
        };
        counters.apply(&change(
            ChangeKind::Update,
            Some(InsightStatus::Pending),
            Some(InsightStatus::Accepted),
        ));

        assert_eq!(counters.pending, 1);
        assert_eq!(counters.accepted, 2);
        assert_eq!(counters.total, 3);
    }

    #[test]
    fn test_pending_floors_at_zero() {
        let mut counters = InsightCounters::default();
        counters.apply(&change(
            ChangeKind::Update,
            Some(InsightStatus::Pending),
            Some(InsightStatus::Rejected),
        ));

        assert_eq!(counters.pending, 0);
        assert_eq!(counters.rejected, 1);
    }

    #[test]
    fn test_update_between_terminal_states_does_not_touch_pending() {
        let mut counters = InsightCounters {
            pending: 1,
            accepted: 1,
            rejected: 0,
            total: 2,
        };
        counters.apply(&change(
            ChangeKind::Update,
            Some(InsightStatus::Accepted),
            Some(InsightStatus::Rejected),
        ));

        assert_eq!(counters.pending, 1);
        assert_eq!(counters.rejected, 1);
    }

    #[test]
    fn test_delete_pending_row() {
        let mut counters = InsightCounters {
            pending: 1,
            accepted: 0,
            rejected: 0,
            total: 1,
        };
        counters.apply(&change(
            ChangeKind::Delete,
            Some(InsightStatus::Pending),
            None,
        ));

        assert_eq!(counters.pending, 0);
        assert_eq!(counters.total, 0);
    }

    #[test]
    fn test_reconcile_overwrites_drift() {
        let mut counters = InsightCounters {
            pending: 7,
            accepted: 0,
            rejected: 0,
            total: 9,
        };
        counters.reconcile(&InsightCounts {
            pending: 2,
            accepted: 3,
            rejected: 1,
            auto_applied: 0,
            total: 6,
        });

        assert_eq!(
            counters,
            InsightCounters {
                pending: 2,
                accepted: 3,
                rejected: 1,
                total: 6,
            }
        );
    }
}
