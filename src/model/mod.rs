//! Core data model: ticket snapshots, history events, and derived records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A local snapshot of one remote ticket.
///
/// The numeric `id` is the only stable identity: the human-readable `key`
/// changes when a ticket moves between projects, so it must never be used
/// as a long-term join key against history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub key: String,
    pub issue_type: String,
    pub summary: String,
    pub created: DateTime<Utc>,
    pub resolved: Option<DateTime<Utc>>,
    pub updated: DateTime<Utc>,
    pub creator: Option<String>,
    pub assignee: Option<String>,
    pub status: String,
    pub resolution: Option<String>,
    pub story_points: Option<f64>,
    pub fix_version: Option<String>,
    pub severity: Option<String>,
    /// When this snapshot was written by the sync engine.
    pub synced_at: DateTime<Utc>,
}

/// One field change on one ticket.
///
/// A remote changelog entry touching several fields atomically expands into
/// one `HistoryEvent` per field, all sharing the same timestamp and author.
/// `event_id` is the idempotency key for re-insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_id: i64,
    pub ticket_id: i64,
    pub author: Option<String>,
    /// Changed field name. `None` only for the "fetched, genuinely empty"
    /// sentinel row written by the history backfill.
    pub field: Option<String>,
    pub from_value: Option<String>,
    pub to_value: Option<String>,
    pub at: DateTime<Utc>,
}

impl HistoryEvent {
    /// Sentinel row marking a ticket whose full history was fetched and
    /// came back empty, so backfill stops re-selecting it.
    #[must_use]
    pub fn sentinel(ticket_id: i64, at: DateTime<Utc>) -> Self {
        Self {
            event_id: -ticket_id,
            ticket_id,
            author: None,
            field: None,
            from_value: None,
            to_value: None,
            at,
        }
    }

    /// True for the empty-history sentinel.
    #[must_use]
    pub const fn is_sentinel(&self) -> bool {
        self.field.is_none()
    }
}

/// One row of the status-history window query consumed by the metrics
/// engines: a field change joined with the ticket columns the reconciliation
/// state machine needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub key: String,
    pub field: String,
    pub from_value: Option<String>,
    pub to_value: Option<String>,
    pub at: DateTime<Utc>,
    pub ticket_created: DateTime<Utc>,
    pub ticket_status: String,
    pub ticket_resolved: Option<DateTime<Utc>>,
    pub ticket_resolution: Option<String>,
}

/// Per-ticket work span derived by the cycle-time engine. Transient: owned
/// by the reconciliation pass and discarded once the aggregate is emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkSpan {
    pub work_start: Option<DateTime<Utc>>,
    pub work_end: Option<DateTime<Utc>>,
}

impl WorkSpan {
    /// True once a substantive work-start transition has been observed and
    /// the ticket currently sits in a terminal status.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.work_start.is_some() && self.work_end.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sentinel_identity() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let s = HistoryEvent::sentinel(1234, at);
        assert_eq!(s.event_id, -1234);
        assert_eq!(s.ticket_id, 1234);
        assert!(s.is_sentinel());
    }

    #[test]
    fn test_workspan_resolution() {
        let mut span = WorkSpan::default();
        assert!(!span.is_resolved());
        span.work_start = Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        assert!(!span.is_resolved());
        span.work_end = Some(Utc.with_ymd_and_hms(2024, 5, 3, 9, 0, 0).unwrap());
        assert!(span.is_resolved());
    }
}
