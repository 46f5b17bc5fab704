//! Loiter-time engine: cumulative duration a ticket spent in each status
//! before transitioning away from it.

use crate::error::Result;
use crate::metrics::OrderingGuard;
use crate::model::StatusChange;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-ticket map from status name to cumulative dwell, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoiterReport {
    pub per_ticket: BTreeMap<String, BTreeMap<String, i64>>,
}

struct Cursor {
    last_update: DateTime<Utc>,
    buckets: BTreeMap<String, i64>,
}

/// Fold the ordered status-history stream into per-status dwell durations.
///
/// The cursor is seeded from the ticket's created timestamp, so time spent
/// in the initial status before the first transition is attributed too.
/// Every event advances the cursor and credits the elapsed time to the
/// status (or key, for cross-project moves) the ticket was leaving.
///
/// # Errors
///
/// Propagates the ordering contract violations; no partial report is
/// returned in that case.
pub fn compute(changes: &[StatusChange]) -> Result<LoiterReport> {
    let mut guard = OrderingGuard::new();
    let mut report = LoiterReport::default();
    let mut current: Option<(String, Cursor)> = None;

    for change in changes {
        let new_group = guard.observe(&change.key, change.at)?;
        if new_group {
            if let Some((key, cursor)) = current.take() {
                report.per_ticket.insert(key, cursor.buckets);
            }
            current = Some((
                change.key.clone(),
                Cursor {
                    last_update: change.ticket_created,
                    buckets: BTreeMap::new(),
                },
            ));
        }

        if let Some((_, cursor)) = current.as_mut() {
            let dwelt = (change.at - cursor.last_update).num_seconds();
            let bucket = change
                .from_value
                .clone()
                .unwrap_or_else(|| "(unknown)".to_string());
            *cursor.buckets.entry(bucket).or_insert(0) += dwelt;
            cursor.last_update = change.at;
        }
    }
    if let Some((key, cursor)) = current {
        report.per_ticket.insert(key, cursor.buckets);
    }
    Ok(report)
}
