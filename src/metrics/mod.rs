//! Workflow timing metrics derived from mirrored history.
//!
//! All engines are single forward passes over the window query's output,
//! which arrives grouped by ticket key and ascending in time within a group.
//! That ordering is a precondition verified by [`OrderingGuard`], never
//! re-established by sorting: a violation means the upstream query broke its
//! contract and the computation must abort instead of reporting silently
//! wrong durations.

pub mod cycle;
pub mod loiter;
pub mod monthly;

pub use cycle::{work_spans, CycleTimeReport};
pub use loiter::LoiterReport;
pub use monthly::MonthlyReport;

use crate::error::{CadenceError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Verifies the grouped/ordered contract of the status-history stream.
#[derive(Debug, Default)]
pub(crate) struct OrderingGuard {
    current_key: Option<String>,
    seen: HashSet<String>,
    last_at: Option<DateTime<Utc>>,
}

impl OrderingGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Observe one event. Returns `true` when `key` opens a new group.
    ///
    /// Events within one remote changelog entry legitimately share a
    /// timestamp, so only a strictly decreasing timestamp is a violation.
    ///
    /// # Errors
    ///
    /// [`CadenceError::UngroupedInput`] when a key's group is reopened after
    /// another key's events started; [`CadenceError::OutOfOrderInput`] when
    /// time goes backwards within a group.
    pub(crate) fn observe(&mut self, key: &str, at: DateTime<Utc>) -> Result<bool> {
        let new_group = self.current_key.as_deref() != Some(key);
        if new_group {
            if self.seen.contains(key) {
                return Err(CadenceError::UngroupedInput {
                    key: key.to_string(),
                });
            }
            self.seen.insert(key.to_string());
            self.current_key = Some(key.to_string());
            self.last_at = None;
        }
        if let Some(prev) = self.last_at {
            if at < prev {
                return Err(CadenceError::OutOfOrderInput {
                    key: key.to_string(),
                    prev,
                    at,
                });
            }
        }
        self.last_at = Some(at);
        Ok(new_group)
    }
}

/// Mean of a duration set, in whole seconds.
///
/// # Errors
///
/// [`CadenceError::EmptyPartition`] for an empty set; report layers surface
/// that as "no data" rather than a numeric fault.
pub fn mean_seconds(durations: &[i64], partition: &str) -> Result<i64> {
    if durations.is_empty() {
        return Err(CadenceError::EmptyPartition {
            partition: partition.to_string(),
        });
    }
    let sum: i64 = durations.iter().sum();
    Ok(sum / durations.len() as i64)
}
