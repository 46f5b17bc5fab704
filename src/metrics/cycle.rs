//! Cycle-time engine: first substantive "work started" transition to the
//! last "work completed" transition, per ticket.

use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::metrics::{mean_seconds, OrderingGuard};
use crate::model::{StatusChange, WorkSpan};
use crate::storage::sqlite::KEY_FIELD;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Aggregate cycle-time report over one analysis window.
///
/// A `None` mean is the defined rendering of an empty partition: the window
/// simply contained no such tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleTimeReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub resolved_count: usize,
    pub resolved_mean_seconds: Option<i64>,
    pub unresolved_count: usize,
    pub unresolved_mean_seconds: Option<i64>,
}

/// Per-ticket reconciliation state, carried across one key's event group.
#[derive(Debug, Default)]
struct TicketState {
    span: WorkSpan,
    /// Set by a cross-project move: the remote reports the key change but
    /// not the landing status, so the event time is only a work-start
    /// candidate until the next status event's `from_value` confirms it.
    pending_ambiguous: Option<DateTime<Utc>>,
}

impl TicketState {
    fn apply(&mut self, change: &StatusChange, workflow: &WorkflowConfig) {
        if change.field == KEY_FIELD {
            // Ambiguous origin. When two key changes arrive back to back,
            // the later candidate replaces the earlier: only the most recent
            // move can be confirmed by the next status event.
            self.pending_ambiguous = Some(change.at);
            return;
        }

        let to = change.to_value.as_deref().unwrap_or("");

        if let Some(candidate) = self.pending_ambiguous.take() {
            let confirmed = change
                .from_value
                .as_deref()
                .is_some_and(|from| workflow.is_not_started(from) && !workflow.is_not_started(to));
            if confirmed {
                // Work started somewhere between the move and this event;
                // this event's time is the earliest instant we can prove.
                if self.span.work_start.is_none() {
                    self.span.work_start = Some(change.at);
                }
            } else {
                debug!(key = %change.key, at = %candidate, "discarding ambiguous work-start candidate");
            }
        }

        // Transitions landing in a "not started" status never start work.
        if self.span.work_start.is_none() && !to.is_empty() && !workflow.is_not_started(to) {
            self.span.work_start = Some(change.at);
        }

        if to == workflow.done_status {
            self.span.work_end = Some(change.at);
        } else if self.span.work_end.is_some() {
            // Re-opening clears completion; the last Done wins.
            self.span.work_end = None;
        }
    }
}

/// Fold the ordered status-history stream into per-ticket work spans.
///
/// # Errors
///
/// Propagates the [`OrderingGuard`] contract violations; no partial result
/// is returned in that case.
pub fn work_spans(
    changes: &[StatusChange],
    workflow: &WorkflowConfig,
) -> Result<Vec<(String, WorkSpan)>> {
    let mut guard = OrderingGuard::new();
    let mut spans: Vec<(String, WorkSpan)> = Vec::new();
    let mut current: Option<(String, TicketState)> = None;

    for change in changes {
        let new_group = guard.observe(&change.key, change.at)?;
        if new_group {
            if let Some((key, state)) = current.take() {
                spans.push((key, state.span));
            }
            current = Some((change.key.clone(), TicketState::default()));
        }
        if let Some((_, state)) = current.as_mut() {
            state.apply(change, workflow);
        }
    }
    if let Some((key, state)) = current {
        spans.push((key, state.span));
    }
    Ok(spans)
}

/// Compute the cycle-time report for a window.
///
/// Resolved tickets measure `work_end - work_start`; unresolved ones measure
/// against `now` (wall clock at analysis time, never stored). Tickets whose
/// work never started contribute to neither partition.
///
/// # Errors
///
/// Propagates ordering contract violations from [`work_spans`].
pub fn compute(
    changes: &[StatusChange],
    workflow: &WorkflowConfig,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<CycleTimeReport> {
    let spans = work_spans(changes, workflow)?;

    let mut resolved: Vec<i64> = Vec::new();
    let mut unresolved: Vec<i64> = Vec::new();
    for (key, span) in &spans {
        let Some(start) = span.work_start else {
            debug!(%key, "ticket never started; excluded from cycle time");
            continue;
        };
        match span.work_end {
            Some(end) => resolved.push((end - start).num_seconds()),
            None => unresolved.push((now - start).num_seconds()),
        }
    }

    Ok(CycleTimeReport {
        window_start,
        window_end,
        resolved_count: resolved.len(),
        resolved_mean_seconds: mean_seconds(&resolved, "resolved").ok(),
        unresolved_count: unresolved.len(),
        unresolved_mean_seconds: mean_seconds(&unresolved, "unresolved").ok(),
    })
}
