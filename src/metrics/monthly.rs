//! Monthly open/closed metrics.
//!
//! Counts tickets opened and closed inside one calendar month. Tickets that
//! were opened and resolved within the configured noise threshold are
//! excluded from both counts: rapid open/close actions (misclicks,
//! duplicates resolved on sight) say nothing about throughput.

use crate::error::Result;
use crate::model::Ticket;
use crate::util::time::month_bounds;
use chrono::Duration;
use serde::Serialize;

/// Open/closed counts for one `YYYY-MM` month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyReport {
    pub month: String,
    pub opened: usize,
    pub closed: usize,
    /// Tickets dropped by the noise threshold.
    pub filtered_as_noise: usize,
}

/// Compute the monthly report from the tickets touching the month.
///
/// # Errors
///
/// Returns an error when `month` is not a valid `YYYY-MM` token.
pub fn compute(tickets: &[Ticket], month: &str, min_worked: Duration) -> Result<MonthlyReport> {
    let (start, end) = month_bounds(month)?;

    let mut opened = 0;
    let mut closed = 0;
    let mut filtered = 0;
    for ticket in tickets {
        if let Some(resolved) = ticket.resolved {
            if resolved - ticket.created < min_worked {
                filtered += 1;
                continue;
            }
        }
        if ticket.created >= start && ticket.created < end {
            opened += 1;
        }
        if ticket
            .resolved
            .is_some_and(|resolved| resolved >= start && resolved < end)
        {
            closed += 1;
        }
    }

    Ok(MonthlyReport {
        month: month.to_string(),
        opened,
        closed,
        filtered_as_noise: filtered,
    })
}
