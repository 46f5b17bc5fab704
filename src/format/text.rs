//! Human-readable report rendering.

use crate::metrics::cycle::CycleTimeReport;
use crate::metrics::loiter::LoiterReport;
use crate::metrics::monthly::MonthlyReport;
use crate::storage::StoreCounts;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

/// Render a whole-second count as `3d 4h 12m` (seconds shown only under a
/// minute).
#[must_use]
pub fn humanize_seconds(total: i64) -> String {
    if total < 60 {
        return format!("{total}s");
    }
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;

    let mut out = String::new();
    if days > 0 {
        let _ = write!(out, "{days}d ");
    }
    if hours > 0 || days > 0 {
        let _ = write!(out, "{hours}h ");
    }
    let _ = write!(out, "{minutes}m");
    out
}

fn mean_cell(mean: Option<i64>) -> String {
    mean.map_or_else(|| "no data".to_string(), humanize_seconds)
}

#[must_use]
pub fn render_cycle(report: &CycleTimeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Cycle time {} .. {}",
        report.window_start.format("%Y-%m-%d"),
        report.window_end.format("%Y-%m-%d")
    );
    let _ = writeln!(
        out,
        "  resolved:   {:>5} tickets, mean {}",
        report.resolved_count,
        mean_cell(report.resolved_mean_seconds)
    );
    let _ = writeln!(
        out,
        "  unresolved: {:>5} tickets, mean {}",
        report.unresolved_count,
        mean_cell(report.unresolved_mean_seconds)
    );
    out
}

#[must_use]
pub fn render_loiter(report: &LoiterReport) -> String {
    let mut out = String::new();
    if report.per_ticket.is_empty() {
        let _ = writeln!(out, "No status history in the window.");
        return out;
    }
    for (key, buckets) in &report.per_ticket {
        let _ = writeln!(out, "{key}");
        for (status, seconds) in buckets {
            let _ = writeln!(out, "  {status:<28} {}", humanize_seconds(*seconds));
        }
    }
    out
}

#[must_use]
pub fn render_monthly(report: &MonthlyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Month {}", report.month);
    let _ = writeln!(out, "  opened: {:>5}", report.opened);
    let _ = writeln!(out, "  closed: {:>5}", report.closed);
    if report.filtered_as_noise > 0 {
        let _ = writeln!(
            out,
            "  (ignored {} rapid open/close tickets)",
            report.filtered_as_noise
        );
    }
    out
}

#[must_use]
pub fn render_status(counts: &StoreCounts, watermark: Option<DateTime<Utc>>) -> String {
    let mut out = String::new();
    let last = watermark.map_or_else(
        || "never".to_string(),
        |wm| wm.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    let _ = writeln!(out, "Last synchronization: {last}");
    let _ = writeln!(out, "Tickets:        {:>7}", counts.tickets);
    let _ = writeln!(out, "History events: {:>7}", counts.history_events);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_humanize_seconds() {
        assert_eq!(humanize_seconds(42), "42s");
        assert_eq!(humanize_seconds(60), "1m");
        assert_eq!(humanize_seconds(3 * 3600 + 5 * 60), "3h 5m");
        assert_eq!(humanize_seconds(2 * 86_400 + 60), "2d 0h 1m");
    }

    #[test]
    fn test_empty_partition_renders_no_data() {
        let report = CycleTimeReport {
            window_start: Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
            window_end: Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap(),
            resolved_count: 0,
            resolved_mean_seconds: None,
            unresolved_count: 2,
            unresolved_mean_seconds: Some(3600),
        };
        let text = render_cycle(&report);
        assert!(text.contains("no data"));
        assert!(text.contains("1h 0m"));
    }

    #[test]
    fn test_render_status_never_synced() {
        let counts = StoreCounts {
            tickets: 0,
            history_events: 0,
        };
        assert!(render_status(&counts, None).contains("never"));
    }
}
