//! CSV export for reports. Handles proper escaping of fields containing
//! commas, quotes, or newlines.

use crate::metrics::cycle::CycleTimeReport;
use crate::metrics::loiter::LoiterReport;
use crate::metrics::monthly::MonthlyReport;
use std::fmt::Write as _;

/// Escape a CSV field value.
///
/// Wraps in double quotes if the value contains commas, quotes, or newlines.
/// Doubles any existing quotes within the value.
#[must_use]
pub fn escape_field(value: &str) -> String {
    let needs_quoting = value.contains(',')
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r');

    if needs_quoting {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

fn opt_cell(value: Option<i64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

#[must_use]
pub fn cycle_csv(report: &CycleTimeReport) -> String {
    let mut out = String::from("partition,count,mean_seconds\n");
    let _ = writeln!(
        out,
        "resolved,{},{}",
        report.resolved_count,
        opt_cell(report.resolved_mean_seconds)
    );
    let _ = writeln!(
        out,
        "unresolved,{},{}",
        report.unresolved_count,
        opt_cell(report.unresolved_mean_seconds)
    );
    out
}

#[must_use]
pub fn loiter_csv(report: &LoiterReport) -> String {
    let mut out = String::from("ticket,status,seconds\n");
    for (key, buckets) in &report.per_ticket {
        for (status, seconds) in buckets {
            let _ = writeln!(
                out,
                "{},{},{seconds}",
                escape_field(key),
                escape_field(status)
            );
        }
    }
    out
}

#[must_use]
pub fn monthly_csv(report: &MonthlyReport) -> String {
    let mut out = String::from("month,opened,closed,filtered_as_noise\n");
    let _ = writeln!(
        out,
        "{},{},{},{}",
        escape_field(&report.month),
        report.opened,
        report.closed,
        report.filtered_as_noise
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_loiter_csv_rows() {
        let mut buckets = BTreeMap::new();
        buckets.insert("In Progress".to_string(), 3600i64);
        let mut per_ticket = BTreeMap::new();
        per_ticket.insert("SMART-1".to_string(), buckets);
        let report = LoiterReport { per_ticket };

        let csv = loiter_csv(&report);
        assert_eq!(csv, "ticket,status,seconds\nSMART-1,In Progress,3600\n");
    }

    #[test]
    fn test_cycle_csv_empty_partition_is_blank() {
        let report = CycleTimeReport {
            window_start: chrono::Utc::now(),
            window_end: chrono::Utc::now(),
            resolved_count: 0,
            resolved_mean_seconds: None,
            unresolved_count: 1,
            unresolved_mean_seconds: Some(60),
        };
        let csv = cycle_csv(&report);
        assert!(csv.contains("resolved,0,\n"));
        assert!(csv.contains("unresolved,1,60\n"));
    }
}
