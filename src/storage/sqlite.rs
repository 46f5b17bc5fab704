//! `SQLite` storage implementation.
//!
//! The sync engine is the sole writer. Each page of remote results is
//! committed as one transaction so a crash mid-pass never leaves a
//! half-written page visible as done. All timestamps are stored as RFC3339
//! UTC with microsecond precision; fixed-width UTC strings compare
//! lexicographically in timestamp order, which the window query relies on.

use crate::config::WorkflowConfig;
use crate::error::{CadenceError, Result};
use crate::model::{HistoryEvent, StatusChange, Ticket};
use crate::storage::schema::apply_schema;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;

/// Metadata key holding the sync watermark.
const WATERMARK_KEY: &str = "last_synced_utc";

/// Changelog field name for status transitions.
pub const STATUS_FIELD: &str = "status";
/// Changelog field name reported when a ticket moves across projects.
/// The remote does not report the landing status for these.
pub const KEY_FIELD: &str = "Key";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Row counts and watermark for the `status` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub tickets: u64,
    pub history_events: u64,
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CadenceError::InvalidTimestamp {
            field: field.to_string(),
            reason: format!("stored value '{value}': {e}"),
        })
}

fn parse_opt_ts(value: Option<String>, field: &str) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_ts(&v, field)).transpose()
}

impl SqliteStorage {
    /// Open (and initialize if needed) the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema
    /// application fails.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Last confirmed fully-synchronized instant, or `None` when the store
    /// has never completed a sync pass.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure or a corrupt stored value.
    pub fn watermark(&self) -> Result<Option<DateTime<Utc>>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?",
                [WATERMARK_KEY],
                |row| row.get(0),
            )
            .optional()?;
        parse_opt_ts(value, "watermark")
    }

    /// Advance the watermark. Called only after a fully successful pass.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn set_watermark(&self, instant: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![WATERMARK_KEY, ts(instant)],
        )?;
        Ok(())
    }

    /// All ticket ids currently known locally.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn all_ticket_ids(&self) -> Result<HashSet<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM tickets")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<i64>, _>>()?;
        Ok(ids)
    }

    /// Bulk insert-or-update tickets by id, last-write-wins, in a single
    /// transaction. Applying the same batch twice leaves the store unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure; the transaction is rolled
    /// back and no row of the batch becomes visible.
    pub fn upsert_tickets(&mut self, tickets: &[Ticket]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO tickets (
                    id, key, issue_type, summary, created, resolved, updated,
                    creator, assignee, status, resolution, story_points,
                    fix_version, severity, synced_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    key = excluded.key,
                    issue_type = excluded.issue_type,
                    summary = excluded.summary,
                    created = excluded.created,
                    resolved = excluded.resolved,
                    updated = excluded.updated,
                    creator = excluded.creator,
                    assignee = excluded.assignee,
                    status = excluded.status,
                    resolution = excluded.resolution,
                    story_points = excluded.story_points,
                    fix_version = excluded.fix_version,
                    severity = excluded.severity,
                    synced_at = excluded.synced_at",
            )?;
            for ticket in tickets {
                stmt.execute(rusqlite::params![
                    ticket.id,
                    ticket.key,
                    ticket.issue_type,
                    ticket.summary,
                    ts(ticket.created),
                    ticket.resolved.map(ts),
                    ts(ticket.updated),
                    ticket.creator,
                    ticket.assignee,
                    ticket.status,
                    ticket.resolution,
                    ticket.story_points,
                    ticket.fix_version,
                    ticket.severity,
                    ts(ticket.synced_at),
                ])?;
            }
        }
        tx.commit()?;
        Ok(tickets.len())
    }

    /// Bulk insert-or-update history events by event id, in a single
    /// transaction. Re-running backfill on a ticket that already has rows
    /// does not duplicate them.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure; the transaction is rolled back.
    pub fn upsert_history(&mut self, events: &[HistoryEvent]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO history (
                    event_id, ticket_id, author, field, from_value, to_value, at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(event_id) DO UPDATE SET
                    ticket_id = excluded.ticket_id,
                    author = excluded.author,
                    field = excluded.field,
                    from_value = excluded.from_value,
                    to_value = excluded.to_value,
                    at = excluded.at",
            )?;
            for event in events {
                stmt.execute(rusqlite::params![
                    event.event_id,
                    event.ticket_id,
                    event.author,
                    event.field,
                    event.from_value,
                    event.to_value,
                    ts(event.at),
                ])?;
            }
        }
        tx.commit()?;
        Ok(events.len())
    }

    /// Ticket ids with zero history rows, i.e. tickets whose history has
    /// never been fetched. Tickets with a genuinely empty remote history
    /// carry a sentinel row and are therefore not re-selected.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn ticket_ids_missing_history(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id FROM tickets t
             LEFT JOIN history h ON h.ticket_id = t.id
             WHERE h.ticket_id IS NULL
             ORDER BY t.id",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Status and key-change events for tickets of interest in a window,
    /// joined with the ticket columns the reconciliation engines need.
    ///
    /// Eligibility: the ticket overlaps the window (created before its end,
    /// still open or resolved at/after its start) and its resolution is not
    /// one of the configured "not really worked" values. Tickets that never
    /// transitioned contribute no rows and so drop out naturally.
    ///
    /// Ordering contract: ticket id descending, event time ascending within
    /// a ticket. The metrics engines verify rather than re-establish this.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure or a corrupt stored timestamp.
    pub fn status_changes_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        workflow: &WorkflowConfig,
    ) -> Result<Vec<StatusChange>> {
        let excluded = &workflow.excluded_resolutions;
        let placeholders = vec!["?"; excluded.len()].join(", ");
        let sql = format!(
            "SELECT t.key, h.field, h.from_value, h.to_value, h.at,
                    t.created, t.status, t.resolved, t.resolution
             FROM history h
             JOIN tickets t ON t.id = h.ticket_id
             WHERE h.field IN ('{STATUS_FIELD}', '{KEY_FIELD}')
               AND (t.resolution IS NULL OR t.resolution NOT IN ({placeholders}))
               AND t.created < ?
               AND (t.resolved IS NULL OR t.resolved >= ?)
             ORDER BY t.id DESC, h.at ASC"
        );

        let mut params: Vec<&dyn rusqlite::ToSql> = excluded
            .iter()
            .map(|r| r as &dyn rusqlite::ToSql)
            .collect();
        let end_s = ts(end);
        let start_s = ts(start);
        params.push(&end_s);
        params.push(&start_s);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?;

        let mut changes = Vec::new();
        for row in rows {
            let (key, field, from_value, to_value, at, created, status, resolved, resolution) =
                row?;
            changes.push(StatusChange {
                key,
                field,
                from_value,
                to_value,
                at: parse_ts(&at, "history.at")?,
                ticket_created: parse_ts(&created, "tickets.created")?,
                ticket_status: status,
                ticket_resolved: parse_opt_ts(resolved, "tickets.resolved")?,
                ticket_resolution: resolution,
            });
        }
        Ok(changes)
    }

    /// Tickets created or resolved inside `[start, end)`, for the monthly
    /// report.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure or a corrupt stored row.
    pub fn tickets_touching(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Ticket>> {
        let start_s = ts(start);
        let end_s = ts(end);
        let mut stmt = self.conn.prepare(
            "SELECT id, key, issue_type, summary, created, resolved, updated,
                    creator, assignee, status, resolution, story_points,
                    fix_version, severity, synced_at
             FROM tickets
             WHERE (created >= ?1 AND created < ?2)
                OR (resolved IS NOT NULL AND resolved >= ?1 AND resolved < ?2)
             ORDER BY id",
        )?;
        let rows = stmt.query_map(rusqlite::params![start_s, end_s], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, Option<String>>(10)?,
                row.get::<_, Option<f64>>(11)?,
                row.get::<_, Option<String>>(12)?,
                row.get::<_, Option<String>>(13)?,
                row.get::<_, String>(14)?,
            ))
        })?;

        let mut tickets = Vec::new();
        for row in rows {
            let (
                id,
                key,
                issue_type,
                summary,
                created,
                resolved,
                updated,
                creator,
                assignee,
                status,
                resolution,
                story_points,
                fix_version,
                severity,
                synced_at,
            ) = row?;
            tickets.push(Ticket {
                id,
                key,
                issue_type,
                summary,
                created: parse_ts(&created, "tickets.created")?,
                resolved: parse_opt_ts(resolved, "tickets.resolved")?,
                updated: parse_ts(&updated, "tickets.updated")?,
                creator,
                assignee,
                status,
                resolution,
                story_points,
                fix_version,
                severity,
                synced_at: parse_ts(&synced_at, "tickets.synced_at")?,
            });
        }
        Ok(tickets)
    }

    /// Row counts for the `status` command.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn counts(&self) -> Result<StoreCounts> {
        let tickets: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tickets", [], |row| row.get(0))?;
        // Sentinel rows are bookkeeping, not history.
        let history_events: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM history WHERE field IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(StoreCounts {
            tickets,
            history_events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn ticket(id: i64, key: &str) -> Ticket {
        Ticket {
            id,
            key: key.to_string(),
            issue_type: "Story".to_string(),
            summary: "a ticket".to_string(),
            created: utc(2024, 1, 1, 9, 0),
            resolved: None,
            updated: utc(2024, 1, 2, 9, 0),
            creator: Some("dev@example.com".to_string()),
            assignee: None,
            status: "In Progress".to_string(),
            resolution: None,
            story_points: Some(3.0),
            fix_version: None,
            severity: None,
            synced_at: utc(2024, 1, 3, 9, 0),
        }
    }

    fn status_event(event_id: i64, ticket_id: i64, from: &str, to: &str, at: DateTime<Utc>) -> HistoryEvent {
        HistoryEvent {
            event_id,
            ticket_id,
            author: Some("dev@example.com".to_string()),
            field: Some(STATUS_FIELD.to_string()),
            from_value: Some(from.to_string()),
            to_value: Some(to.to_string()),
            at,
        }
    }

    #[test]
    fn test_watermark_roundtrip() {
        let storage = SqliteStorage::open_memory().unwrap();
        assert_eq!(storage.watermark().unwrap(), None);

        let instant = utc(2024, 6, 1, 12, 30);
        storage.set_watermark(instant).unwrap();
        assert_eq!(storage.watermark().unwrap(), Some(instant));

        // Advancing overwrites in place.
        let later = utc(2024, 6, 2, 12, 30);
        storage.set_watermark(later).unwrap();
        assert_eq!(storage.watermark().unwrap(), Some(later));
    }

    #[test]
    fn test_upsert_tickets_is_idempotent_and_last_write_wins() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let t = ticket(100, "SMART-1");
        storage.upsert_tickets(&[t.clone()]).unwrap();
        storage.upsert_tickets(&[t.clone()]).unwrap();
        assert_eq!(storage.counts().unwrap().tickets, 1);

        // Same id, new field values: fully overwritten.
        let mut moved = t;
        moved.key = "OTHER-7".to_string();
        moved.status = "Done".to_string();
        storage.upsert_tickets(&[moved]).unwrap();

        let ids = storage.all_ticket_ids().unwrap();
        assert_eq!(ids, HashSet::from([100]));
        let stored: String = storage
            .conn
            .query_row("SELECT key FROM tickets WHERE id = 100", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, "OTHER-7");
    }

    #[test]
    fn test_upsert_history_is_idempotent() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.upsert_tickets(&[ticket(1, "SMART-1")]).unwrap();
        let ev = status_event(500, 1, "Backlog", "In Progress", utc(2024, 1, 5, 10, 0));
        storage.upsert_history(&[ev.clone()]).unwrap();
        storage.upsert_history(&[ev]).unwrap();
        assert_eq!(storage.counts().unwrap().history_events, 1);
    }

    #[test]
    fn test_missing_history_sentinel_stops_reselection() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .upsert_tickets(&[ticket(1, "SMART-1"), ticket(2, "SMART-2")])
            .unwrap();
        assert_eq!(storage.ticket_ids_missing_history().unwrap(), vec![1, 2]);

        storage
            .upsert_history(&[status_event(10, 1, "Backlog", "Done", utc(2024, 1, 5, 10, 0))])
            .unwrap();
        assert_eq!(storage.ticket_ids_missing_history().unwrap(), vec![2]);

        // Ticket 2 has genuinely no history: sentinel keeps it out of the
        // missing set without counting as a real event.
        storage
            .upsert_history(&[HistoryEvent::sentinel(2, utc(2024, 1, 6, 10, 0))])
            .unwrap();
        assert!(storage.ticket_ids_missing_history().unwrap().is_empty());
        assert_eq!(storage.counts().unwrap().history_events, 1);
    }

    #[test]
    fn test_window_query_ordering_and_eligibility() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let workflow = WorkflowConfig::default();

        let mut worked = ticket(10, "SMART-10");
        worked.resolved = Some(utc(2024, 4, 10, 9, 0));
        worked.resolution = Some("Fixed".to_string());

        let mut duplicate = ticket(11, "SMART-11");
        duplicate.resolved = Some(utc(2024, 4, 11, 9, 0));
        duplicate.resolution = Some("Duplicate".to_string());

        // Resolved before the window start: not of interest.
        let mut stale = ticket(12, "SMART-12");
        stale.resolved = Some(utc(2024, 2, 1, 9, 0));
        stale.resolution = Some("Fixed".to_string());

        let open = ticket(13, "SMART-13");

        storage
            .upsert_tickets(&[worked, duplicate, stale, open])
            .unwrap();
        storage
            .upsert_history(&[
                status_event(1, 10, "Backlog", "In Progress", utc(2024, 4, 1, 9, 0)),
                status_event(2, 10, "In Progress", "Done", utc(2024, 4, 10, 9, 0)),
                status_event(3, 11, "Backlog", "Done", utc(2024, 4, 2, 9, 0)),
                status_event(4, 12, "Backlog", "Done", utc(2024, 1, 20, 9, 0)),
                status_event(5, 13, "Backlog", "In Progress", utc(2024, 4, 3, 9, 0)),
                // Non-status noise must not appear.
                HistoryEvent {
                    event_id: 6,
                    ticket_id: 10,
                    author: None,
                    field: Some("assignee".to_string()),
                    from_value: None,
                    to_value: Some("dev".to_string()),
                    at: utc(2024, 4, 5, 9, 0),
                },
            ])
            .unwrap();

        let changes = storage
            .status_changes_in_window(utc(2024, 3, 15, 0, 0), utc(2024, 6, 15, 0, 0), &workflow)
            .unwrap();

        let keys: Vec<&str> = changes.iter().map(|c| c.key.as_str()).collect();
        // Ticket id DESC grouping, event time ASC within a group.
        assert_eq!(keys, vec!["SMART-13", "SMART-10", "SMART-10"]);
        assert!(changes.iter().all(|c| c.field == STATUS_FIELD));
        assert_eq!(changes[1].to_value.as_deref(), Some("In Progress"));
        assert_eq!(changes[2].to_value.as_deref(), Some("Done"));
    }

    #[test]
    fn test_tickets_touching_month() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut opened = ticket(1, "SMART-1");
        opened.created = utc(2024, 5, 10, 9, 0);
        let mut closed = ticket(2, "SMART-2");
        closed.created = utc(2024, 4, 1, 9, 0);
        closed.resolved = Some(utc(2024, 5, 20, 9, 0));
        let mut outside = ticket(3, "SMART-3");
        outside.created = utc(2024, 3, 1, 9, 0);

        storage.upsert_tickets(&[opened, closed, outside]).unwrap();

        let hits = storage
            .tickets_touching(utc(2024, 5, 1, 0, 0), utc(2024, 6, 1, 0, 0))
            .unwrap();
        let ids: Vec<i64> = hits.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
