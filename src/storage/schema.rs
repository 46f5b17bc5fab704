//! Database schema definitions.

use rusqlite::{Connection, Result};

/// The complete SQL schema for the cadence database.
pub const SCHEMA_SQL: &str = r"
    -- Ticket snapshots. id is the remote's stable numeric identity; the
    -- human key is mutable (changes on cross-project moves).
    CREATE TABLE IF NOT EXISTS tickets (
        id INTEGER PRIMARY KEY,
        key TEXT NOT NULL,
        issue_type TEXT NOT NULL,
        summary TEXT NOT NULL,
        created TEXT NOT NULL,
        resolved TEXT,
        updated TEXT NOT NULL,
        creator TEXT,
        assignee TEXT,
        status TEXT NOT NULL,
        resolution TEXT,
        story_points REAL,
        fix_version TEXT,
        severity TEXT,
        synced_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_tickets_key ON tickets(key);
    CREATE INDEX IF NOT EXISTS idx_tickets_updated ON tickets(updated);
    CREATE INDEX IF NOT EXISTS idx_tickets_resolved ON tickets(resolved);

    -- Field-change history. One row per changed field; event_id is the
    -- idempotency key for re-insertion. field IS NULL marks the
    -- empty-history sentinel.
    CREATE TABLE IF NOT EXISTS history (
        event_id INTEGER PRIMARY KEY,
        ticket_id INTEGER NOT NULL,
        author TEXT,
        field TEXT,
        from_value TEXT,
        to_value TEXT,
        at TEXT NOT NULL,
        FOREIGN KEY (ticket_id) REFERENCES tickets(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_history_ticket_id ON history(ticket_id);
    CREATE INDEX IF NOT EXISTS idx_history_at ON history(at);
    CREATE INDEX IF NOT EXISTS idx_history_field ON history(field);

    -- Metadata (sync watermark lives here under 'last_synced_utc').
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

/// Apply the schema to the database.
///
/// Idempotent because all statements use `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(())
}
