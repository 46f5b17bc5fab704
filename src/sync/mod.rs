//! Incremental synchronization engine.
//!
//! Reconciles the local store against the remote tracker without loss or
//! duplication: watermark-based delta detection, idempotent page upserts,
//! and a follow-on history backfill for tickets with no local history.
//!
//! The watermark advances only after every page of the pass has been
//! durably stored. A failed pass leaves it untouched, so the next
//! invocation naturally retries the same delta window; that is safe because
//! upserts are last-write-wins by id.

use crate::config::Config;
use crate::error::{CadenceError, Result};
use crate::model::HistoryEvent;
use crate::remote::RemoteSource;
use crate::storage::SqliteStorage;
use crate::util::time::format_jql_minute;
use chrono::{DateTime, SubsecRound, Utc};
use indicatif::ProgressBar;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Outcome of one successful sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub tickets_upserted: u64,
    pub events_upserted: u64,
    pub pages: u32,
    pub backfilled_tickets: u64,
    /// The watermark the pass advanced to (the pass's start instant, so
    /// remote changes landing mid-pass are re-queried next time).
    pub watermark: DateTime<Utc>,
}

/// Orchestrates one synchronization pass: delta query, page loop, history
/// backfill, watermark advance.
pub struct SyncEngine<'a, R: RemoteSource> {
    remote: &'a R,
    storage: &'a mut SqliteStorage,
    config: &'a Config,
    progress: Option<ProgressBar>,
}

impl<'a, R: RemoteSource> SyncEngine<'a, R> {
    pub fn new(remote: &'a R, storage: &'a mut SqliteStorage, config: &'a Config) -> Self {
        Self {
            remote,
            storage,
            config,
            progress: None,
        }
    }

    /// Attach a progress bar updated once per stored page.
    #[must_use]
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Run a full pass. On failure the watermark is left at its previous
    /// value and the counts processed so far are logged so partial progress
    /// is visible.
    ///
    /// # Errors
    ///
    /// Propagates remote and storage errors; `ServerTimeUnavailable` when a
    /// warm start cannot translate the watermark into server-local time.
    pub fn sync(&mut self) -> Result<SyncReport> {
        // Truncated to the store's microsecond precision so the reported
        // watermark equals the persisted one.
        let pass_started = Utc::now().trunc_subsecs(6);
        let mut report = SyncReport {
            tickets_upserted: 0,
            events_upserted: 0,
            pages: 0,
            backfilled_tickets: 0,
            watermark: pass_started,
        };

        let outcome = self
            .pull_tickets(&mut report)
            .and_then(|()| self.backfill_history(&mut report));

        if let Err(e) = outcome {
            warn!(
                tickets = report.tickets_upserted,
                events = report.events_upserted,
                pages = report.pages,
                "sync pass aborted; watermark not advanced"
            );
            return Err(e);
        }

        // Durable success for every page: only now is the window confirmed.
        // A zero-result pass still lands here, meaning "confirmed up to
        // date" rather than "nothing happened".
        self.storage.set_watermark(pass_started)?;
        info!(
            tickets = report.tickets_upserted,
            events = report.events_upserted,
            backfilled = report.backfilled_tickets,
            watermark = %pass_started,
            "sync pass complete"
        );
        Ok(report)
    }

    /// Page through the delta query, upserting each page as one durable unit.
    fn pull_tickets(&mut self, report: &mut SyncReport) -> Result<()> {
        let known = self.storage.all_ticket_ids()?;
        let watermark = self.storage.watermark()?;
        let jql = self.build_query(&known, watermark)?;
        debug!(%jql, known = known.len(), "requesting update set");

        let page_size = self.config.workflow.page_size;
        let mut received: u64 = 0;
        loop {
            let page = self.remote.search_tickets(&jql, received, page_size)?;
            let page_len = page.tickets.len() as u64;

            self.storage.upsert_tickets(&page.tickets)?;
            self.storage.upsert_history(&page.events)?;
            report.tickets_upserted += page_len;
            report.events_upserted += page.events.len() as u64;
            report.pages += 1;
            received += page_len;

            if let Some(bar) = &self.progress {
                bar.set_length(page.total);
                bar.set_position(received.min(page.total));
            }
            info!(received, total = page.total, "stored page");

            // Completion is re-checked against the freshest total reported
            // on the last page; it can change under concurrent remote
            // writes.
            if received >= page.total {
                break;
            }
            if page_len == 0 {
                // The remote promised more records but returned none. Stop
                // rather than loop forever; the next pass re-queries.
                warn!(received, total = page.total, "short page before reported total");
                break;
            }
        }
        Ok(())
    }

    /// Build the delta query.
    ///
    /// Cold start (no watermark or empty local id set) pulls the whole
    /// project. Warm start needs both clauses: a ticket may be newly created
    /// (not yet known locally) or merely updated after the watermark.
    fn build_query(
        &self,
        known: &HashSet<i64>,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<String> {
        let project = &self.config.project;
        let Some(watermark) = watermark else {
            return Ok(format!("project = {project}"));
        };
        if known.is_empty() {
            return Ok(format!("project = {project}"));
        }

        let offset = self.remote.server_utc_offset()?;
        let updated_after = format_jql_minute(watermark, offset);

        let mut ids: Vec<i64> = known.iter().copied().collect();
        ids.sort_unstable();
        let id_list = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        Ok(format!(
            "project = {project} AND (id NOT IN ({id_list}) OR updated > \"{updated_after}\")"
        ))
    }

    /// Fetch full history for tickets with zero history rows.
    ///
    /// Each ticket's fetch-and-upsert is independent and idempotent. A
    /// ticket whose remote history is genuinely empty gets a sentinel row so
    /// the missing-history query stops re-selecting it.
    fn backfill_history(&mut self, report: &mut SyncReport) -> Result<()> {
        let missing = self.storage.ticket_ids_missing_history()?;
        if missing.is_empty() {
            return Ok(());
        }
        info!(tickets = missing.len(), "backfilling history");

        let page_size = self.config.workflow.page_size;
        for ticket_id in missing {
            let mut events: Vec<HistoryEvent> = Vec::new();
            let mut received: u64 = 0;
            loop {
                let page = self.remote.history_for(ticket_id, received, page_size)?;
                let page_len = page.events.len() as u64;
                received += page_len;
                events.extend(page.events);
                if received >= page.total || page_len == 0 {
                    break;
                }
            }

            if events.is_empty() {
                events.push(HistoryEvent::sentinel(ticket_id, Utc::now()));
            } else {
                report.events_upserted += events.len() as u64;
            }
            self.storage.upsert_history(&events)?;
            report.backfilled_tickets += 1;
            debug!(ticket_id, events = events.len(), "backfilled ticket history");
        }
        Ok(())
    }
}
