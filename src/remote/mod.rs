//! Remote tracker client: pagination primitives, retry policy, payload
//! decoding.
//!
//! The sync engine talks to the remote only through [`RemoteSource`], so
//! tests drive it with an in-memory fake instead of a live tracker.

pub mod jira;
pub mod payload;
pub mod retry;

pub use jira::JiraClient;
pub use retry::RetryPolicy;

use crate::error::Result;
use crate::model::{HistoryEvent, Ticket};
use chrono::FixedOffset;

/// One page of a ticket search, with changelog events expanded when the
/// search requested them embedded.
///
/// `total` is the absolute result count as reported by the remote for this
/// page. It can change between pages under concurrent remote writes, so the
/// caller must always re-check completion against the freshest value.
#[derive(Debug, Clone, Default)]
pub struct TicketPage {
    pub tickets: Vec<Ticket>,
    pub events: Vec<HistoryEvent>,
    pub total: u64,
}

/// One page of a per-ticket changelog listing.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub events: Vec<HistoryEvent>,
    pub total: u64,
}

/// Pagination contract against the remote tracker.
///
/// Both listing calls are pure pagination primitives: the caller supplies an
/// offset and a page size and loops until `received >= total`. No page-count
/// prediction happens on either side.
pub trait RemoteSource {
    /// Search tickets matching `jql`, requesting embedded change history.
    ///
    /// # Errors
    ///
    /// `RateLimitExhausted` after throttling retries run out,
    /// `RemoteRequestFailed` on any other non-success response.
    fn search_tickets(&self, jql: &str, start_at: u64, max_results: u32) -> Result<TicketPage>;

    /// Fetch one page of a single ticket's change history.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`RemoteSource::search_tickets`].
    fn history_for(&self, ticket_id: i64, start_at: u64, max_results: u32) -> Result<HistoryPage>;

    /// The remote server's UTC offset, resolved once at client startup.
    ///
    /// # Errors
    ///
    /// `ServerTimeUnavailable` when the offset could not be resolved. The
    /// sync engine treats that as fatal for delta queries only; a full sync
    /// may still proceed.
    fn server_utc_offset(&self) -> Result<FixedOffset>;
}
