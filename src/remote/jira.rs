//! Blocking Jira REST client.
//!
//! Thin transport over three endpoints: `POST search` (with embedded
//! changelog), `GET issue/{id}/changelog`, and `GET serverInfo`. Every
//! request runs under the retry policy; throttling (HTTP 429) backs off per
//! the schedule, anything else non-2xx fails immediately with the status and
//! body kept for diagnostics.

use crate::config::Config;
use crate::error::{CadenceError, Result};
use crate::model::{HistoryEvent, Ticket};
use crate::remote::payload::{
    expand_changelog, expand_embedded, search_fields, ChangelogResponse, SearchResponse,
    ServerInfoResponse,
};
use crate::remote::retry::{self, Attempt, RetryPolicy};
use crate::remote::{HistoryPage, RemoteSource, TicketPage};
use crate::util::time::parse_server_time;
use chrono::{FixedOffset, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Blocking HTTP client for one Jira instance.
pub struct JiraClient {
    http: Client,
    base_url: String,
    username: String,
    api_key: String,
    policy: RetryPolicy,
    server_offset: Option<FixedOffset>,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the API key, even in debug output.
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("server_offset", &self.server_offset)
            .finish_non_exhaustive()
    }
}

impl JiraClient {
    /// Build a client without contacting the remote.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &Config, policy: RetryPolicy) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: config.base_url(),
            username: config.username.clone(),
            api_key: config.api_key.clone(),
            policy,
            server_offset: None,
        })
    }

    /// Build a client and resolve the remote server's UTC offset from
    /// `serverInfo`.
    ///
    /// A failure to obtain server time is tolerated here: the offset stays
    /// unresolved and only delta queries (which need it) will fail later.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn connect(config: &Config, policy: RetryPolicy) -> Result<Self> {
        let mut client = Self::new(config, policy)?;
        match client.fetch_server_offset() {
            Ok(offset) => {
                tracing::debug!(offset_secs = offset.local_minus_utc(), "resolved server UTC offset");
                client.server_offset = Some(offset);
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not resolve server time; delta sync disabled");
            }
        }
        Ok(client)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn fetch_server_offset(&self) -> Result<FixedOffset> {
        let info: ServerInfoResponse =
            self.execute(&|| self.http.get(self.endpoint("serverInfo")))?;
        let server_time = parse_server_time(&info.server_time)?;
        Ok(*server_time.offset())
    }

    /// Run one request under the retry policy and decode the JSON body.
    fn execute<T: DeserializeOwned>(&self, build: &dyn Fn() -> RequestBuilder) -> Result<T> {
        let mut sleep = std::thread::sleep;
        retry::execute(&self.policy, &mut sleep, &mut || {
            let response = build()
                .basic_auth(&self.username, Some(&self.api_key))
                .header(reqwest::header::ACCEPT, "application/json")
                .send()?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Ok(Attempt::Throttled);
            }
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(CadenceError::RemoteRequestFailed {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(Attempt::Success(response.json::<T>()?))
        })
    }
}

impl RemoteSource for JiraClient {
    fn search_tickets(&self, jql: &str, start_at: u64, max_results: u32) -> Result<TicketPage> {
        let body = serde_json::json!({
            "jql": jql,
            "startAt": start_at,
            "maxResults": max_results,
            "expand": ["changelog"],
            "fields": search_fields(),
        });

        let response: SearchResponse =
            self.execute(&|| self.http.post(self.endpoint("search")).json(&body))?;

        let synced_at = Utc::now();
        let mut tickets: Vec<Ticket> = Vec::with_capacity(response.issues.len());
        let mut events: Vec<HistoryEvent> = Vec::new();
        for issue in &response.issues {
            tickets.push(issue.to_ticket(synced_at)?);
            events.extend(expand_embedded(issue)?);
        }

        Ok(TicketPage {
            tickets,
            events,
            total: response.total,
        })
    }

    fn history_for(&self, ticket_id: i64, start_at: u64, max_results: u32) -> Result<HistoryPage> {
        let url = self.endpoint(&format!(
            "issue/{ticket_id}/changelog?startAt={start_at}&maxResults={max_results}"
        ));
        let response: ChangelogResponse = self.execute(&|| self.http.get(url.clone()))?;

        Ok(HistoryPage {
            events: expand_changelog(ticket_id, &response.values)?,
            total: response.total,
        })
    }

    fn server_utc_offset(&self) -> Result<FixedOffset> {
        self.server_offset
            .ok_or_else(|| CadenceError::ServerTimeUnavailable {
                reason: "server time was not resolved at startup".to_string(),
            })
    }
}
