//! Remote payload decoding.
//!
//! Jira payloads have a dynamic shape: nested identity fields come and go
//! depending on privacy settings, and most ticket fields are nullable.
//! Absence is modeled as `Option` at the serde layer with one fixed fallback
//! order, never as caught exceptions.

use crate::error::Result;
use crate::model::{HistoryEvent, Ticket};
use crate::util::time::parse_remote_timestamp;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Jira customfield carrying the story-point estimate.
const STORY_POINTS_FIELD: &str = "customfield_10016";

/// Per-field events derived from one changelog entry share the entry id
/// scaled by this factor plus the item index, so re-expansion of the same
/// entry always yields the same event ids.
const EVENT_ID_STRIDE: i64 = 100;

/// `POST search` response body.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<RawIssue>,
    pub total: u64,
}

/// `GET issue/{id}/changelog` response body.
#[derive(Debug, Deserialize)]
pub struct ChangelogResponse {
    #[serde(default)]
    pub values: Vec<RawChangeEntry>,
    pub total: u64,
}

/// `GET serverInfo` response body.
#[derive(Debug, Deserialize)]
pub struct ServerInfoResponse {
    #[serde(rename = "serverTime")]
    pub server_time: String,
}

#[derive(Debug, Deserialize)]
pub struct RawIssue {
    /// Numeric id serialized as a string by the remote.
    pub id: String,
    pub key: String,
    pub fields: RawFields,
    #[serde(default)]
    pub changelog: Option<RawChangelog>,
}

#[derive(Debug, Deserialize)]
pub struct RawFields {
    #[serde(default)]
    pub issuetype: Option<Named>,
    #[serde(default)]
    pub summary: Option<String>,
    pub created: String,
    #[serde(default)]
    pub resolutiondate: Option<String>,
    pub updated: String,
    #[serde(default)]
    pub creator: Option<RawIdentity>,
    #[serde(default)]
    pub assignee: Option<RawIdentity>,
    #[serde(default)]
    pub status: Option<Named>,
    #[serde(default)]
    pub resolution: Option<Named>,
    #[serde(default, rename = "customfield_10016")]
    pub story_points: Option<f64>,
    #[serde(default, rename = "fixVersions")]
    pub fix_versions: Vec<Named>,
    #[serde(default)]
    pub priority: Option<Named>,
}

/// The `{ "name": ... }` wrapper Jira uses for enumerated fields.
#[derive(Debug, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: Option<String>,
}

/// A user reference. Email is preferred, display name is the fallback,
/// absence is absence.
#[derive(Debug, Deserialize)]
pub struct RawIdentity {
    #[serde(default, rename = "emailAddress")]
    pub email_address: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawChangelog {
    #[serde(default)]
    pub histories: Vec<RawChangeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RawChangeEntry {
    pub id: String,
    #[serde(default)]
    pub author: Option<RawIdentity>,
    pub created: String,
    #[serde(default)]
    pub items: Vec<RawChangeItem>,
}

#[derive(Debug, Deserialize)]
pub struct RawChangeItem {
    pub field: String,
    #[serde(default, rename = "fromString")]
    pub from_string: Option<String>,
    #[serde(default, rename = "toString")]
    pub to_string: Option<String>,
}

/// Resolve a user reference with the fixed fallback order.
#[must_use]
pub fn identity(raw: Option<&RawIdentity>) -> Option<String> {
    let raw = raw?;
    raw.email_address
        .clone()
        .or_else(|| raw.display_name.clone())
}

fn named(value: Option<&Named>) -> Option<String> {
    value.and_then(|n| n.name.clone())
}

impl RawIssue {
    /// Numeric ticket id.
    ///
    /// # Errors
    ///
    /// Returns an error when the remote id is not a decimal integer.
    pub fn numeric_id(&self) -> Result<i64> {
        self.id.parse().map_err(|_| {
            crate::error::CadenceError::MalformedPayload {
                field: "issue.id".to_string(),
                reason: format!("non-numeric id '{}'", self.id),
            }
        })
    }

    /// Convert into a local [`Ticket`] snapshot, stamping `synced_at`.
    ///
    /// # Errors
    ///
    /// Returns an error on a malformed id or timestamp.
    pub fn to_ticket(&self, synced_at: DateTime<Utc>) -> Result<Ticket> {
        Ok(Ticket {
            id: self.numeric_id()?,
            key: self.key.clone(),
            issue_type: named(self.fields.issuetype.as_ref()).unwrap_or_default(),
            summary: self.fields.summary.clone().unwrap_or_default(),
            created: parse_remote_timestamp(&self.fields.created, "fields.created")?,
            resolved: self
                .fields
                .resolutiondate
                .as_deref()
                .map(|s| parse_remote_timestamp(s, "fields.resolutiondate"))
                .transpose()?,
            updated: parse_remote_timestamp(&self.fields.updated, "fields.updated")?,
            creator: identity(self.fields.creator.as_ref()),
            assignee: identity(self.fields.assignee.as_ref()),
            status: named(self.fields.status.as_ref()).unwrap_or_default(),
            resolution: named(self.fields.resolution.as_ref()),
            story_points: self.fields.story_points,
            fix_version: self.fields.fix_versions.first().and_then(|n| n.name.clone()),
            severity: named(self.fields.priority.as_ref()),
            synced_at,
        })
    }
}

/// Expand changelog entries into per-field [`HistoryEvent`] rows.
///
/// A single remote entry can touch several fields atomically; each becomes
/// its own event sharing the entry's timestamp and author. Entries with a
/// malformed id or timestamp fail the whole expansion rather than being
/// silently dropped.
///
/// # Errors
///
/// Returns an error on a non-numeric entry id or unparseable timestamp.
pub fn expand_changelog(ticket_id: i64, entries: &[RawChangeEntry]) -> Result<Vec<HistoryEvent>> {
    let mut events = Vec::new();
    for entry in entries {
        let entry_id: i64 = entry.id.parse().map_err(|_| {
            crate::error::CadenceError::MalformedPayload {
                field: "changelog.id".to_string(),
                reason: format!("non-numeric changelog id '{}'", entry.id),
            }
        })?;
        let at = parse_remote_timestamp(&entry.created, "changelog.created")?;
        let author = identity(entry.author.as_ref());
        // More items than the stride would bleed into the next entry's id
        // space and silently overwrite its events on upsert.
        if entry.items.len() as i64 > EVENT_ID_STRIDE {
            return Err(crate::error::CadenceError::MalformedPayload {
                field: "changelog.items".to_string(),
                reason: format!(
                    "entry '{}' changes {} fields, more than the {EVENT_ID_STRIDE} supported",
                    entry.id,
                    entry.items.len()
                ),
            });
        }
        for (index, item) in entry.items.iter().enumerate() {
            events.push(HistoryEvent {
                event_id: entry_id * EVENT_ID_STRIDE + index as i64,
                ticket_id,
                author: author.clone(),
                field: Some(item.field.clone()),
                from_value: item.from_string.clone(),
                to_value: item.to_string.clone(),
                at,
            });
        }
    }
    Ok(events)
}

/// Expand the changelog embedded in a search result issue, when present.
///
/// # Errors
///
/// Same conditions as [`expand_changelog`].
pub fn expand_embedded(issue: &RawIssue) -> Result<Vec<HistoryEvent>> {
    match (&issue.changelog, issue.numeric_id()) {
        (Some(changelog), Ok(id)) => expand_changelog(id, &changelog.histories),
        (Some(_), Err(e)) => Err(e),
        (None, _) => Ok(Vec::new()),
    }
}

/// Story-point field requested from the search endpoint.
#[must_use]
pub fn search_fields() -> Vec<&'static str> {
    vec![
        "issuetype",
        "summary",
        "created",
        "resolutiondate",
        "updated",
        "creator",
        "assignee",
        "status",
        "resolution",
        STORY_POINTS_FIELD,
        "fixVersions",
        "priority",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_issue_json() -> serde_json::Value {
        serde_json::json!({
            "id": "10042",
            "key": "SMART-42",
            "fields": {
                "issuetype": {"name": "Story"},
                "summary": "Implement the thing",
                "created": "2024-03-01T08:00:00.000+0000",
                "resolutiondate": null,
                "updated": "2024-03-10T08:00:00.000+0000",
                "creator": {"displayName": "Jo Dev"},
                "assignee": {"emailAddress": "jo@example.com", "displayName": "Jo Dev"},
                "status": {"name": "In Progress"},
                "resolution": null,
                "customfield_10016": 5.0,
                "fixVersions": [{"name": "1.4"}],
                "priority": {"name": "Major"}
            },
            "changelog": {
                "histories": [
                    {
                        "id": "900",
                        "author": {"emailAddress": "jo@example.com"},
                        "created": "2024-03-02T09:00:00.000+0000",
                        "items": [
                            {"field": "status", "fromString": "Backlog", "toString": "In Progress"},
                            {"field": "assignee", "fromString": null, "toString": "Jo Dev"}
                        ]
                    }
                ]
            }
        })
    }

    #[test]
    fn test_issue_decoding_and_conversion() {
        let raw: RawIssue = serde_json::from_value(sample_issue_json()).unwrap();
        let synced = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();
        let ticket = raw.to_ticket(synced).unwrap();

        assert_eq!(ticket.id, 10042);
        assert_eq!(ticket.key, "SMART-42");
        assert_eq!(ticket.issue_type, "Story");
        assert_eq!(ticket.status, "In Progress");
        assert_eq!(ticket.story_points, Some(5.0));
        assert_eq!(ticket.fix_version.as_deref(), Some("1.4"));
        assert_eq!(ticket.severity.as_deref(), Some("Major"));
        assert_eq!(
            ticket.created,
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
        );
        assert_eq!(ticket.resolved, None);
        assert_eq!(ticket.synced_at, synced);
    }

    #[test]
    fn test_identity_fallback_order() {
        // Email wins over display name.
        let raw: RawIssue = serde_json::from_value(sample_issue_json()).unwrap();
        let ticket = raw.to_ticket(Utc::now()).unwrap();
        assert_eq!(ticket.assignee.as_deref(), Some("jo@example.com"));
        // No email: display name.
        assert_eq!(ticket.creator.as_deref(), Some("Jo Dev"));
        // Neither: absent.
        assert_eq!(
            identity(Some(&RawIdentity {
                email_address: None,
                display_name: None
            })),
            None
        );
        assert_eq!(identity(None), None);
    }

    #[test]
    fn test_changelog_expansion_one_event_per_field() {
        let raw: RawIssue = serde_json::from_value(sample_issue_json()).unwrap();
        let events = expand_embedded(&raw).unwrap();
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].event_id, 90000);
        assert_eq!(events[1].event_id, 90001);
        assert_eq!(events[0].ticket_id, 10042);
        assert_eq!(events[0].field.as_deref(), Some("status"));
        assert_eq!(events[0].from_value.as_deref(), Some("Backlog"));
        assert_eq!(events[0].to_value.as_deref(), Some("In Progress"));
        // Both rows share the entry's timestamp and author.
        assert_eq!(events[0].at, events[1].at);
        assert_eq!(events[0].author, events[1].author);
    }

    #[test]
    fn test_expansion_is_stable_across_reruns() {
        let raw: RawIssue = serde_json::from_value(sample_issue_json()).unwrap();
        let a = expand_embedded(&raw).unwrap();
        let b = expand_embedded(&raw).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_oversized_changelog_entry_rejected() {
        let entry = RawChangeEntry {
            id: "900".to_string(),
            author: None,
            created: "2024-03-02T09:00:00.000+0000".to_string(),
            items: (0..=EVENT_ID_STRIDE)
                .map(|i| RawChangeItem {
                    field: format!("field{i}"),
                    from_string: None,
                    to_string: None,
                })
                .collect(),
        };
        let err = expand_changelog(10042, &[entry]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CadenceError::MalformedPayload { field, .. } if field == "changelog.items"
        ));

        // Exactly at the stride still fits: ids stay within the entry's slot.
        let entry = RawChangeEntry {
            id: "900".to_string(),
            author: None,
            created: "2024-03-02T09:00:00.000+0000".to_string(),
            items: (0..EVENT_ID_STRIDE)
                .map(|i| RawChangeItem {
                    field: format!("field{i}"),
                    from_string: None,
                    to_string: None,
                })
                .collect(),
        };
        let events = expand_changelog(10042, &[entry]).unwrap();
        assert_eq!(events.len(), EVENT_ID_STRIDE as usize);
        assert_eq!(events.last().map(|e| e.event_id), Some(90099));
    }

    #[test]
    fn test_missing_changelog_yields_no_events() {
        let mut json = sample_issue_json();
        json.as_object_mut().unwrap().remove("changelog");
        let raw: RawIssue = serde_json::from_value(json).unwrap();
        assert!(expand_embedded(&raw).unwrap().is_empty());
    }
}
