//! Configuration loading for `cadence`.
//!
//! Configuration lives in one JSON file (default `./cadence.json`, override
//! with `--config`). Connection settings are required; workflow policy has
//! defaults that match a stock Jira software project.

use crate::error::{CadenceError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename searched in the working directory.
pub const DEFAULT_CONFIG_FILENAME: &str = "cadence.json";
/// Default database filename, next to the config.
pub const DEFAULT_DB_FILENAME: &str = "cadence.db";

/// Minimum open-to-resolve duration for a ticket to count in monthly
/// metrics. Filters noise from tickets opened and closed within minutes
/// (misclicks, duplicates resolved on sight).
pub const DEFAULT_MIN_WORKED_MINUTES: i64 = 15;

/// Default search page size. The remote may cap `maxResults` lower; the
/// pagination loop tolerates short pages either way.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Full runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote tracker base URL, e.g. `https://example.atlassian.net/rest/api/2/`.
    pub url: String,
    pub username: String,
    pub api_key: String,
    /// Project key to mirror, e.g. `SMART`.
    pub project: String,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Workflow policy: which statuses mean "not started", which status is
/// terminal, and which resolutions disqualify a ticket from metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_not_started")]
    pub not_started_statuses: Vec<String>,
    #[serde(default = "default_done")]
    pub done_status: String,
    #[serde(default = "default_excluded_resolutions")]
    pub excluded_resolutions: Vec<String>,
    #[serde(default = "default_min_worked")]
    pub min_worked_minutes: i64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_not_started() -> Vec<String> {
    vec![
        "Backlog".to_string(),
        "Selected for Development".to_string(),
    ]
}

fn default_done() -> String {
    "Done".to_string()
}

fn default_excluded_resolutions() -> Vec<String> {
    vec![
        "Duplicate".to_string(),
        "Won't Do".to_string(),
        "Cannot Reproduce".to_string(),
    ]
}

const fn default_min_worked() -> i64 {
    DEFAULT_MIN_WORKED_MINUTES
}

const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            not_started_statuses: default_not_started(),
            done_status: default_done(),
            excluded_resolutions: default_excluded_resolutions(),
            min_worked_minutes: default_min_worked(),
            page_size: default_page_size(),
        }
    }
}

impl WorkflowConfig {
    /// True when `status` belongs to the configured "not started" set.
    #[must_use]
    pub fn is_not_started(&self, status: &str) -> bool {
        self.not_started_statuses.iter().any(|s| s == status)
    }
}

impl Config {
    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_FILENAME`]
    /// in the working directory when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CadenceError::Config`] when the file is missing, unreadable,
    /// malformed, or has blank required fields. The error message never
    /// echoes the API key.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME), Path::to_path_buf);

        let contents = fs::read_to_string(&path).map_err(|e| {
            CadenceError::Config(format!("cannot read {}: {e}", path.display()))
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            CadenceError::Config(format!("cannot parse {}: {e}", path.display()))
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("url", &self.url),
            ("username", &self.username),
            ("api_key", &self.api_key),
            ("project", &self.project),
        ] {
            if value.trim().is_empty() {
                return Err(CadenceError::Config(format!("'{name}' must not be empty")));
            }
        }
        if self.workflow.page_size == 0 {
            return Err(CadenceError::Config(
                "'workflow.page_size' must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL with a guaranteed trailing slash, for joining endpoints.
    #[must_use]
    pub fn base_url(&self) -> String {
        if self.url.ends_with('/') {
            self.url.clone()
        } else {
            format!("{}/", self.url)
        }
    }
}
