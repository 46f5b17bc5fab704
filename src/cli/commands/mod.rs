//! Command implementations.

pub mod cycle;
pub mod loiter;
pub mod monthly;
pub mod status;
pub mod sync;

use crate::cli::Cli;
use crate::config::{Config, DEFAULT_DB_FILENAME};
use crate::error::Result;
use crate::storage::SqliteStorage;
use std::path::PathBuf;

/// Load config and open the store as chosen by the global flags.
pub(crate) fn open_context(cli: &Cli) -> Result<(Config, SqliteStorage)> {
    let config = Config::load(cli.config.as_deref())?;
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILENAME));
    let storage = SqliteStorage::open(&db_path)?;
    Ok((config, storage))
}
