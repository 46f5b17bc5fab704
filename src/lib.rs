//! Mirror a Jira project into SQLite and derive workflow timing metrics.
//!
//! The write path pulls tickets and their field-change histories through a
//! paginated, rate-limited remote client into a local store, keyed by the
//! remote's stable numeric ids and guarded by a sync watermark. The read
//! path folds the mirrored history into cycle-time, loiter-time, and
//! monthly reports.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{CadenceError, Result};
