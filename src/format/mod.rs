//! Report rendering: human-readable text and CSV export.

pub mod csv;
pub mod text;
