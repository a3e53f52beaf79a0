//! Lightweight cli/daemon that tracks how long watched applications run each day and warns when
//! a daily limit is exceeded. Usage is kept in a local SQLite database, settings in a JSON file.
//!

pub mod cli;
pub mod daemon;
pub mod fs;
pub mod utils;
