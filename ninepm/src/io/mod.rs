//! I/O helpers for a run.

pub mod console;
pub mod process;
pub mod report;
pub mod scratch;
pub mod settings;
pub mod suite_file;
