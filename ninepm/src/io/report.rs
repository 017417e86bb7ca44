//! Machine-readable dump of the annotated tree.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::tree::Suite;

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    failed: bool,
    root: &'a Suite,
}

/// Write the annotated tree as pretty-printed JSON with a trailing newline.
pub fn write_report(path: &Path, root: &Suite, failed: bool) -> Result<()> {
    let mut payload =
        serde_json::to_string_pretty(&RunReport { failed, root }).context("serialize report")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))
}
