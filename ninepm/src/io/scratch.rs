//! Run-scoped scratch database file shared by every case.

use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::debug;

/// Temporary file handed to every case with `-b <path>`.
///
/// Created once per run and removed on drop, so it goes away on every exit
/// path that unwinds through the owner, fatal errors included.
#[derive(Debug)]
pub struct ScratchDb {
    file: NamedTempFile,
}

impl ScratchDb {
    /// Create `9pm_XXXX_dict_db` in `dir`, or the system temp dir when `None`.
    pub fn create(dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("9pm_").suffix("_dict_db");
        let file = match dir {
            Some(dir) => builder
                .tempfile_in(dir)
                .with_context(|| format!("create scratch database in {}", dir.display()))?,
            None => builder.tempfile().context("create scratch database")?,
        };
        debug!(path = %file.path().display(), "scratch database created");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
