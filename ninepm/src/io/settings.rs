//! Orchestrator settings stored in `.ninepm.toml`.
//!
//! Settings tune the orchestrator itself. The `-c` config file given on the
//! command line is unrelated: it is only forwarded to the cases.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default settings file, looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = ".ninepm.toml";

/// Orchestrator settings (TOML).
///
/// Missing fields take their defaults, and a missing file is the same as an
/// empty one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerSettings {
    /// Per-case wall-clock limit in seconds. `0` waits forever.
    pub case_timeout_secs: u64,

    /// Directory for the scratch database. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// Environment variable extended with `library_dir` for every case.
    pub library_path_var: String,

    /// Helper library directory. Defaults to the directory of the executable.
    pub library_dir: Option<PathBuf>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            case_timeout_secs: 0,
            scratch_dir: None,
            library_path_var: "TCLLIBPATH".to_string(),
            library_dir: None,
        }
    }
}

impl RunnerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.library_path_var.trim().is_empty() {
            return Err(anyhow!("library_path_var must be non-empty"));
        }
        if self.library_path_var.contains('=') {
            return Err(anyhow!("library_path_var must not contain '='"));
        }
        Ok(())
    }

    pub fn case_timeout(&self) -> Option<Duration> {
        (self.case_timeout_secs > 0).then(|| Duration::from_secs(self.case_timeout_secs))
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `RunnerSettings::default()`.
pub fn load_settings(path: &Path) -> Result<RunnerSettings> {
    if !path.exists() {
        let settings = RunnerSettings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: RunnerSettings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}
