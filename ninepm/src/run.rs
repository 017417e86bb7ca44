//! Orchestration for one `ninepm` invocation.
//!
//! Loads settings and the suite tree, owns the scratch database for the
//! duration of the run, drives the engine, then prints the summary and tree.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::core::invariants::{validate_results, validate_structure};
use crate::core::naming::NameAllocator;
use crate::core::render::render_tree;
use crate::engine::{CaseLauncher, RunContext, library_path_value, run_tree};
use crate::io::console::Console;
use crate::io::report::write_report;
use crate::io::scratch::ScratchDb;
use crate::io::settings::{DEFAULT_SETTINGS_FILE, RunnerSettings, load_settings};
use crate::io::suite_file::load_invocation;
use crate::tree::Suite;

/// Everything the command line contributes to a run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Suite files and bare case executables, in command-line order.
    pub targets: Vec<PathBuf>,
    /// Config file forwarded to every case.
    pub config: Option<PathBuf>,
    pub debug: bool,
    /// Options forwarded to every case after its own.
    pub options: Vec<String>,
    /// Overrides `case_timeout_secs` from the settings file.
    pub timeout: Option<Duration>,
    /// Settings file; defaults to `.ninepm.toml` in the working directory.
    pub settings: Option<PathBuf>,
    /// Where to write the JSON report, if anywhere.
    pub report: Option<PathBuf>,
}

/// Result of a completed (non-fatal) run.
#[derive(Debug)]
pub struct RunSummary {
    pub failed: bool,
    pub root: Suite,
}

/// Execute a full run rooted at `cwd`.
///
/// Returns `Err` only for fatal conditions (bad settings, suite load errors,
/// missing or non-executable cases); in that case nothing is rendered. The
/// scratch database is removed on every return path.
pub fn execute<L: CaseLauncher, W: Write + Send>(
    request: &RunRequest,
    cwd: &Path,
    launcher: &L,
    console: &mut Console<W>,
) -> Result<RunSummary> {
    let settings_path = request
        .settings
        .clone()
        .unwrap_or_else(|| cwd.join(DEFAULT_SETTINGS_FILE));
    let settings = load_settings(&settings_path)?;
    debug!(?settings, "settings loaded");

    let mut names = NameAllocator::new();
    let mut root = load_invocation(&request.targets, cwd, &mut names)?;
    let errors = validate_structure(&root);
    if !errors.is_empty() {
        bail!("invalid suite tree:\n- {}", errors.join("\n- "));
    }
    info!(nodes = names.allocated(), "suite tree loaded");

    let scratch = ScratchDb::create(settings.scratch_dir.as_deref())?;
    if request.debug {
        console
            .note(&format!("Created databasefile: {}", scratch.path().display()))
            .context("write console")?;
    }

    let ctx = RunContext {
        options: request.options.clone(),
        config: request
            .config
            .as_ref()
            .map(|config| absolute_from(cwd, config)),
        debug: request.debug,
        scratch_db: scratch.path().to_path_buf(),
        timeout: request.timeout.or_else(|| settings.case_timeout()),
        env: library_env(&settings)?,
    };
    let failed = run_tree(&mut root, &ctx, launcher, console)?;

    let errors = validate_results(&root);
    if !errors.is_empty() {
        warn!(errors = ?errors, "result invariants violated");
    }

    console.summary(failed).context("write console")?;
    console.tree(&render_tree(&root)).context("write console")?;

    if let Some(report) = &request.report {
        write_report(&absolute_from(cwd, report), &root, failed)?;
    }

    Ok(RunSummary { failed, root })
}

fn absolute_from(cwd: &Path, path: &Path) -> PathBuf {
    cwd.join(path)
}

/// Extend the configured library path variable with the helper directory.
fn library_env(settings: &RunnerSettings) -> Result<Vec<(String, std::ffi::OsString)>> {
    let dir = match &settings.library_dir {
        Some(dir) => dir.clone(),
        None => {
            let exe = std::env::current_exe().context("locate current executable")?;
            let exe = std::fs::canonicalize(&exe).unwrap_or(exe);
            exe.parent()
                .map(Path::to_path_buf)
                .context("executable has no parent directory")?
        }
    };
    let var = settings.library_path_var.clone();
    let value = library_path_value(std::env::var_os(&var), &dir);
    Ok(vec![(var, value)])
}
