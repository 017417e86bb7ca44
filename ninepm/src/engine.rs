//! Depth-first execution of a loaded suite tree.
//!
//! The [`CaseLauncher`] trait decouples tree traversal from process spawning.
//! [`ProcessLauncher`] runs real executables; tests use a scripted launcher
//! that replays canned output without spawning anything.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::argv::{SharedArgs, case_args};
use crate::core::protocol::ProtocolParser;
use crate::core::verdict::{ExitSummary, judge_case};
use crate::io::console::Console;
use crate::io::process::run_streaming;
use crate::tree::{Case, Node, Outcome, Suite};

/// Errors that abort the whole run. Anything else a case does is recorded
/// as an ordinary failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FatalError {
    #[error("error, test case not found {}", .0.display())]
    MissingExecutable(PathBuf),
    #[error("error, test case not executable {}", .0.display())]
    NotExecutable(PathBuf),
}

/// Require `path` to be a regular file with an execute bit set.
pub fn check_executable(path: &Path) -> Result<(), FatalError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(FatalError::MissingExecutable(path.to_path_buf())),
    };
    if !is_executable(&metadata) {
        return Err(FatalError::NotExecutable(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

/// Settings shared by every case in one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Global `-o` options.
    pub options: Vec<String>,
    /// Config file forwarded with `-c`.
    pub config: Option<PathBuf>,
    pub debug: bool,
    pub scratch_db: PathBuf,
    /// Per-case limit; `None` waits forever.
    pub timeout: Option<Duration>,
    /// Extra environment for every case process.
    pub env: Vec<(String, OsString)>,
}

impl RunContext {
    pub fn shared_args(&self) -> SharedArgs<'_> {
        SharedArgs {
            debug: self.debug,
            scratch_db: &self.scratch_db,
            config: self.config.as_deref(),
            options: &self.options,
        }
    }
}

/// One case launch.
#[derive(Debug, Clone)]
pub struct LaunchRequest<'a> {
    pub program: &'a Path,
    pub args: &'a [OsString],
    pub timeout: Option<Duration>,
    pub env: &'a [(String, OsString)],
}

/// Abstraction over how case processes are started.
pub trait CaseLauncher {
    /// Fail fatally when `program` cannot be launched at all.
    fn verify(&self, program: &Path) -> Result<(), FatalError> {
        check_executable(program)
    }

    /// Run the case, handing every stdout line to `on_line` as it arrives,
    /// and return once the process has exited.
    fn launch(
        &self,
        request: &LaunchRequest<'_>,
        on_line: &mut (dyn FnMut(&str) + Send),
    ) -> Result<ExitSummary>;
}

/// Launcher that spawns the case executable.
pub struct ProcessLauncher;

impl CaseLauncher for ProcessLauncher {
    #[instrument(skip_all, fields(program = %request.program.display()))]
    fn launch(
        &self,
        request: &LaunchRequest<'_>,
        on_line: &mut (dyn FnMut(&str) + Send),
    ) -> Result<ExitSummary> {
        let mut cmd = Command::new(request.program);
        cmd.args(request.args);
        for (key, value) in request.env {
            cmd.env(key, value);
        }
        let exit = run_streaming(cmd, request.timeout, on_line)?;
        Ok(ExitSummary {
            code: exit.status.code(),
            timed_out: exit.timed_out,
        })
    }
}

/// Run every case under `root` depth-first and annotate results in place.
///
/// Returns `true` if any case failed. Fatal conditions (a missing or
/// non-executable case, a case that cannot be spawned) return `Err` and leave
/// the remaining nodes pending.
pub fn run_tree<L: CaseLauncher, W: Write + Send>(
    root: &mut Suite,
    ctx: &RunContext,
    launcher: &L,
    console: &mut Console<W>,
) -> Result<bool> {
    let mut engine = Engine {
        ctx,
        launcher,
        console,
    };
    engine.run_suite(root)
}

struct Engine<'a, L, W> {
    ctx: &'a RunContext,
    launcher: &'a L,
    console: &'a mut Console<W>,
}

impl<L: CaseLauncher, W: Write + Send> Engine<'_, L, W> {
    fn run_suite(&mut self, suite: &mut Suite) -> Result<bool> {
        for child in &mut suite.children {
            match child {
                Node::Suite(nested) => {
                    self.run_suite(nested)?;
                }
                Node::Case(case) => self.run_case(case)?,
            }
        }
        suite.result = suite.derive_result();
        debug!(id = %suite.id, result = ?suite.result, "suite finished");
        Ok(suite.result == Outcome::Fail)
    }

    #[instrument(skip_all, fields(id = %case.id))]
    fn run_case(&mut self, case: &mut Case) -> Result<()> {
        self.launcher.verify(&case.executable)?;

        let args = case_args(&case.options, &self.ctx.shared_args());
        self.console
            .case_started(&case.id)
            .context("write console")?;
        if self.ctx.debug {
            self.console
                .command(&case.executable, &args)
                .context("write console")?;
        }

        let request = LaunchRequest {
            program: &case.executable,
            args: &args,
            timeout: self.ctx.timeout,
            env: &self.ctx.env,
        };
        let mut parser = ProtocolParser::new();
        let exit = {
            let console = &mut *self.console;
            let parser = &mut parser;
            let mut on_line = |line: &str| {
                let had_violation = parser.violation().is_some();
                let kind = parser.feed(line);
                if let Err(err) = console.case_line(kind, line) {
                    warn!(err = %err, "failed to echo case output");
                }
                if !had_violation
                    && let Some(violation) = parser.violation()
                    && let Err(err) = console.note(&violation.to_string())
                {
                    warn!(err = %err, "failed to echo protocol violation");
                }
            };
            self.launcher
                .launch(&request, &mut on_line)
                .with_context(|| format!("launch case {}", case.id))?
        };

        let report = parser.finish();
        case.planned = report.planned;
        case.observed = report.observed;
        match judge_case(&report, &exit) {
            Ok(()) => {
                case.result = Outcome::Pass;
                case.failure = None;
                info!(planned = ?case.planned, "case passed");
            }
            Err(reason) => {
                case.result = Outcome::Fail;
                case.failure = Some(reason);
                info!(%reason, "case failed");
                self.console
                    .case_failed(&reason)
                    .context("write console")?;
            }
        }
        Ok(())
    }
}

/// Value for a library search path variable: `existing` with `dir` appended
/// after a space, or just `dir`.
pub fn library_path_value(existing: Option<OsString>, dir: &Path) -> OsString {
    match existing {
        Some(mut value) if !value.is_empty() => {
            value.push(" ");
            value.push(dir);
            value
        }
        _ => dir.as_os_str().to_os_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::ProtocolViolation;
    use crate::core::verdict::FailureReason;
    use crate::test_support::{ScriptedLauncher, context, script_case, suite_with};

    fn run(root: &mut Suite, launcher: &ScriptedLauncher) -> (Result<bool>, String) {
        let mut console = Console::new(Vec::new(), false);
        let result = run_tree(root, &context(), launcher, &mut console);
        let out = String::from_utf8(console.into_inner()).expect("utf8");
        (result, out)
    }

    fn case_at(suite: &Suite, idx: usize) -> &Case {
        match &suite.children[idx] {
            Node::Case(case) => case,
            Node::Suite(_) => panic!("expected case"),
        }
    }

    #[test]
    fn passing_and_failing_cases_aggregate_to_failed_suite() {
        let launcher = ScriptedLauncher::new()
            .script("/t/a.sh", &["1..1", "ok 1 - works"], 0)
            .script("/t/b.sh", &["1..1", "not ok 1 - broken"], 1);
        let mut root = suite_with(
            "cmdl",
            vec![script_case("0000-a", "/t/a.sh"), script_case("0001-b", "/t/b.sh")],
        );

        let (result, out) = run(&mut root, &launcher);
        assert!(result.expect("run"));
        assert_eq!(root.result, Outcome::Fail);
        assert_eq!(case_at(&root, 0).result, Outcome::Pass);
        assert_eq!(case_at(&root, 1).result, Outcome::Fail);
        assert_eq!(case_at(&root, 1).failure, Some(FailureReason::FailedCheck));
        assert!(out.contains("Starting test 0000-a"));
        assert!(out.contains("not ok 1 - broken"));
    }

    #[test]
    fn failure_propagates_through_nested_suites_only() {
        let launcher = ScriptedLauncher::new()
            .script("/t/good.sh", &["1..1", "ok 1 - fine"], 0)
            .script("/t/bad.sh", &["1..2", "ok 1 - fine"], 0);
        let deep = suite_with("0002-deep", vec![script_case("0003-bad", "/t/bad.sh")]);
        let mid = suite_with("0001-mid", vec![Node::Suite(deep)]);
        let clean = suite_with("0004-clean", vec![script_case("0005-good", "/t/good.sh")]);
        let mut root = suite_with("cmdl", vec![Node::Suite(mid), Node::Suite(clean)]);

        let (result, _) = run(&mut root, &launcher);
        assert!(result.expect("run"));
        let mid = root.children[0].as_suite().expect("mid");
        assert_eq!(mid.result, Outcome::Fail);
        assert_eq!(mid.children[0].result(), Outcome::Fail);
        assert_eq!(root.children[1].result(), Outcome::Pass);
        assert!(crate::core::invariants::validate_results(&root).is_empty());
    }

    #[test]
    fn result_before_plan_fails_with_protocol_violation() {
        let launcher = ScriptedLauncher::new().script(
            "/t/early.sh",
            &["ok 1 - premature", "1..1", "ok 1 - premature"],
            0,
        );
        let mut root = suite_with("cmdl", vec![script_case("0000-early", "/t/early.sh")]);

        let (result, out) = run(&mut root, &launcher);
        assert!(result.expect("run"));
        assert_eq!(
            case_at(&root, 0).failure,
            Some(FailureReason::Protocol {
                violation: ProtocolViolation::ResultBeforePlan { index: 1 }
            })
        );
        assert_eq!(out.matches("reported before plan").count(), 2);
    }

    #[test]
    fn counts_are_recorded_on_the_case() {
        let launcher = ScriptedLauncher::new().script(
            "/t/c.sh",
            &["1..3", "ok 1 - a", "ok 2 - b", "not ok 3 - c"],
            0,
        );
        let mut root = suite_with("cmdl", vec![script_case("0000-c", "/t/c.sh")]);

        let (result, _) = run(&mut root, &launcher);
        assert!(result.expect("run"));
        let case = case_at(&root, 0);
        assert_eq!(case.planned, Some(3));
        assert_eq!(case.observed, Some(3));
        assert_eq!(case.result, Outcome::Fail);
    }

    #[test]
    fn missing_executable_aborts_the_run() {
        let launcher = ScriptedLauncher::new().script("/t/a.sh", &["1..1", "ok 1 - a"], 0);
        let mut root = suite_with(
            "cmdl",
            vec![script_case("0000-gone", "/t/gone.sh"), script_case("0001-a", "/t/a.sh")],
        );

        let (result, _) = run(&mut root, &launcher);
        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<FatalError>(),
            Some(&FatalError::MissingExecutable(PathBuf::from("/t/gone.sh")))
        );
        assert_eq!(case_at(&root, 1).result, Outcome::Pending);
        assert!(launcher.launched().is_empty());
    }

    #[test]
    fn arguments_follow_fixed_order() {
        let launcher = ScriptedLauncher::new().script("/t/a.sh", &["1..1", "ok 1 - a"], 0);
        let mut case = Case::new("0000-a", "/t/a.sh", vec!["--case".to_string()]);
        case.options.push("-x".to_string());
        let mut root = suite_with("cmdl", vec![Node::Case(case)]);
        let mut ctx = context();
        ctx.debug = true;
        ctx.config = Some(PathBuf::from("/etc/cfg"));
        ctx.options = vec!["-x".to_string()];

        let mut console = Console::new(Vec::new(), false);
        run_tree(&mut root, &ctx, &launcher, &mut console).expect("run");

        let launched = launcher.launched();
        assert_eq!(launched.len(), 1);
        let args: Vec<String> = launched[0]
            .1
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["-t", "-d", "-b", "/tmp/9pm_test_dict_db", "-c", "/etc/cfg", "--case", "-x", "-x"]
        );
        let out = String::from_utf8(console.into_inner()).expect("utf8");
        assert!(out.contains("Executing: /t/a.sh -t -d"));
    }

    #[test]
    fn empty_suite_passes() {
        let launcher = ScriptedLauncher::new();
        let empty = suite_with("0000-empty.yaml", Vec::new());
        let mut root = suite_with("cmdl", vec![Node::Suite(empty)]);
        let (result, _) = run(&mut root, &launcher);
        assert!(!result.expect("run"));
        assert_eq!(root.result, Outcome::Pass);
        assert_eq!(root.children[0].result(), Outcome::Pass);
    }

    #[test]
    fn library_path_appends_to_existing_value() {
        let dir = Path::new("/opt/9pm");
        assert_eq!(library_path_value(None, dir), OsString::from("/opt/9pm"));
        assert_eq!(
            library_path_value(Some(OsString::from("/usr/lib/tcl")), dir),
            OsString::from("/usr/lib/tcl /opt/9pm")
        );
    }

    #[cfg(unix)]
    #[test]
    fn check_executable_distinguishes_missing_and_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("case.sh");
        assert!(matches!(
            check_executable(&path),
            Err(FatalError::MissingExecutable(_))
        ));

        fs::write(&path, "#!/bin/sh\n").expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");
        assert!(matches!(
            check_executable(&path),
            Err(FatalError::NotExecutable(_))
        ));

        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        assert_eq!(check_executable(&path), Ok(()));

        assert!(matches!(
            check_executable(temp.path()),
            Err(FatalError::MissingExecutable(_))
        ));
    }
}
