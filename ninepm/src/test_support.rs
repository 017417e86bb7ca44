//! Test-only helpers for building trees and replaying case output.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::verdict::ExitSummary;
use crate::engine::{CaseLauncher, FatalError, LaunchRequest, RunContext};
use crate::tree::{Case, Node, Outcome, Suite};

/// Create a pending suite with the given children.
pub fn suite_with(id: &str, children: Vec<Node>) -> Suite {
    Suite {
        children,
        ..Suite::new(id, format!("/suites/{id}"))
    }
}

/// Create a case node with an explicit result and no counters.
pub fn case_with(id: &str, result: Outcome) -> Node {
    let mut case = Case::new(id, format!("/cases/{id}"), Vec::new());
    case.result = result;
    Node::Case(case)
}

/// Create a passed case whose plan and observed counts are both `count`.
pub fn passed_case(id: &str, count: u32) -> Node {
    let mut case = Case::new(id, format!("/cases/{id}"), Vec::new());
    case.result = Outcome::Pass;
    case.planned = Some(count);
    case.observed = Some(count);
    Node::Case(case)
}

/// Create a pending case pointing at `executable`.
pub fn script_case(id: &str, executable: &str) -> Node {
    Node::Case(Case::new(id, executable, Vec::new()))
}

/// Run context with a fixed scratch path and no options.
pub fn context() -> RunContext {
    RunContext {
        options: Vec::new(),
        config: None,
        debug: false,
        scratch_db: PathBuf::from("/tmp/9pm_test_dict_db"),
        timeout: None,
        env: Vec::new(),
    }
}

#[derive(Debug, Clone)]
struct Script {
    lines: Vec<String>,
    exit: ExitSummary,
}

/// Launcher that replays canned stdout per executable path.
///
/// Executables without a script are reported missing by `verify`.
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    scripts: HashMap<PathBuf, Script>,
    launched: RefCell<Vec<(PathBuf, Vec<OsString>)>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register output lines and an exit code for `program`.
    pub fn script(self, program: &str, lines: &[&str], code: i32) -> Self {
        self.script_exit(program, lines, ExitSummary::exited(code))
    }

    pub fn script_exit(mut self, program: &str, lines: &[&str], exit: ExitSummary) -> Self {
        self.scripts.insert(
            PathBuf::from(program),
            Script {
                lines: lines.iter().map(|line| line.to_string()).collect(),
                exit,
            },
        );
        self
    }

    /// Programs launched so far with their arguments, in order.
    pub fn launched(&self) -> Vec<(PathBuf, Vec<OsString>)> {
        self.launched.borrow().clone()
    }
}

impl CaseLauncher for ScriptedLauncher {
    fn verify(&self, program: &Path) -> Result<(), FatalError> {
        if self.scripts.contains_key(program) {
            Ok(())
        } else {
            Err(FatalError::MissingExecutable(program.to_path_buf()))
        }
    }

    fn launch(
        &self,
        request: &LaunchRequest<'_>,
        on_line: &mut (dyn FnMut(&str) + Send),
    ) -> Result<ExitSummary> {
        self.launched
            .borrow_mut()
            .push((request.program.to_path_buf(), request.args.to_vec()));
        let script = self
            .scripts
            .get(request.program)
            .ok_or_else(|| anyhow::anyhow!("no script for {}", request.program.display()))?;
        for line in &script.lines {
            on_line(line);
        }
        Ok(script.exit)
    }
}
