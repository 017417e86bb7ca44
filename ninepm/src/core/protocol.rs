//! Streaming parser for the line-oriented result protocol.
//!
//! Cases print one event per line on stdout:
//!
//! ```text
//! 1..3
//! ok 1 - first check
//! not ok 2 - second check
//! some diagnostic text
//! ```
//!
//! The parser is a small state machine (`AwaitingPlan` → `InProgress`) fed one
//! line at a time. It does not know about processes; whatever reads the
//! output drives it.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

static PLAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\.\.(\d+)$").unwrap());
static OK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ok (\d+) -").unwrap());
static NOT_OK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^not ok (\d+) -").unwrap());

/// Classification of a single output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Plan { first: u32, last: u32 },
    Ok { index: u32 },
    NotOk { index: u32 },
    Info,
}

/// Classify a line, trying plan, ok, then not ok.
///
/// Trailing whitespace (including `\r`) is ignored. Numbers that do not fit in
/// a `u32` make the line informational.
pub fn classify(line: &str) -> LineKind {
    let line = line.trim_end();
    if let Some(caps) = PLAN_RE.captures(line)
        && let (Ok(first), Ok(last)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>())
    {
        return LineKind::Plan { first, last };
    }
    if let Some(index) = capture_index(&OK_RE, line) {
        return LineKind::Ok { index };
    }
    if let Some(index) = capture_index(&NOT_OK_RE, line) {
        return LineKind::NotOk { index };
    }
    LineKind::Info
}

fn capture_index(re: &Regex, line: &str) -> Option<u32> {
    re.captures(line).and_then(|caps| caps[1].parse().ok())
}

/// Non-fatal protocol error; the case fails but the run continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum ProtocolViolation {
    #[error("test error, result {index} reported before plan")]
    ResultBeforePlan { index: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingPlan,
    InProgress,
}

/// Final counters for one case once its output stream has closed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProtocolReport {
    /// Last plan total seen.
    pub planned: Option<u32>,
    /// Index of the last result line seen.
    pub observed: Option<u32>,
    /// Length of the `1, 2, .., k` run of result indices reported in order.
    pub in_sequence: u32,
    /// At least one `not ok` line was seen.
    pub failed_check: bool,
    /// First protocol violation, if any.
    pub violation: Option<ProtocolViolation>,
}

#[derive(Debug)]
pub struct ProtocolParser {
    state: State,
    planned: Option<u32>,
    observed: Option<u32>,
    in_sequence: u32,
    failed_check: bool,
    violation: Option<ProtocolViolation>,
}

impl Default for ProtocolParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolParser {
    pub fn new() -> Self {
        Self {
            state: State::AwaitingPlan,
            planned: None,
            observed: None,
            in_sequence: 0,
            failed_check: false,
            violation: None,
        }
    }

    /// Consume one line and return its classification.
    pub fn feed(&mut self, line: &str) -> LineKind {
        let kind = classify(line);
        match kind {
            LineKind::Plan { last, .. } => {
                self.planned = Some(last);
                self.state = State::InProgress;
            }
            LineKind::Ok { index } => self.record_result(index),
            LineKind::NotOk { index } => {
                self.failed_check = true;
                self.record_result(index);
            }
            LineKind::Info => {}
        }
        kind
    }

    fn record_result(&mut self, index: u32) {
        if self.state == State::AwaitingPlan && self.violation.is_none() {
            self.violation = Some(ProtocolViolation::ResultBeforePlan { index });
        }
        self.observed = Some(index);
        if Some(index) == self.in_sequence.checked_add(1) {
            self.in_sequence = index;
        }
    }

    /// Violation raised so far, if any.
    pub fn violation(&self) -> Option<ProtocolViolation> {
        self.violation
    }

    pub fn finish(self) -> ProtocolReport {
        ProtocolReport {
            planned: self.planned,
            observed: self.observed,
            in_sequence: self.in_sequence,
            failed_check: self.failed_check,
            violation: self.violation,
        }
    }
}
