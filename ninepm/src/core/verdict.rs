//! Pass/fail decision for a finished case.

use serde::Serialize;
use thiserror::Error;

use crate::core::protocol::{ProtocolReport, ProtocolViolation};

/// How the case process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitSummary {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    pub timed_out: bool,
}

impl ExitSummary {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            timed_out: false,
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }
}

/// Why a case was marked failed. None of these stop the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("test error, timed out")]
    TimedOut,
    #[error("{violation}")]
    Protocol { violation: ProtocolViolation },
    #[error("one or more checks reported not ok")]
    FailedCheck,
    #[error("test error, exited with status {}", fmt_code(.code))]
    NonZeroExit { code: Option<i32> },
    #[error("test error, no plan reported")]
    MissingPlan,
    #[error(
        "test error, not conforming to plan ({}/{planned}, {in_sequence} in sequence)",
        fmt_count(.observed)
    )]
    PlanMismatch {
        planned: u32,
        observed: Option<u32>,
        in_sequence: u32,
    },
}

fn fmt_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |code| code.to_string())
}

fn fmt_count(count: &Option<u32>) -> String {
    count.map_or_else(|| "none".to_string(), |count| count.to_string())
}

/// Decide a case from its protocol counters and exit status.
///
/// A case passes only when it exited 0, raised no protocol violation, reported
/// no `not ok`, the last result index equals the plan total, and results
/// `1..=total` arrived in order. When several conditions fail, the first in
/// declaration order of [`FailureReason`] is reported.
pub fn judge_case(report: &ProtocolReport, exit: &ExitSummary) -> Result<(), FailureReason> {
    if exit.timed_out {
        return Err(FailureReason::TimedOut);
    }
    if let Some(violation) = report.violation {
        return Err(FailureReason::Protocol { violation });
    }
    if report.failed_check {
        return Err(FailureReason::FailedCheck);
    }
    if !exit.success() {
        return Err(FailureReason::NonZeroExit { code: exit.code });
    }
    let Some(planned) = report.planned else {
        return Err(FailureReason::MissingPlan);
    };
    if report.observed != Some(planned) || report.in_sequence != planned {
        return Err(FailureReason::PlanMismatch {
            planned,
            observed: report.observed,
            in_sequence: report.in_sequence,
        });
    }
    Ok(())
}
