//! Hierarchical test-suite orchestrator.
//!
//! Suite files (YAML) reference executable test cases and nested suites. Each
//! case runs as a child process that reports results with a small line
//! protocol (`1..N`, `ok N - ...`, `not ok N - ...`). Results are aggregated
//! bottom-up and printed as a tree. The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (naming, protocol parsing,
//!   verdicts, rendering). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (suite files, processes, scratch
//!   database, console).
//!
//! [`engine`] walks the tree and [`run`] wires a full invocation together.

pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
