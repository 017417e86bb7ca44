//! Deterministic, pure logic shared by the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod argv;
pub mod invariants;
pub mod naming;
pub mod protocol;
pub mod render;
pub mod verdict;
