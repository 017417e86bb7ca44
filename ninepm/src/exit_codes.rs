//! Stable exit codes for the `ninepm` binary.

/// Every case passed.
pub const OK: i32 = 0;
/// The run completed and at least one case failed.
pub const FAILED: i32 = 1;
/// The run was aborted before rendering a tree (bad suite file, missing or
/// non-executable case, unusable settings).
pub const FATAL: i32 = 2;
