//! Argument vector handed to every case process.

use std::ffi::OsString;
use std::path::Path;

/// Flags shared by every case in one run.
#[derive(Debug, Clone, Copy)]
pub struct SharedArgs<'a> {
    pub debug: bool,
    pub scratch_db: &'a Path,
    pub config: Option<&'a Path>,
    /// Global `-o` options, appended after the case's own options.
    pub options: &'a [String],
}

/// Build `-t [-d] -b <db> [-c <config>] <case opts...> <global opts...>`.
///
/// Options are not deduplicated; a case sees repeats when a suite and the
/// command line pass the same flag.
pub fn case_args(case_options: &[String], shared: &SharedArgs<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-t".into()];
    if shared.debug {
        args.push("-d".into());
    }
    args.push("-b".into());
    args.push(shared.scratch_db.into());
    if let Some(config) = shared.config {
        args.push("-c".into());
        args.push(config.into());
    }
    args.extend(case_options.iter().map(OsString::from));
    args.extend(shared.options.iter().map(OsString::from));
    args
}
