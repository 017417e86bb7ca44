//! Hierarchical test-suite orchestrator.
//!
//! Runs suite files and bare case executables, echoes their result-protocol
//! output, and prints a pass/fail tree. Exits 0 when every case passed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use ninepm::engine::ProcessLauncher;
use ninepm::exit_codes;
use ninepm::io::console::{ColorWhen, Console};
use ninepm::logging;
use ninepm::run::{RunRequest, execute};

#[derive(Parser, Debug)]
#[command(
    name = "ninepm",
    version,
    about = "Run test cases and suites, then print a pass/fail tree",
    arg_required_else_help = true
)]
struct Cli {
    /// Config file forwarded to every case with `-c`.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug mode (forwarded to cases as `-d`).
    #[arg(short, long)]
    debug: bool,

    /// Option to pass to tests and suites (use multiple -o for multiple options).
    #[arg(short = 'o', long = "option", value_name = "OPTION", allow_hyphen_values = true)]
    options: Vec<String>,

    /// Kill a case after this many seconds and mark it failed.
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Orchestrator settings file [default: .ninepm.toml].
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Write the annotated result tree as JSON.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// When to color console output.
    #[arg(long, value_enum, default_value_t = ColorWhen::Auto)]
    color: ColorWhen,

    /// Test or suite to run.
    #[arg(value_name = "TEST|SUITE", required = true)]
    targets: Vec<PathBuf>,
}

impl Cli {
    fn into_request(self) -> RunRequest {
        RunRequest {
            targets: self.targets,
            config: self.config,
            debug: self.debug,
            options: self.options,
            timeout: self.timeout.filter(|secs| *secs > 0).map(Duration::from_secs),
            settings: self.settings,
            report: self.report,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_codes::FATAL
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let mut console = Console::stdout(cli.color);
    console.banner().context("write console")?;

    let cwd = std::env::current_dir().context("read working directory")?;
    let summary = execute(&cli.into_request(), &cwd, &ProcessLauncher, &mut console)?;
    Ok(if summary.failed {
        exit_codes::FAILED
    } else {
        exit_codes::OK
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_repeated_options() {
        let cli = Cli::parse_from([
            "ninepm", "-o", "--fast", "-o", "-v", "-d", "-c", "cfg.conf", "suite.yaml",
        ]);
        assert_eq!(cli.options, vec!["--fast", "-v"]);
        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("cfg.conf")));
        assert_eq!(cli.targets, vec![PathBuf::from("suite.yaml")]);
    }

    #[test]
    fn parse_multiple_targets_in_order() {
        let cli = Cli::parse_from(["ninepm", "a.yaml", "bin/b.sh", "c.yaml"]);
        assert_eq!(
            cli.targets,
            vec![
                PathBuf::from("a.yaml"),
                PathBuf::from("bin/b.sh"),
                PathBuf::from("c.yaml")
            ]
        );
    }

    #[test]
    fn zero_timeout_means_no_limit() {
        let cli = Cli::parse_from(["ninepm", "--timeout", "0", "a.yaml"]);
        assert_eq!(cli.into_request().timeout, None);
        let cli = Cli::parse_from(["ninepm", "-t", "3", "a.yaml"]);
        assert_eq!(cli.into_request().timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn targets_are_required() {
        assert!(Cli::try_parse_from(["ninepm", "-d"]).is_err());
    }
}
