//! Product output: banner, echoed case output, verdicts and the final tree.
//!
//! Everything here goes to stdout regardless of `RUST_LOG`; developer
//! diagnostics live in [`crate::logging`].

use std::ffi::OsString;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

use clap::ValueEnum;
use owo_colors::{OwoColorize, Style};

use crate::core::protocol::LineKind;
use crate::core::render::TreeLine;
use crate::core::verdict::FailureReason;

const BANNER: &str = "9PM - Simplicity is the ultimate sophistication";
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorWhen {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorWhen {
    /// Resolve `Auto` against whether stdout is a terminal.
    pub fn enabled(self) -> bool {
        match self {
            ColorWhen::Auto => io::stdout().is_terminal(),
            ColorWhen::Always => true,
            ColorWhen::Never => false,
        }
    }
}

pub struct Console<W> {
    out: W,
    color: bool,
}

impl Console<io::Stdout> {
    pub fn stdout(color: ColorWhen) -> Self {
        Self::new(io::stdout(), color.enabled())
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn banner(&mut self) -> io::Result<()> {
        let text = self.paint(BANNER, Style::new().yellow());
        writeln!(self.out, "{text}")
    }

    pub fn note(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{message}")
    }

    pub fn case_started(&mut self, id: &str) -> io::Result<()> {
        let text = self.paint(&format!("Starting test {id}"), Style::new().blue());
        writeln!(self.out, "\n{text}")
    }

    pub fn command(&mut self, program: &Path, args: &[OsString]) -> io::Result<()> {
        let mut rendered = program.display().to_string();
        for arg in args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        writeln!(self.out, "Executing: {rendered}")
    }

    /// Echo one case output line with the current local time.
    pub fn case_line(&mut self, kind: LineKind, line: &str) -> io::Result<()> {
        let stamp = chrono::Local::now().format(STAMP_FORMAT).to_string();
        self.case_line_at(&stamp, kind, line)
    }

    pub(crate) fn case_line_at(&mut self, stamp: &str, kind: LineKind, line: &str) -> io::Result<()> {
        let style = match kind {
            LineKind::Plan { .. } => Some(Style::new().purple()),
            LineKind::Ok { .. } => Some(Style::new().green()),
            LineKind::NotOk { .. } => Some(Style::new().red()),
            LineKind::Info => None,
        };
        let text = format!("{stamp} {line}");
        match style {
            Some(style) => {
                let text = self.paint(&text, style);
                writeln!(self.out, "{text}")
            }
            None => writeln!(self.out, "{text}"),
        }
    }

    pub fn case_failed(&mut self, reason: &FailureReason) -> io::Result<()> {
        writeln!(self.out, "{reason}")
    }

    pub fn summary(&mut self, failed: bool) -> io::Result<()> {
        let text = if failed {
            self.paint("✗ Execution", Style::new().red())
        } else {
            self.paint("✓ Execution", Style::new().green())
        };
        writeln!(self.out, "\n{text}")
    }

    pub fn tree(&mut self, lines: &[TreeLine]) -> io::Result<()> {
        for line in lines {
            let style = if line.outcome.is_pass() {
                Style::new().green()
            } else {
                Style::new().red()
            };
            let label = self.paint(&format!("{} {}", line.glyph(), line.id), style);
            writeln!(self.out, "{}{}", line.prefix, label)?;
        }
        self.out.flush()
    }
}
