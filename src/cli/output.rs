//! Handles all user-facing output for the harness.
//!
//! Per-fixture progress and the final banner are written through a
//! [`Reporter`], so colors and wording stay consistent and tests can capture
//! the exact text with a [`termcolor::Buffer`].

use std::io;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::diagnostics::{FixtureError, InstantiateError};
use crate::diff::DiffReport;
use crate::fixture::TestCase;
use crate::runner::RunSummary;

/// Prefix shown before each fixture path in the per-fixture banner.
const BANNER_PREFIX: &str = "compiler/";

// ============================================================================
// REPORTER
// ============================================================================

pub struct Reporter<W: WriteColor> {
    out: W,
}

impl Reporter<StandardStream> {
    /// A reporter writing to stdout.
    pub fn stdout(choice: ColorChoice) -> Self {
        Self::new(StandardStream::stdout(choice))
    }
}

impl<W: WriteColor> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// `Testing compiler/<fixture>`
    pub fn banner(&mut self, case: &TestCase) -> io::Result<()> {
        self.colored(
            ColorSpec::new().set_fg(Some(Color::White)).set_intense(true),
            &format!("Testing {}{}", BANNER_PREFIX, case.relative_path()),
        )?;
        writeln!(self.out)
    }

    pub fn diff_ok(&mut self) -> io::Result<()> {
        self.colored(ColorSpec::new().set_fg(Some(Color::Green)), "diff OK")?;
        writeln!(self.out)
    }

    /// Prints the full diff followed by `diff ERROR`.
    pub fn diff_error(&mut self, report: &DiffReport) -> io::Result<()> {
        report.write_colored(&mut self.out)?;
        self.colored(ColorSpec::new().set_fg(Some(Color::Red)), "diff ERROR")?;
        writeln!(self.out)
    }

    pub fn recreated(&mut self) -> io::Result<()> {
        writeln!(self.out, "Recreated fixture.")
    }

    pub fn fixture_error(&mut self, err: &FixtureError) -> io::Result<()> {
        self.colored(ColorSpec::new().set_fg(Some(Color::Red)), "fixture ERROR: ")?;
        writeln!(self.out, "{err}")
    }

    pub fn instantiate_ok(&mut self) -> io::Result<()> {
        self.colored(ColorSpec::new().set_fg(Some(Color::Green)), "instantiate OK")?;
        writeln!(self.out)
    }

    pub fn instantiate_error(&mut self, err: &InstantiateError) -> io::Result<()> {
        self.colored(ColorSpec::new().set_fg(Some(Color::Red)), "instantiate ERROR: ")?;
        writeln!(self.out, "{err}")
    }

    /// Captured compiler diagnostics of a failing phase, indented. Prints
    /// nothing when there were none.
    pub fn diagnostics(&mut self, text: &str) -> io::Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        self.out
            .set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        writeln!(self.out, "  compiler diagnostics:")?;
        for line in text.lines() {
            writeln!(self.out, "  | {line}")?;
        }
        self.out.reset()
    }

    /// Blank line separating fixtures.
    pub fn case_done(&mut self) -> io::Result<()> {
        writeln!(self.out)
    }

    /// `[ SUCCESS ]`, or `ERROR: <n> compiler tests failed` and the failed names.
    pub fn summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        let failures = summary.aggregate.failures;
        if failures == 0 {
            write!(self.out, "[ ")?;
            self.colored(
                ColorSpec::new().set_fg(Some(Color::White)).set_intense(true),
                "SUCCESS",
            )?;
            writeln!(self.out, " ]")?;
        } else {
            self.colored(ColorSpec::new().set_fg(Some(Color::Red)), "ERROR: ")?;
            writeln!(self.out, "{failures} compiler tests failed")?;
            for name in summary.failed_names() {
                writeln!(self.out, "  - {name}")?;
            }
        }
        self.out.flush()
    }

    fn colored(&mut self, spec: &ColorSpec, text: &str) -> io::Result<()> {
        self.out.set_color(spec)?;
        write!(self.out, "{text}")?;
        self.out.reset()
    }
}
