//! Defines the command-line arguments for the harness.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use termcolor::ColorChoice;

use crate::runner::{HarnessConfig, RunMode};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "fixture-harness",
    version,
    about = "Compiles every compiler fixture twice and checks the results.",
    long_about = "Compiles every compiler fixture twice and checks the results.\n\n\
        Runs all tests if no tests have been specified.\n\
        Recreates affected fixtures if --create is specified.",
    override_usage = "fixture-harness [test1 test2 ...] [--create]"
)]
pub struct HarnessArgs {
    /// Fixtures to run, by path relative to the base directory without `.ts`.
    #[arg(value_name = "TESTS")]
    pub tests: Vec<String>,

    /// Rewrite the golden fixtures instead of checking them.
    #[arg(long)]
    pub create: bool,

    /// Directory containing the `.ts` fixtures and their `.wast` goldens.
    #[arg(long, env = "FIXTURE_HARNESS_BASE_DIR", default_value = "tests/compiler")]
    pub base_dir: PathBuf,

    /// Compiler executable to invoke.
    #[arg(long, env = "FIXTURE_HARNESS_COMPILER", default_value = "asc")]
    pub compiler: String,

    /// Argument placed before the generated compiler arguments (repeatable),
    /// e.g. `--compiler node --compiler-arg bin/asc.js`.
    #[arg(long = "compiler-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub compiler_args: Vec<String>,

    /// When to color the output.
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// `auto` colors only when stdout is a terminal.
    pub fn choice(self) -> ColorChoice {
        match self {
            ColorMode::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
            ColorMode::Auto => ColorChoice::Never,
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
        }
    }
}

impl HarnessArgs {
    pub fn config(&self) -> HarnessConfig {
        HarnessConfig {
            base_dir: self.base_dir.clone(),
            mode: if self.create {
                RunMode::Create
            } else {
                RunMode::Verify
            },
            tests: self.tests.clone(),
        }
    }
}
