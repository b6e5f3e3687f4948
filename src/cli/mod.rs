//! The harness command-line interface.
//!
//! Parses arguments, installs logging, wires the process compiler and the
//! wasmtime runtime into the runner, and maps the run to an exit code.

use std::process::ExitCode;

use clap::Parser;
use miette::Report;
use tracing_subscriber::EnvFilter;

use crate::cli::args::HarnessArgs;
use crate::cli::output::Reporter;
use crate::compile::ProcessCompiler;
use crate::instantiate::WasmtimeRuntime;
use crate::runner::run_harness;

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    let args = HarnessArgs::parse();
    install_tracing();

    let config = args.config();
    let mut compiler =
        ProcessCompiler::new(args.compiler.clone()).with_leading_args(args.compiler_args.clone());
    let runtime = WasmtimeRuntime::new();
    let mut reporter = Reporter::stdout(args.color.choice());

    match run_harness(&config, &mut compiler, &runtime, &mut reporter) {
        Ok(summary) if summary.aggregate.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{:?}", Report::new(e));
            ExitCode::from(1)
        }
    }
}

/// Logs go to stderr, filtered by `RUST_LOG`; warnings only by default.
fn install_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fixture_harness=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
