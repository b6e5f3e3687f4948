//! Fixture Test Runner
//!
//! Drives every selected fixture through the two compile pipelines and records
//! one outcome per fixture.
//!
//! # Stages
//!
//! Each fixture moves through a fixed sequence of stages, one at a time:
//!
//! ```text
//! Pending → CompilingText → Verifying | RecordingFixture
//!         → CompilingBinary → Instantiating → Done(Success | Failure)
//! ```
//!
//! 1. **CompilingText**: unoptimized text output with a source map.
//! 2. **Verifying**: diff the text against the golden fixture, or
//!    **RecordingFixture**: overwrite the golden fixture (`--create`).
//! 3. **CompilingBinary**: optimized binary output, reusing the same sinks
//!    after a reset.
//! 4. **Instantiating**: load the binary into the module runtime.
//! 5. **Done**: the outcome is tallied exactly once.
//!
//! A compile error never ends a fixture early; it is appended to the
//! diagnostics and whatever output was produced is verified as usual. Only a
//! golden fixture that cannot be read or written ends a fixture early.

use std::fmt;
use std::path::PathBuf;

use termcolor::WriteColor;
use tracing::{debug, info_span};

use crate::cli::output::Reporter;
use crate::compile::{run_compile_step, CompileIo, CompileMode, Compiler};
use crate::diagnostics::HarnessError;
use crate::diff::diff;
use crate::discovery::{discover_fixtures, select_fixtures};
use crate::fixture::{FixtureStore, TestCase};
use crate::instantiate::{validate_instantiation, ModuleRuntime};
use crate::sink::OutputSink;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Whether golden fixtures are checked or rewritten. Chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Verify,
    Create,
}

/// Everything a run needs besides the compiler and runtime.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub base_dir: PathBuf,
    pub mode: RunMode,
    /// Fixture base names to run; empty runs everything.
    pub tests: Vec<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("tests/compiler"),
            mode: RunMode::Verify,
            tests: Vec::new(),
        }
    }
}

// =============================================================================
// CORE TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    CompilingText,
    Verifying,
    RecordingFixture,
    CompilingBinary,
    Instantiating,
    Done(Outcome),
}

/// Why a fixture failed. A fixture can fail both its diff and its
/// instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    DiffMismatch { changed_lines: usize },
    Fixture(String),
    Instantiate(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::DiffMismatch { changed_lines } => {
                write!(f, "golden fixture mismatch ({changed_lines} changed lines)")
            }
            FailureReason::Fixture(msg) => write!(f, "fixture error: {msg}"),
            FailureReason::Instantiate(msg) => write!(f, "instantiate error: {msg}"),
        }
    }
}

/// The recorded result of one fixture.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub case: TestCase,
    pub outcome: Outcome,
    pub failures: Vec<FailureReason>,
    /// Every stage the fixture entered, in order, ending with `Done`.
    pub stages: Vec<Stage>,
}

/// Running success/failure counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateResult {
    pub successes: usize,
    pub failures: usize,
}

impl AggregateResult {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.successes += 1,
            Outcome::Failure => self.failures += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.successes + self.failures
    }

    pub fn is_success(&self) -> bool {
        self.failures == 0
    }
}

/// The result of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub aggregate: AggregateResult,
    pub cases: Vec<CaseOutcome>,
}

impl RunSummary {
    pub fn failed_names(&self) -> Vec<&str> {
        self.cases
            .iter()
            .filter(|c| c.outcome == Outcome::Failure)
            .map(|c| c.case.base_name())
            .collect()
    }
}

/// Per-fixture mutable state. The two sinks belong to this fixture only and
/// are reset between the text and binary phases.
struct CaseRun<'c> {
    case: &'c TestCase,
    stdout: OutputSink,
    stderr: OutputSink,
    failures: Vec<FailureReason>,
}

impl CaseRun<'_> {
    fn io(&mut self) -> CompileIo<'_> {
        CompileIo {
            stdout: &mut self.stdout,
            stderr: &mut self.stderr,
        }
    }

    fn reset_sinks(&mut self) {
        self.stdout.reset();
        self.stderr.reset();
    }

    fn outcome(&self) -> Outcome {
        if self.failures.is_empty() {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

// =============================================================================
// TEST RUNNER
// =============================================================================

pub struct TestRunner<'a, W: WriteColor> {
    compiler: &'a mut dyn Compiler,
    runtime: &'a dyn ModuleRuntime,
    reporter: &'a mut Reporter<W>,
    store: FixtureStore,
    mode: RunMode,
}

impl<'a, W: WriteColor> TestRunner<'a, W> {
    pub fn new(
        config: &HarnessConfig,
        compiler: &'a mut dyn Compiler,
        runtime: &'a dyn ModuleRuntime,
        reporter: &'a mut Reporter<W>,
    ) -> Self {
        Self {
            compiler,
            runtime,
            reporter,
            store: FixtureStore::new(&config.base_dir),
            mode: config.mode,
        }
    }

    /// Runs `cases` one after another and prints the final summary.
    pub fn run_all(&mut self, cases: &[TestCase]) -> Result<RunSummary, HarnessError> {
        let mut summary = RunSummary::default();
        for case in cases {
            let outcome = self.run_case(case, &mut summary.aggregate)?;
            summary.cases.push(outcome);
        }
        self.reporter.summary(&summary)?;
        Ok(summary)
    }

    /// Runs a single fixture to `Done` and records its outcome in `aggregate`.
    pub fn run_case(
        &mut self,
        case: &TestCase,
        aggregate: &mut AggregateResult,
    ) -> Result<CaseOutcome, HarnessError> {
        let _span = info_span!("fixture", name = case.base_name()).entered();

        let mut run = CaseRun {
            case,
            stdout: OutputSink::new(),
            stderr: OutputSink::echoing(),
            failures: Vec::new(),
        };
        let mut stages = Vec::new();
        let mut stage = Stage::Pending;

        let outcome = loop {
            stages.push(stage);
            if let Stage::Done(outcome) = stage {
                aggregate.record(outcome);
                break outcome;
            }
            let next = self.step(&mut run, stage)?;
            debug!(from = ?stage, to = ?next, "stage transition");
            stage = next;
        };

        self.reporter.case_done()?;
        Ok(CaseOutcome {
            case: case.clone(),
            outcome,
            failures: run.failures,
            stages,
        })
    }

    /// Performs the work of `stage` and returns the stage to enter next.
    fn step(&mut self, run: &mut CaseRun<'_>, stage: Stage) -> Result<Stage, HarnessError> {
        let base_dir = self.store.base_dir().to_path_buf();
        let next = match stage {
            Stage::Pending => {
                self.reporter.banner(run.case)?;
                Stage::CompilingText
            }
            Stage::CompilingText => {
                run_compile_step(self.compiler, run.case, &base_dir, CompileMode::Text, run.io());
                match self.mode {
                    RunMode::Verify => Stage::Verifying,
                    RunMode::Create => Stage::RecordingFixture,
                }
            }
            Stage::Verifying => match self.store.read_golden(run.case) {
                Ok(expected) => {
                    let actual = run.stdout.to_text();
                    match diff(&run.case.golden_name(), &expected, &actual) {
                        None => self.reporter.diff_ok()?,
                        Some(report) => {
                            self.reporter.diff_error(&report)?;
                            self.captured_diagnostics(run)?;
                            run.failures.push(FailureReason::DiffMismatch {
                                changed_lines: report.changed_lines(),
                            });
                        }
                    }
                    run.reset_sinks();
                    Stage::CompilingBinary
                }
                Err(err) => {
                    self.reporter.fixture_error(&err)?;
                    run.failures.push(FailureReason::Fixture(err.to_string()));
                    Stage::Done(Outcome::Failure)
                }
            },
            Stage::RecordingFixture => match self.store.write_golden(run.case, &run.stdout.to_text()) {
                Ok(path) => {
                    debug!(path = %path.display(), "golden fixture written");
                    self.reporter.recreated()?;
                    run.reset_sinks();
                    Stage::CompilingBinary
                }
                Err(err) => {
                    self.reporter.fixture_error(&err)?;
                    run.failures.push(FailureReason::Fixture(err.to_string()));
                    Stage::Done(Outcome::Failure)
                }
            },
            Stage::CompilingBinary => {
                run_compile_step(
                    self.compiler,
                    run.case,
                    &base_dir,
                    CompileMode::Optimized,
                    run.io(),
                );
                Stage::Instantiating
            }
            Stage::Instantiating => {
                match validate_instantiation(self.runtime, &run.stdout.to_bytes()) {
                    Ok(_) => self.reporter.instantiate_ok()?,
                    Err(err) => {
                        self.reporter.instantiate_error(&err)?;
                        self.captured_diagnostics(run)?;
                        run.failures.push(FailureReason::Instantiate(err.to_string()));
                    }
                }
                Stage::Done(run.outcome())
            }
            Stage::Done(outcome) => Stage::Done(outcome),
        };
        Ok(next)
    }

    /// Prints the failing phase's diagnostics unless they were already echoed
    /// live while the compiler ran.
    fn captured_diagnostics(&mut self, run: &CaseRun<'_>) -> Result<(), HarnessError> {
        if !run.stderr.is_echoing() {
            self.reporter.diagnostics(&run.stderr.to_text())?;
        }
        Ok(())
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Discovers, filters and runs the fixtures described by `config`.
///
/// Fails before compiling anything if the requested names match no fixture.
pub fn run_harness<W: WriteColor>(
    config: &HarnessConfig,
    compiler: &mut dyn Compiler,
    runtime: &dyn ModuleRuntime,
    reporter: &mut Reporter<W>,
) -> Result<RunSummary, HarnessError> {
    let discovered = discover_fixtures(&config.base_dir)?;
    let cases = select_fixtures(discovered, &config.tests)?;
    debug!(selected = cases.len(), mode = ?config.mode, "starting run");

    TestRunner::new(config, compiler, runtime, reporter).run_all(&cases)
}
