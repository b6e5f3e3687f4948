//! One invocation of the compiler under test.
//!
//! The compiler is a black box: it receives an argv and a pair of sinks, and
//! returns once with an optional error. Its output lands in the sinks whether
//! or not it succeeded.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

use tracing::debug;

use crate::diagnostics::CompileError;
use crate::fixture::TestCase;
use crate::sink::OutputSink;

/// Which of the two pipelines a compile step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// Unoptimized text format with a source map, written to the output sink.
    Text,
    /// Optimized binary written to the output sink, optimized text written
    /// next to the fixture.
    Optimized,
}

impl CompileMode {
    /// The exact arguments passed to the compiler for `case`.
    pub fn argv(self, case: &TestCase, base_dir: &Path) -> Vec<String> {
        let mut argv = vec![
            case.relative_path().to_string(),
            "--baseDir".to_string(),
            base_dir.display().to_string(),
        ];
        match self {
            CompileMode::Text => {
                argv.push("-t".to_string());
                argv.push("--sourceMap".to_string());
            }
            CompileMode::Optimized => {
                argv.push("-t".to_string());
                argv.push(case.optimized_name());
                argv.push("-b".to_string());
                argv.push("-O".to_string());
            }
        }
        argv
    }
}

/// The streams a compiler writes to during one invocation.
pub struct CompileIo<'a> {
    pub stdout: &'a mut OutputSink,
    pub stderr: &'a mut OutputSink,
}

/// A compiler the harness can drive.
///
/// Any `FnMut(&[String], &mut CompileIo) -> Result<(), CompileError>` closure
/// is a compiler, which is how in-process compilers are plugged in.
pub trait Compiler {
    fn compile(&mut self, argv: &[String], io: &mut CompileIo<'_>) -> Result<(), CompileError>;
}

impl<F> Compiler for F
where
    F: FnMut(&[String], &mut CompileIo<'_>) -> Result<(), CompileError>,
{
    fn compile(&mut self, argv: &[String], io: &mut CompileIo<'_>) -> Result<(), CompileError> {
        self(argv, io)
    }
}

/// What a compile step hands to the next stage.
#[derive(Debug)]
pub struct CompletionResult {
    pub mode: CompileMode,
    pub error: Option<CompileError>,
}

impl CompletionResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs `compiler` once for `case` in `mode`.
///
/// A compile error is appended to `io.stderr` as one line and returned in the
/// result; it does not stop the caller from using whatever output the
/// compiler did produce.
pub fn run_compile_step(
    compiler: &mut dyn Compiler,
    case: &TestCase,
    base_dir: &Path,
    mode: CompileMode,
    mut io: CompileIo<'_>,
) -> CompletionResult {
    let argv = mode.argv(case, base_dir);
    debug!(fixture = case.base_name(), ?mode, ?argv, "invoking compiler");

    let started = Instant::now();
    let error = compiler.compile(&argv, &mut io).err();

    if let Some(err) = &error {
        debug!(fixture = case.base_name(), ?mode, %err, "compiler reported an error");
        io.stderr.write_str(&format!("{err}\n"));
    }
    debug!(
        fixture = case.base_name(),
        ?mode,
        elapsed_ms = started.elapsed().as_millis() as u64,
        stdout_bytes = io.stdout.len(),
        stderr_bytes = io.stderr.len(),
        "compiler finished"
    );

    CompletionResult { mode, error }
}

/// Runs an external compiler executable, e.g. `node bin/asc.js`.
///
/// Captured stdout goes to the output sink, captured stderr to the
/// diagnostics sink. A non-zero exit status is reported as an error.
#[derive(Debug, Clone)]
pub struct ProcessCompiler {
    program: String,
    leading_args: Vec<String>,
}

impl ProcessCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the harness-generated argv on every call.
    pub fn with_leading_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.leading_args.extend(args);
        self
    }
}

impl Compiler for ProcessCompiler {
    fn compile(&mut self, argv: &[String], io: &mut CompileIo<'_>) -> Result<(), CompileError> {
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(argv)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CompileError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.stdout.is_empty() {
            io.stdout.write_bytes(&output.stdout);
        }
        if !output.stderr.is_empty() {
            match std::str::from_utf8(&output.stderr) {
                Ok(text) => io.stderr.write_str(text),
                Err(_) => io.stderr.write_bytes(&output.stderr),
            }
        }

        if !output.status.success() {
            return Err(CompileError::Exit {
                status: output.status,
            });
        }
        Ok(())
    }
}
