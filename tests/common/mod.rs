//! Shared helpers for the harness integration tests.
//!
//! The fake compiler treats each `.ts` fixture's contents as WebAssembly
//! text: text mode echoes the source, optimized mode assembles it to binary.

#![allow(dead_code)]

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use fixture_harness::cli::output::Reporter;
use fixture_harness::compile::{CompileIo, Compiler};
use fixture_harness::instantiate::WasmtimeRuntime;
use fixture_harness::runner::{run_harness, HarnessConfig, RunMode, RunSummary};
use fixture_harness::{CompileError, HarnessError};
use tempfile::TempDir;

pub const ADD_WAT: &str = "(module\n (func $add (export \"add\") (param i32 i32) (result i32)\n  (i32.add\n   (local.get 0)\n   (local.get 1)\n  )\n )\n)\n";

pub const IMPORTS_WAT: &str = "(module\n (import \"env\" \"abort\" (func (param i32 i32 i32 i32)))\n (import \"my\" \"externalConstant\" (global i32))\n)\n";

pub const UNSATISFIED_WAT: &str = "(module\n (import \"env\" \"notProvided\" (func))\n)\n";

/// A temporary fixture directory.
pub struct FixtureDir {
    dir: TempDir,
}

impl FixtureDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `<name>.ts` with `source` as its contents.
    pub fn source(&self, name: &str, source: &str) -> &Self {
        self.write(&format!("{name}.ts"), source);
        self
    }

    /// Writes the golden `<name>.wast`.
    pub fn golden(&self, name: &str, text: &str) -> &Self {
        self.write(&format!("{name}.wast"), text);
        self
    }

    pub fn read_golden(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(format!("{name}.wast"))).expect("golden exists")
    }

    fn write(&self, relative: &str, contents: &str) {
        let path: PathBuf = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(path, contents).expect("write fixture");
    }
}

/// In-process compiler whose "source language" is WAT.
#[derive(Default)]
pub struct WatCompiler {
    pub calls: Cell<usize>,
}

impl Compiler for WatCompiler {
    fn compile(&mut self, argv: &[String], io: &mut CompileIo<'_>) -> Result<(), CompileError> {
        self.calls.set(self.calls.get() + 1);
        let source_path = Path::new(&argv[2]).join(&argv[0]);
        let source = fs::read_to_string(&source_path)
            .map_err(|e| CompileError::Failed(format!("cannot read {}: {e}", source_path.display())))?;

        if argv.iter().any(|a| a == "-b") {
            let bytes = wat::parse_str(&source).map_err(|e| CompileError::Failed(e.to_string()))?;
            io.stdout.write_bytes(&bytes);
        } else {
            io.stdout.write_str(&source);
        }
        Ok(())
    }
}

/// Output of one harness run.
pub struct Run {
    pub result: Result<RunSummary, HarnessError>,
    pub printed: String,
}

pub fn run(dir: &FixtureDir, mode: RunMode, tests: &[&str], compiler: &mut WatCompiler) -> Run {
    let config = HarnessConfig {
        base_dir: dir.path().to_path_buf(),
        mode,
        tests: tests.iter().map(|t| t.to_string()).collect(),
    };
    let mut reporter = Reporter::new(termcolor::Buffer::no_color());
    let result = run_harness(&config, compiler, &WasmtimeRuntime::new(), &mut reporter);
    let printed = String::from_utf8(reporter.into_inner().into_inner()).expect("utf-8 report");
    Run { result, printed }
}
