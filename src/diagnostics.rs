//! Error types for the fixture harness.
//!
//! Only [`HarnessError`] is fatal to a run. The stage errors
//! ([`CompileError`], [`FixtureError`], [`InstantiateError`]) are contained to
//! the fixture that raised them and end up as that fixture's failure.

use std::path::PathBuf;
use std::process::ExitStatus;

use miette::Diagnostic;
use thiserror::Error;

/// Errors that stop the whole run before (or instead of) running fixtures.
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("No matching tests: {}", names.join(" "))]
    #[diagnostic(
        code(fixture_harness::usage::no_matching_tests),
        help("test names are fixture paths relative to the base directory, without the .ts extension")
    )]
    NoMatchingTests { names: Vec<String> },

    #[error("failed to discover fixtures under '{}'", root.display())]
    #[diagnostic(code(fixture_harness::discovery))]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("fixture directory '{}' does not exist", root.display())]
    #[diagnostic(
        code(fixture_harness::discovery::missing_root),
        help("pass --base-dir or set FIXTURE_HARNESS_BASE_DIR")
    )]
    MissingBaseDir { root: PathBuf },

    #[error("failed to write report")]
    #[diagnostic(code(fixture_harness::report))]
    Report(#[from] std::io::Error),
}

/// Error handed to a compile step's completion.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to start compiler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("compiler exited with {status}")]
    Exit { status: ExitStatus },

    #[error("{0}")]
    Failed(String),
}

/// Golden fixture I/O failures.
#[derive(Debug, Error, Diagnostic)]
pub enum FixtureError {
    #[error("failed to read fixture '{}': {source}", path.display())]
    #[diagnostic(
        code(fixture_harness::fixture::read),
        help("run with --create to record a missing fixture")
    )]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write fixture '{}': {source}", path.display())]
    #[diagnostic(code(fixture_harness::fixture::write))]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a binary module could not be instantiated.
#[derive(Debug, Error)]
pub enum InstantiateError {
    #[error("invalid module: {0:#}")]
    Parse(wasmtime::Error),

    #[error("unresolved import {module}.{name} ({kind})")]
    UnresolvedImport {
        module: String,
        name: String,
        kind: &'static str,
    },

    /// The host has a member by that name, but its value cannot take the
    /// declared import type.
    #[error("incompatible import {module}.{name}: host constant cannot satisfy {expected}")]
    IncompatibleImport {
        module: String,
        name: String,
        expected: String,
    },

    #[error("{0:#}")]
    Instantiate(wasmtime::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_error_lists_requested_names() {
        let err = HarnessError::NoMatchingTests {
            names: vec!["add".into(), "std/array".into()],
        };
        assert_eq!(err.to_string(), "No matching tests: add std/array");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("fixture_harness::usage::no_matching_tests"));
    }

    #[test]
    fn unresolved_import_names_the_import() {
        let err = InstantiateError::UnresolvedImport {
            module: "env".into(),
            name: "memory".into(),
            kind: "memory",
        };
        assert_eq!(err.to_string(), "unresolved import env.memory (memory)");
    }
}
