//! Test cases and their golden fixtures on disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::FixtureError;

/// Extension of compiler source fixtures.
pub const SOURCE_EXTENSION: &str = "ts";
/// Extension of golden textual fixtures.
pub const GOLDEN_EXTENSION: &str = "wast";
/// Suffix of the optimized text artifact the compiler writes next to a fixture.
pub const OPTIMIZED_SUFFIX: &str = ".optimized.wast";

/// One source fixture, identified by its path relative to the base directory.
///
/// Paths are always `/`-separated so names are stable across platforms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestCase {
    relative_path: String,
    base_name: String,
}

impl TestCase {
    /// Builds a case from a relative source path such as `std/add.ts`.
    pub fn new(relative_path: impl Into<String>) -> Self {
        let relative_path = normalize_separators(&relative_path.into());
        let base_name = strip_source_extension(&relative_path).to_string();
        Self {
            relative_path,
            base_name,
        }
    }

    /// The source path relative to the base directory, e.g. `std/add.ts`.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// The source path without its extension, e.g. `std/add`.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Golden fixture path relative to the base directory, e.g. `std/add.wast`.
    pub fn golden_name(&self) -> String {
        format!("{}.{}", self.base_name, GOLDEN_EXTENSION)
    }

    /// Optimized artifact path relative to the base directory.
    pub fn optimized_name(&self) -> String {
        format!("{}{}", self.base_name, OPTIMIZED_SUFFIX)
    }

    pub fn golden_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(self.golden_name())
    }

    /// True if a user-supplied test name selects this case.
    pub fn matches_name(&self, name: &str) -> bool {
        self.base_name == normalize_test_name(name)
    }
}

/// Normalizes a test name given on the command line: backslashes become `/`
/// and a trailing source extension is dropped.
pub fn normalize_test_name(name: &str) -> String {
    strip_source_extension(&normalize_separators(name)).to_string()
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

fn strip_source_extension(path: &str) -> &str {
    path.strip_suffix(SOURCE_EXTENSION)
        .and_then(|p| p.strip_suffix('.'))
        .unwrap_or(path)
}

/// Reads and writes golden fixtures under one base directory.
#[derive(Debug, Clone)]
pub struct FixtureStore {
    base_dir: PathBuf,
}

impl FixtureStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Reads the golden text for `case`. A missing file is an error like any
    /// other I/O failure.
    pub fn read_golden(&self, case: &TestCase) -> Result<String, FixtureError> {
        let path = case.golden_path(&self.base_dir);
        fs::read_to_string(&path).map_err(|source| FixtureError::Read { path, source })
    }

    /// Overwrites the golden text for `case`, creating parent directories as
    /// needed, and returns the path written.
    pub fn write_golden(&self, case: &TestCase, text: &str) -> Result<PathBuf, FixtureError> {
        let path = case.golden_path(&self.base_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| FixtureError::Write {
                path: path.clone(),
                source,
            })?;
        }
        fs::write(&path, text).map_err(|source| FixtureError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
