use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::diagnostics::HarnessError;
use crate::fixture::{normalize_test_name, TestCase, SOURCE_EXTENSION};

/// Recursively collects source fixtures under `base_dir`.
///
/// A fixture is any `.ts` file whose name does not start with `_` (those are
/// helpers imported by other fixtures). The list is sorted by relative path so
/// runs are deterministic.
pub fn discover_fixtures(base_dir: &Path) -> Result<Vec<TestCase>, HarnessError> {
    if !base_dir.is_dir() {
        return Err(HarnessError::MissingBaseDir {
            root: base_dir.to_path_buf(),
        });
    }

    let mut cases = Vec::new();
    for entry in WalkDir::new(base_dir) {
        let entry = entry.map_err(|source| HarnessError::Discovery {
            root: base_dir.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() || !is_fixture_source(entry.path()) {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(base_dir) else {
            continue;
        };
        cases.push(TestCase::new(relative.to_string_lossy()));
    }
    cases.sort();

    debug!(count = cases.len(), base_dir = %base_dir.display(), "discovered fixtures");
    Ok(cases)
}

/// Keeps only the cases named in `names`. An empty `names` keeps everything;
/// names that select nothing at all are a usage error.
pub fn select_fixtures(
    cases: Vec<TestCase>,
    names: &[String],
) -> Result<Vec<TestCase>, HarnessError> {
    if names.is_empty() {
        return Ok(cases);
    }

    let selected: Vec<TestCase> = cases
        .into_iter()
        .filter(|case| names.iter().any(|name| case.matches_name(name)))
        .collect();

    if selected.is_empty() {
        return Err(HarnessError::NoMatchingTests {
            names: names.iter().map(|n| normalize_test_name(n)).collect(),
        });
    }
    Ok(selected)
}

fn is_fixture_source(path: &Path) -> bool {
    let is_source = path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION);
    let is_helper = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('_'));
    is_source && !is_helper
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn helper_files_are_not_fixtures() {
        assert!(is_fixture_source(Path::new("dir/add.ts")));
        assert!(!is_fixture_source(Path::new("dir/_common.ts")));
        assert!(!is_fixture_source(Path::new("dir/add.wast")));
    }

    #[test]
    fn empty_filter_keeps_all() {
        let cases = vec![TestCase::new("a.ts"), TestCase::new("b.ts")];
        assert_eq!(select_fixtures(cases.clone(), &[]).unwrap(), cases);
    }

    #[test]
    fn unknown_names_are_a_usage_error() {
        let cases = vec![TestCase::new("a.ts")];
        let err = select_fixtures(cases, &["nope".to_string()]).unwrap_err();
        assert!(matches!(err, HarnessError::NoMatchingTests { .. }));
    }

    #[test]
    fn partial_match_keeps_the_known_names() {
        let cases = vec![TestCase::new("a.ts"), TestCase::new("b.ts")];
        let picked = select_fixtures(cases, &["b".to_string(), "zzz".to_string()]).unwrap();
        assert_eq!(picked, vec![TestCase::new("b.ts")]);
    }

    #[test]
    fn walks_nested_directories_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("std")).unwrap();
        for file in ["b.ts", "a.ts", "_helper.ts", "a.wast", "std/map.ts"] {
            fs::write(dir.path().join(file), "").unwrap();
        }

        let names: Vec<String> = discover_fixtures(dir.path())
            .unwrap()
            .iter()
            .map(|c| c.relative_path().to_string())
            .collect();
        assert_eq!(names, ["a.ts", "b.ts", "std/map.ts"]);
    }

    #[test]
    fn missing_base_dir_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_fixtures(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, HarnessError::MissingBaseDir { .. }));
    }
}
