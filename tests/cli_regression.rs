// Regression tests for the harness binary: usage errors, exit codes and a
// full create-then-verify round with a shell script standing in for the
// compiler.

use std::fs;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn harness() -> Command {
    let mut cmd = Command::cargo_bin("fixture-harness").unwrap();
    cmd.env_remove("FIXTURE_HARNESS_BASE_DIR")
        .env_remove("FIXTURE_HARNESS_COMPILER")
        .arg("--color")
        .arg("never");
    cmd
}

#[test]
fn help_describes_usage() {
    harness()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Runs all tests if no tests have been specified."))
        .stdout(contains("--create"));
}

#[test]
fn unknown_test_name_is_reported_as_a_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("add.ts"), "").unwrap();

    harness()
        .arg("--base-dir")
        .arg(dir.path())
        .arg("nope")
        .assert()
        .code(1)
        .stderr(contains("No matching tests").and(contains("nope")));
}

#[test]
fn missing_base_dir_fails() {
    let dir = tempfile::tempdir().unwrap();

    harness()
        .arg("--base-dir")
        .arg(dir.path().join("absent"))
        .assert()
        .code(1)
        .stderr(contains("fixture_harness::"));
}

#[test]
fn missing_compiler_fails_every_fixture() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("add.ts"), "").unwrap();
    fs::write(dir.path().join("add.wast"), "(module)\n").unwrap();

    harness()
        .arg("--base-dir")
        .arg(dir.path())
        .arg("--compiler")
        .arg("fixture-harness-no-such-compiler")
        .assert()
        .code(1)
        .stdout(contains("diff ERROR"))
        .stdout(contains("ERROR: 1 compiler tests failed"));
}

#[cfg(unix)]
#[test]
fn create_then_verify_with_script_compiler() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("add.ts"), "export function add(a: i32, b: i32): i32 { return a + b; }\n").unwrap();
    let script = r#"case " $* " in *" -b "*) printf '\000asm\001\000\000\000';; *) printf '(module)\n';; esac"#;

    let run = |create: bool| {
        let mut cmd = harness();
        cmd.arg("--base-dir")
            .arg(dir.path())
            .arg("--compiler")
            .arg("sh")
            .arg("--compiler-arg")
            .arg("-c")
            .arg("--compiler-arg")
            .arg(script)
            .arg("--compiler-arg")
            .arg("sh");
        if create {
            cmd.arg("--create");
        }
        cmd.assert()
    };

    run(true)
        .success()
        .stdout(contains("Recreated fixture."))
        .stdout(contains("instantiate OK"));
    assert_eq!(
        fs::read_to_string(dir.path().join("add.wast")).unwrap(),
        "(module)\n"
    );

    run(false)
        .success()
        .stdout(contains("Testing compiler/add.ts"))
        .stdout(contains("diff OK"))
        .stdout(contains("[ SUCCESS ]"));
}
