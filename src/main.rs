use std::process::ExitCode;

fn main() -> ExitCode {
    fixture_harness::cli::run()
}
