pub use crate::diagnostics::{CompileError, FixtureError, HarnessError, InstantiateError};

pub mod cli;
pub mod compile;
pub mod diagnostics;
pub mod diff;
pub mod discovery;
pub mod fixture;
pub mod instantiate;
pub mod runner;
pub mod sink;
