//! Subcommand implementations.
//!
//! Each `run` function performs one operation against the loaded store and
//! reports whether it changed anything, so the caller knows to save.

pub(crate) mod case;
pub(crate) mod exec;
pub(crate) mod run;
pub(crate) mod suite;

use std::path::PathBuf;

use caseflow_engine::authoring::StepDraft;
use caseflow_engine::{EngineConfig, EngineError};
use caseflow_storage::{CaseStore, MemoryStore};

use crate::error::CliError;
use crate::output::OutputFormat;

/// Per-invocation settings shared by every subcommand.
pub(crate) struct Session {
    pub store_path: PathBuf,
    pub engine: EngineConfig,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Session {
    /// Print a confirmation line in text mode.
    pub fn say(&self, msg: impl AsRef<str>) {
        if self.output == OutputFormat::Text && !self.quiet {
            println!("{}", msg.as_ref());
        }
    }

    pub fn json(&self) -> bool {
        self.output == OutputFormat::Json
    }
}

/// Accept either a record id or a display id such as `TC-4`.
pub(crate) async fn resolve_case(store: &MemoryStore, key: &str) -> Result<String, CliError> {
    let cases = store.list_test_cases().await?;
    cases
        .into_iter()
        .find(|c| c.id == key || c.display_id.eq_ignore_ascii_case(key))
        .map(|c| c.id)
        .ok_or_else(|| not_found("test case", key))
}

/// Accept either a record id or a display id such as `TS-2`.
pub(crate) async fn resolve_suite(store: &MemoryStore, key: &str) -> Result<String, CliError> {
    let suites = store.list_test_suites().await?;
    suites
        .into_iter()
        .find(|s| s.id == key || s.display_id.eq_ignore_ascii_case(key))
        .map(|s| s.id)
        .ok_or_else(|| not_found("test suite", key))
}

fn not_found(entity: &'static str, key: &str) -> CliError {
    CliError::Engine(EngineError::NotFound {
        entity,
        id: key.to_string(),
    })
}

/// Parse `DESCRIPTION=>EXPECTED`. The expected result is optional.
pub(crate) fn parse_step(text: &str) -> StepDraft {
    match text.split_once("=>") {
        Some((description, expected)) => StepDraft {
            description: description.trim().to_string(),
            expected_result: expected.trim().to_string(),
        },
        None => StepDraft {
            description: text.trim().to_string(),
            expected_result: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_with_expected_result() {
        let step = parse_step("open /login => form is visible");
        assert_eq!(step.description, "open /login");
        assert_eq!(step.expected_result, "form is visible");
    }

    #[test]
    fn step_without_expected_result() {
        let step = parse_step("  wait ");
        assert_eq!(step.description, "wait");
        assert_eq!(step.expected_result, "");
    }
}
