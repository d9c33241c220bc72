use clap::Subcommand;

use caseflow_engine::adapter::{load_test_case, load_test_cases, load_test_suite, load_test_suites};
use caseflow_engine::authoring::{self, SuiteDraft};
use caseflow_engine::registry::{self, LinkOutcome};
use caseflow_storage::MemoryStore;

use super::{resolve_case, resolve_suite, Session};
use crate::error::CliError;
use crate::output;

#[derive(Subcommand)]
pub(crate) enum SuiteCommands {
    /// Create a test suite
    Add {
        #[arg(long)]
        name: String,
        #[arg(long = "label")]
        labels: Vec<String>,
        #[arg(long)]
        assignee: Option<String>,
    },

    /// List test suites
    List,

    /// Show a suite and its member cases
    Show {
        /// Suite id or display id (TS-n)
        suite: String,
    },

    /// Add a test case to a suite
    AddCase { suite: String, case: String },

    /// Remove a test case from a suite
    RemoveCase { suite: String, case: String },

    /// List cases that are not yet in the suite
    Available { suite: String },

    /// Delete a suite. Its cases are kept
    Delete { suite: String },
}

pub(crate) async fn run(
    command: SuiteCommands,
    store: &MemoryStore,
    session: &Session,
) -> Result<bool, CliError> {
    match command {
        SuiteCommands::Add {
            name,
            labels,
            assignee,
        } => {
            let suite = authoring::create_test_suite(
                store,
                SuiteDraft {
                    name,
                    labels,
                    assignee,
                },
            )
            .await?;
            if session.json() {
                output::print_json(&suite)?;
            }
            session.say(format!("created {} ({})", suite.display_id, suite.id));
            Ok(true)
        }

        SuiteCommands::List => {
            let suites = load_test_suites(store).await?;
            if session.json() {
                output::print_json(&suites)?;
            } else if suites.is_empty() {
                println!("no test suites");
            } else {
                for suite in &suites {
                    println!("{}", output::suite_line(suite));
                }
            }
            Ok(false)
        }

        SuiteCommands::Show { suite } => {
            let id = resolve_suite(store, &suite).await?;
            let suite = load_test_suite(store, &id).await?;
            if session.json() {
                output::print_json(&suite)?;
            } else {
                let mut members = Vec::with_capacity(suite.test_cases.len());
                for case_id in &suite.test_cases {
                    members.push(load_test_case(store, case_id).await?);
                }
                output::print_suite(&suite, &members);
            }
            Ok(false)
        }

        SuiteCommands::AddCase { suite, case } => {
            let suite_id = resolve_suite(store, &suite).await?;
            let case_id = resolve_case(store, &case).await?;
            let outcome = registry::add_case_to_suite(store, &suite_id, &case_id).await?;
            if session.json() {
                output::print_json(&outcome)?;
            }
            match outcome {
                LinkOutcome::AlreadyLinked => session.say(format!("{} is already in {}", case, suite)),
                _ => session.say(format!("added {} to {}", case, suite)),
            }
            Ok(outcome == LinkOutcome::Linked)
        }

        SuiteCommands::RemoveCase { suite, case } => {
            let suite_id = resolve_suite(store, &suite).await?;
            let case_id = resolve_case(store, &case).await?;
            let outcome = registry::remove_case_from_suite(store, &suite_id, &case_id).await?;
            if session.json() {
                output::print_json(&outcome)?;
            }
            match outcome {
                LinkOutcome::NotLinked => session.say(format!("{} is not in {}", case, suite)),
                _ => session.say(format!("removed {} from {}", case, suite)),
            }
            Ok(outcome == LinkOutcome::Unlinked)
        }

        SuiteCommands::Available { suite } => {
            let suite_id = resolve_suite(store, &suite).await?;
            let all = load_test_cases(store).await?;
            let available = registry::available_for_suite(store, &suite_id, &all).await?;
            if session.json() {
                output::print_json(&available)?;
            } else {
                output::print_cases(&available);
            }
            Ok(false)
        }

        SuiteCommands::Delete { suite } => {
            let id = resolve_suite(store, &suite).await?;
            authoring::delete_test_suite(store, &id).await?;
            session.say(format!("deleted {}", suite));
            Ok(true)
        }
    }
}
