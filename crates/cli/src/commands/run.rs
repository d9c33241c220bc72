use clap::Subcommand;
use serde::Serialize;

use caseflow_engine::adapter::{load_flow_run, load_flow_run_cases, load_flow_runs};
use caseflow_engine::authoring::{self, FlowRunDraft};
use caseflow_engine::lifecycle::{self, flow_run_summary};
use caseflow_engine::registry::{self, LinkOutcome};
use caseflow_engine::{Catalog, FlowRun, FlowRunStatus, FlowRunTestCase, RunSummary};
use caseflow_storage::MemoryStore;

use super::{resolve_case, resolve_suite, Session};
use crate::error::CliError;
use crate::output;

#[derive(Subcommand)]
pub(crate) enum RunCommands {
    /// Create a flow run (starts as a draft)
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "label")]
        labels: Vec<String>,
        #[arg(long)]
        assignee: Option<String>,
    },

    /// List flow runs
    List,

    /// Show a flow run with its cases and progress
    Show { run: String },

    /// Move a draft run to in_progress
    Start { run: String },

    /// Move an in-progress run to completed
    Complete { run: String },

    /// Archive a run
    Archive { run: String },

    /// Add a test case to a run
    AddCase { run: String, case: String },

    /// Add every case of a suite to a run
    AddSuite { run: String, suite: String },

    /// Remove a test case from a run
    RemoveCase { run: String, case: String },

    /// List cases that are not yet in the run
    Available { run: String },

    /// Set the notes on a case inside a run
    Notes {
        run: String,
        case: String,
        text: String,
    },

    /// Per-status counts of a run's cases
    Summary { run: String },

    /// Delete a run and its execution records
    Delete { run: String },
}

#[derive(Serialize)]
struct RunView<'a> {
    #[serde(flatten)]
    run: &'a FlowRun,
    cases: &'a [FlowRunTestCase],
    summary: RunSummary,
}

#[derive(Serialize)]
struct BulkAddView {
    linked: Vec<String>,
    already_linked: Vec<String>,
    failed: Vec<BulkFailure>,
}

#[derive(Serialize)]
struct BulkFailure {
    test_case_id: String,
    error: String,
}

pub(crate) async fn run(
    command: RunCommands,
    store: &MemoryStore,
    session: &Session,
) -> Result<bool, CliError> {
    let isolation = session.engine.step_isolation;
    match command {
        RunCommands::Add {
            title,
            description,
            labels,
            assignee,
        } => {
            let run = authoring::create_flow_run(
                store,
                FlowRunDraft {
                    title,
                    description,
                    labels,
                    assignee,
                },
            )
            .await?;
            if session.json() {
                output::print_json(&run)?;
            }
            session.say(format!("created flow run {}", run.id));
            Ok(true)
        }

        RunCommands::List => {
            let runs = load_flow_runs(store).await?;
            if session.json() {
                output::print_json(&runs)?;
            } else if runs.is_empty() {
                println!("no flow runs");
            } else {
                for run in &runs {
                    println!("{}", output::run_line(run));
                }
            }
            Ok(false)
        }

        RunCommands::Show { run } => {
            let flow_run = load_flow_run(store, &run).await?;
            let cases = load_flow_run_cases(store, &run).await?;
            let summary = RunSummary::tally(cases.iter().map(|c| c.status));
            if session.json() {
                output::print_json(&RunView {
                    run: &flow_run,
                    cases: &cases,
                    summary,
                })?;
            } else {
                let catalog = Catalog::load(store).await?;
                let rows: Vec<_> = cases
                    .into_iter()
                    .map(|c| {
                        let case = catalog.case(&c.test_case_id).cloned();
                        (c, case)
                    })
                    .collect();
                output::print_run(&flow_run, &rows, &summary);
            }
            Ok(false)
        }

        RunCommands::Start { run } => transition(store, session, &run, FlowRunStatus::InProgress).await,
        RunCommands::Complete { run } => transition(store, session, &run, FlowRunStatus::Completed).await,
        RunCommands::Archive { run } => transition(store, session, &run, FlowRunStatus::Archived).await,

        RunCommands::AddCase { run, case } => {
            let case_id = resolve_case(store, &case).await?;
            let outcome = registry::add_case_to_flow_run(store, isolation, &run, &case_id).await?;
            if session.json() {
                output::print_json(&outcome)?;
            }
            match outcome {
                LinkOutcome::AlreadyLinked => session.say(format!("{} is already in the run", case)),
                _ => session.say(format!("added {} to the run", case)),
            }
            Ok(outcome == LinkOutcome::Linked)
        }

        RunCommands::AddSuite { run, suite } => {
            let suite_id = resolve_suite(store, &suite).await?;
            let report = registry::add_suite_to_flow_run(store, isolation, &run, &suite_id).await?;
            if session.json() {
                output::print_json(&BulkAddView {
                    linked: report.linked.clone(),
                    already_linked: report.already_linked.clone(),
                    failed: report
                        .failed
                        .iter()
                        .map(|(id, e)| BulkFailure {
                            test_case_id: id.clone(),
                            error: e.to_string(),
                        })
                        .collect(),
                })?;
            }
            session.say(format!(
                "added {} cases ({} already present)",
                report.linked.len(),
                report.already_linked.len()
            ));
            for (case_id, err) in &report.failed {
                eprintln!("warning: {} was not added: {}", case_id, err);
            }
            if report.is_complete() {
                return Ok(!report.linked.is_empty());
            }
            // Whatever landed stays, so save it before failing the command.
            if !report.linked.is_empty() {
                store.save(&session.store_path)?;
            }
            Err(CliError::PartialAdd {
                failed: report.failed.len(),
                total: report.linked.len() + report.already_linked.len() + report.failed.len(),
            })
        }

        RunCommands::RemoveCase { run, case } => {
            let case_id = resolve_case(store, &case).await?;
            let outcome = registry::remove_case_from_flow_run(store, &run, &case_id).await?;
            if session.json() {
                output::print_json(&outcome)?;
            }
            match outcome {
                LinkOutcome::NotLinked => session.say(format!("{} is not in the run", case)),
                _ => session.say(format!("removed {} from the run", case)),
            }
            Ok(outcome == LinkOutcome::Unlinked)
        }

        RunCommands::Available { run } => {
            let catalog = Catalog::load(store).await?;
            let available = registry::available_for_flow_run(store, &run, &catalog.all_cases()).await?;
            if session.json() {
                output::print_json(&available)?;
            } else {
                output::print_cases(&available);
            }
            Ok(false)
        }

        RunCommands::Notes { run, case, text } => {
            let case_id = resolve_case(store, &case).await?;
            let run_case = authoring::set_run_case_notes(store, &run, &case_id, &text).await?;
            if session.json() {
                output::print_json(&run_case)?;
            }
            session.say(format!("notes saved for {}", case));
            Ok(true)
        }

        RunCommands::Summary { run } => {
            let summary = flow_run_summary(store, &run).await?;
            if session.json() {
                output::print_json(&summary)?;
            } else {
                println!("{}", output::summary_line(&summary));
            }
            Ok(false)
        }

        RunCommands::Delete { run } => {
            authoring::delete_flow_run(store, &run).await?;
            session.say(format!("deleted flow run {}", run));
            Ok(true)
        }
    }
}

async fn transition(
    store: &MemoryStore,
    session: &Session,
    run: &str,
    to: FlowRunStatus,
) -> Result<bool, CliError> {
    let flow_run = lifecycle::transition_flow_run(store, run, to).await?;
    if session.json() {
        output::print_json(&flow_run)?;
    }
    session.say(format!("flow run {} is now {}", flow_run.id, flow_run.status));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_engine::authoring::{CaseDraft, StepDraft, SuiteDraft};
    use caseflow_engine::EngineConfig;
    use caseflow_storage::CaseStore;

    use crate::output::OutputFormat;

    #[tokio::test]
    async fn partial_suite_add_saves_what_landed_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session {
            store_path: dir.path().join("caseflow.json"),
            engine: EngineConfig::default(),
            output: OutputFormat::Text,
            quiet: true,
        };
        let store = MemoryStore::new();
        let suite = authoring::create_test_suite(
            &store,
            SuiteDraft {
                name: "smoke".into(),
                ..SuiteDraft::default()
            },
        )
        .await
        .unwrap();
        for title in ["login", "logout"] {
            let case = authoring::create_test_case(
                &store,
                CaseDraft {
                    title: title.into(),
                    steps: vec![StepDraft {
                        description: "open".into(),
                        expected_result: "works".into(),
                    }],
                    ..CaseDraft::default()
                },
            )
            .await
            .unwrap();
            registry::add_case_to_suite(&store, &suite.id, &case.id)
                .await
                .unwrap();
        }
        let flow_run = authoring::create_flow_run(
            &store,
            FlowRunDraft {
                title: "nightly".into(),
                ..FlowRunDraft::default()
            },
        )
        .await
        .unwrap();

        // Lookups and the first case's link and snapshot go through; the
        // second case's step read fails.
        store.fail_after(7, 1);
        let err = run(
            RunCommands::AddSuite {
                run: flow_run.id.clone(),
                suite: suite.display_id.clone(),
            },
            &store,
            &session,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::PartialAdd { failed: 1, total: 2 }));

        let saved = MemoryStore::open(&session.store_path).unwrap();
        let linked = saved.list_flow_run_cases(&flow_run.id).await.unwrap();
        assert_eq!(linked.len(), 1);
    }
}
