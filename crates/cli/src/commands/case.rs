use clap::Subcommand;

use caseflow_engine::adapter::{load_test_case, load_test_cases};
use caseflow_engine::authoring::{self, CaseDraft, CaseEdit};
use caseflow_engine::Priority;
use caseflow_storage::MemoryStore;

use super::{parse_step, resolve_case, Session};
use crate::error::CliError;
use crate::output;

#[derive(Subcommand)]
pub(crate) enum CaseCommands {
    /// Create a test case
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// high, medium or low
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Repeat for several labels
        #[arg(long = "label")]
        labels: Vec<String>,
        #[arg(long)]
        assignee: Option<String>,
        /// A step as "DESCRIPTION => EXPECTED"; repeat in order
        #[arg(long = "step")]
        steps: Vec<String>,
    },

    /// List test cases, newest first
    List,

    /// Show a test case and its steps
    Show {
        /// Case id or display id (TC-n)
        case: String,
    },

    /// Change a test case. Giving any --step replaces the whole step list
    Edit {
        case: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        /// Replaces all labels
        #[arg(long = "label")]
        labels: Vec<String>,
        #[arg(long, conflicts_with = "unassign")]
        assignee: Option<String>,
        #[arg(long)]
        unassign: bool,
        #[arg(long = "step")]
        steps: Vec<String>,
    },

    /// Delete a test case and its associations
    Delete { case: String },
}

pub(crate) async fn run(
    command: CaseCommands,
    store: &MemoryStore,
    session: &Session,
) -> Result<bool, CliError> {
    match command {
        CaseCommands::Add {
            title,
            description,
            priority,
            labels,
            assignee,
            steps,
        } => {
            let case = authoring::create_test_case(
                store,
                CaseDraft {
                    title,
                    description,
                    priority,
                    labels,
                    assignee,
                    steps: steps.iter().map(|s| parse_step(s)).collect(),
                },
            )
            .await?;
            if session.json() {
                output::print_json(&case)?;
            }
            session.say(format!("created {} ({})", case.display_id, case.id));
            Ok(true)
        }

        CaseCommands::List => {
            let cases = load_test_cases(store).await?;
            if session.json() {
                output::print_json(&cases)?;
            } else {
                output::print_cases(&cases);
            }
            Ok(false)
        }

        CaseCommands::Show { case } => {
            let id = resolve_case(store, &case).await?;
            let case = load_test_case(store, &id).await?;
            if session.json() {
                output::print_json(&case)?;
            } else {
                output::print_case(&case);
            }
            Ok(false)
        }

        CaseCommands::Edit {
            case,
            title,
            description,
            priority,
            labels,
            assignee,
            unassign,
            steps,
        } => {
            let id = resolve_case(store, &case).await?;
            let edit = CaseEdit {
                title,
                description,
                priority,
                labels: (!labels.is_empty()).then_some(labels),
                assignee: if unassign { Some(None) } else { assignee.map(Some) },
                steps: (!steps.is_empty()).then(|| steps.iter().map(|s| parse_step(s)).collect()),
            };
            let case = authoring::edit_test_case(store, &id, edit).await?;
            if session.json() {
                output::print_json(&case)?;
            }
            session.say(format!("updated {}", case.display_id));
            Ok(true)
        }

        CaseCommands::Delete { case } => {
            let id = resolve_case(store, &case).await?;
            authoring::delete_test_case(store, &id).await?;
            session.say(format!("deleted {}", case));
            Ok(true)
        }
    }
}
