//! Creating, editing and deleting the things the engine executes.

use tracing::{info, warn};

use caseflow_storage::{
    CaseStore, FlowRunCasePatch, NewFlowRun, NewTestCase, NewTestStep, NewTestSuite, TestCasePatch,
};

use crate::adapter::{load_flow_run_case, load_test_case, load_test_suite};
use crate::error::EngineError;
use crate::rollup::rollup_statuses;
use crate::types::{
    FlowRun, FlowRunStatus, FlowRunTestCase, Priority, StepStatus, TestCase, TestSuite,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepDraft {
    pub description: String,
    pub expected_result: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    pub steps: Vec<StepDraft>,
}

/// Changes to an existing case. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub labels: Option<Vec<String>>,
    pub assignee: Option<Option<String>>,
    /// Replaces the whole step list. Replaced steps start over as pending.
    pub steps: Option<Vec<StepDraft>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteDraft {
    pub name: String,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowRunDraft {
    pub title: String,
    pub description: String,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
}

fn new_steps(drafts: Vec<StepDraft>) -> Vec<NewTestStep> {
    drafts
        .into_iter()
        .map(|d| NewTestStep {
            description: d.description,
            expected_result: d.expected_result,
        })
        .collect()
}

fn require_title(kind: &str, title: &str) -> Result<(), EngineError> {
    if title.trim().is_empty() {
        return Err(EngineError::invalid(
            format!("{kind} title is empty"),
            format!("save {kind}"),
        ));
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Test cases
// ──────────────────────────────────────────────

/// Create a test case with its steps. The case starts at the rollup of its
/// fresh steps.
pub async fn create_test_case<S: CaseStore>(store: &S, draft: CaseDraft) -> Result<TestCase, EngineError> {
    require_title("test case", &draft.title)?;
    let status = rollup_statuses(draft.steps.iter().map(|_| StepStatus::Pending));
    let record = store
        .create_test_case(NewTestCase {
            title: draft.title,
            description: draft.description,
            priority: draft.priority,
            status,
            labels: draft.labels,
            assignee: draft.assignee,
        })
        .await?;

    if !draft.steps.is_empty() {
        if let Err(e) = store.create_test_steps(&record.id, new_steps(draft.steps)).await {
            let _ = store.delete_test_case(&record.id).await;
            warn!(test_case_id = %record.id, error = %e, "step creation failed; case removed");
            return Err(e.into());
        }
    }

    info!(test_case_id = %record.id, display_id = %record.display_id, "test case created");
    load_test_case(store, &record.id).await
}

pub async fn edit_test_case<S: CaseStore>(
    store: &S,
    id: &str,
    edit: CaseEdit,
) -> Result<TestCase, EngineError> {
    if let Some(title) = &edit.title {
        require_title("test case", title)?;
    }
    // Steps and the status derived from them land in one write.
    if let Some(drafts) = edit.steps {
        let status = rollup_statuses(drafts.iter().map(|_| StepStatus::Pending));
        store.replace_test_steps(id, new_steps(drafts), status).await?;
    }

    let patch = TestCasePatch {
        title: edit.title,
        description: edit.description,
        priority: edit.priority,
        status: None,
        labels: edit.labels,
        assignee: edit.assignee,
    };
    store.update_test_case(id, patch).await?;
    info!(test_case_id = id, "test case edited");
    load_test_case(store, id).await
}

/// Delete a case along with its steps and every association to it.
pub async fn delete_test_case<S: CaseStore>(store: &S, id: &str) -> Result<(), EngineError> {
    store.delete_test_case(id).await?;
    info!(test_case_id = id, "test case deleted");
    Ok(())
}

// ──────────────────────────────────────────────
// Suites and runs
// ──────────────────────────────────────────────

pub async fn create_test_suite<S: CaseStore>(store: &S, draft: SuiteDraft) -> Result<TestSuite, EngineError> {
    require_title("test suite", &draft.name)?;
    let record = store
        .create_test_suite(NewTestSuite {
            name: draft.name,
            labels: draft.labels,
            assignee: draft.assignee,
        })
        .await?;
    info!(suite_id = %record.id, display_id = %record.display_id, "test suite created");
    load_test_suite(store, &record.id).await
}

pub async fn delete_test_suite<S: CaseStore>(store: &S, id: &str) -> Result<(), EngineError> {
    store.delete_test_suite(id).await?;
    info!(suite_id = id, "test suite deleted");
    Ok(())
}

/// Create a flow run. New runs are always drafts with no dates.
pub async fn create_flow_run<S: CaseStore>(store: &S, draft: FlowRunDraft) -> Result<FlowRun, EngineError> {
    require_title("flow run", &draft.title)?;
    let record = store
        .create_flow_run(NewFlowRun {
            title: draft.title,
            description: draft.description,
            status: FlowRunStatus::Draft,
            start_date: None,
            end_date: None,
            labels: draft.labels,
            assignee: draft.assignee,
        })
        .await?;
    info!(flow_run_id = %record.id, "flow run created");
    Ok(record.into())
}

pub async fn delete_flow_run<S: CaseStore>(store: &S, id: &str) -> Result<(), EngineError> {
    store.delete_flow_run(id).await?;
    info!(flow_run_id = id, "flow run deleted");
    Ok(())
}

/// Replace the operator notes on a case's execution record in a run.
pub async fn set_run_case_notes<S: CaseStore>(
    store: &S,
    flow_run_id: &str,
    test_case_id: &str,
    notes: &str,
) -> Result<FlowRunTestCase, EngineError> {
    let record = store.get_flow_run_case(flow_run_id, test_case_id).await?;
    store
        .update_flow_run_case(
            &record.id,
            FlowRunCasePatch {
                status: None,
                notes: Some(notes.to_string()),
            },
        )
        .await?;
    info!(flow_run_id, test_case_id, "run case notes updated");
    load_flow_run_case(store, flow_run_id, test_case_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_storage::MemoryStore;

    use crate::types::CaseStatus;

    fn step(d: &str) -> StepDraft {
        StepDraft {
            description: d.into(),
            expected_result: format!("{d} works"),
        }
    }

    fn draft(title: &str, steps: Vec<StepDraft>) -> CaseDraft {
        CaseDraft {
            title: title.into(),
            steps,
            ..CaseDraft::default()
        }
    }

    #[tokio::test]
    async fn created_case_has_ordered_pending_steps() {
        let store = MemoryStore::new();
        let case = create_test_case(&store, draft("checkout", vec![step("add item"), step("pay")]))
            .await
            .unwrap();
        assert_eq!(case.display_id, "TC-1");
        assert_eq!(case.status, CaseStatus::NoRun);
        assert_eq!(case.steps.len(), 2);
        assert_eq!(case.steps[0].description, "add item");
        assert!(case.steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[tokio::test]
    async fn blank_title_is_rejected_before_any_write() {
        let store = MemoryStore::new();
        let err = create_test_case(&store, draft("   ", vec![])).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_step_write_removes_the_new_case() {
        let store = MemoryStore::new();
        store.fail_after(1, 1);
        let err = create_test_case(&store, draft("flaky", vec![step("a")]))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(store.list_test_cases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn editing_steps_replaces_them_and_rederives_status() {
        let store = MemoryStore::new();
        let case = create_test_case(&store, draft("login", vec![step("a")]))
            .await
            .unwrap();
        store
            .update_test_case(
                &case.id,
                TestCasePatch {
                    status: Some(CaseStatus::Passed),
                    ..TestCasePatch::default()
                },
            )
            .await
            .unwrap();

        let edited = edit_test_case(
            &store,
            &case.id,
            CaseEdit {
                title: Some("login v2".into()),
                steps: Some(vec![step("x"), step("y"), step("z")]),
                ..CaseEdit::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(edited.title, "login v2");
        assert_eq!(edited.steps.len(), 3);
        assert_eq!(edited.steps[2].description, "z");
        assert_eq!(edited.status, CaseStatus::NoRun);
    }

    #[tokio::test]
    async fn failed_step_replacement_keeps_old_steps_and_status() {
        use crate::sequencer::Sequencer;

        let store = MemoryStore::new();
        let case = create_test_case(&store, draft("export", vec![step("a"), step("b")]))
            .await
            .unwrap();
        let mut seq = Sequencer::for_case(&store, &case.id).await.unwrap();
        seq.quick_complete(&store, StepStatus::Failed).await.unwrap();

        store.fail_next(1);
        let err = edit_test_case(
            &store,
            &case.id,
            CaseEdit {
                steps: Some(vec![step("c")]),
                ..CaseEdit::default()
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_retryable());

        let stored = store.list_test_steps(&case.id).await.unwrap();
        let status = store.get_test_case(&case.id).await.unwrap().status;
        assert_eq!(stored.len(), 2);
        assert_eq!(status, CaseStatus::Failed);
        assert_eq!(status, rollup_statuses(stored.iter().map(|s| s.status)));

        let edited = edit_test_case(
            &store,
            &case.id,
            CaseEdit {
                steps: Some(vec![step("c")]),
                ..CaseEdit::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(edited.steps.len(), 1);
        assert_eq!(edited.status, CaseStatus::NoRun);
    }

    #[tokio::test]
    async fn editing_fields_only_keeps_steps_and_status() {
        let store = MemoryStore::new();
        let case = create_test_case(&store, draft("search", vec![step("type")]))
            .await
            .unwrap();
        let edited = edit_test_case(
            &store,
            &case.id,
            CaseEdit {
                priority: Some(Priority::High),
                assignee: Some(Some("sam".into())),
                ..CaseEdit::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(edited.priority, Priority::High);
        assert_eq!(edited.assignee.as_deref(), Some("sam"));
        assert_eq!(edited.steps[0].id, case.steps[0].id);
    }

    #[tokio::test]
    async fn new_flow_run_is_an_undated_draft() {
        let store = MemoryStore::new();
        let run = create_flow_run(
            &store,
            FlowRunDraft {
                title: "sprint 12".into(),
                ..FlowRunDraft::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(run.status, FlowRunStatus::Draft);
        assert!(run.start_date.is_none());
        assert!(run.end_date.is_none());
    }

    #[tokio::test]
    async fn notes_on_unlinked_case_are_not_found() {
        let store = MemoryStore::new();
        let err = set_run_case_notes(&store, "r", "c", "hi").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
