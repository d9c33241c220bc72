use std::future::Future;

use super::{make_case, make_flow_run, make_steps, TestResult};
use crate::record::{
    CaseStatus, FlowRunCasePatch, FlowRunPatch, FlowRunStatus, NewFlowRunCase, NewRunStep,
    RunStepPatch, StepIsolation, StepStatus,
};
use crate::{CaseStore, StoreError};

pub(super) async fn run_run_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "runs",
        "create_flow_run_round_trips_fields",
        create_flow_run_round_trips_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "runs",
        "update_flow_run_sets_status_and_dates",
        update_flow_run_sets_status_and_dates(factory).await,
    ));
    results.push(TestResult::from_result(
        "runs",
        "flow_run_case_readable_by_pair",
        flow_run_case_readable_by_pair(factory).await,
    ));
    results.push(TestResult::from_result(
        "runs",
        "update_flow_run_case_status_and_notes",
        update_flow_run_case_status_and_notes(factory).await,
    ));
    results.push(TestResult::from_result(
        "runs",
        "run_steps_independent_of_canonical_steps",
        run_steps_independent_of_canonical_steps(factory).await,
    ));
    results.push(TestResult::from_result(
        "runs",
        "delete_flow_run_case_cascades_run_steps",
        delete_flow_run_case_cascades_run_steps(factory).await,
    ));
    results.push(TestResult::from_result(
        "runs",
        "delete_flow_run_cascades_cases",
        delete_flow_run_cascades_cases(factory).await,
    ));

    results
}

/// Set up one case with `n` steps linked into a fresh flow run.
async fn linked_case<S: CaseStore>(
    s: &S,
    n: usize,
) -> Result<(String, String, String), String> {
    let case = s
        .create_test_case(make_case("Login"))
        .await
        .map_err(|e| e.to_string())?;
    s.create_test_steps(&case.id, make_steps(n))
        .await
        .map_err(|e| e.to_string())?;
    let run = s
        .create_flow_run(make_flow_run("Sprint 1"))
        .await
        .map_err(|e| e.to_string())?;
    let link = s
        .insert_flow_run_case(NewFlowRunCase {
            flow_run_id: run.id.clone(),
            test_case_id: case.id.clone(),
            isolation: StepIsolation::CopyOnAdd,
            status: CaseStatus::NoRun,
        })
        .await
        .map_err(|e| e.to_string())?;
    Ok((case.id, run.id, link.id))
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn create_flow_run_round_trips_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create_flow_run(make_flow_run("Sprint 1"))
        .await
        .map_err(|e| e.to_string())?;
    let read = s
        .get_flow_run(&created.id)
        .await
        .map_err(|e| e.to_string())?;
    if read != created {
        return Err(format!("read back {:?}, created {:?}", read, created));
    }
    if read.status != FlowRunStatus::Draft || read.start_date.is_some() || read.end_date.is_some()
    {
        return Err(format!("expected fresh draft, got {:?}", read));
    }
    Ok(())
}

async fn update_flow_run_sets_status_and_dates<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let run = s
        .create_flow_run(make_flow_run("Sprint 1"))
        .await
        .map_err(|e| e.to_string())?;
    s.update_flow_run(
        &run.id,
        FlowRunPatch {
            status: Some(FlowRunStatus::InProgress),
            start_date: Some(Some("2025-01-01T00:00:00Z".to_string())),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let read = s.get_flow_run(&run.id).await.map_err(|e| e.to_string())?;
    if read.status != FlowRunStatus::InProgress {
        return Err(format!("expected in_progress, got {}", read.status));
    }
    if read.start_date.as_deref() != Some("2025-01-01T00:00:00Z") || read.end_date.is_some() {
        return Err(format!(
            "unexpected dates: {:?} / {:?}",
            read.start_date, read.end_date
        ));
    }
    if read.title != run.title {
        return Err("title changed by a status patch".to_string());
    }
    Ok(())
}

async fn flow_run_case_readable_by_pair<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (case_id, run_id, link_id) = linked_case(&s, 1).await?;
    let read = s
        .get_flow_run_case(&run_id, &case_id)
        .await
        .map_err(|e| e.to_string())?;
    if read.id != link_id || read.status != CaseStatus::NoRun || !read.notes.is_empty() {
        return Err(format!("unexpected flow run case: {:?}", read));
    }
    Ok(())
}

async fn update_flow_run_case_status_and_notes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (case_id, run_id, link_id) = linked_case(&s, 1).await?;
    s.update_flow_run_case(
        &link_id,
        FlowRunCasePatch {
            status: Some(CaseStatus::Failed),
            notes: Some("flaky on staging".to_string()),
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let read = s
        .get_flow_run_case(&run_id, &case_id)
        .await
        .map_err(|e| e.to_string())?;
    if read.status != CaseStatus::Failed || read.notes != "flaky on staging" {
        return Err(format!("update not applied: {:?}", read));
    }
    // The case's own status is a separate field.
    let case = s.get_test_case(&case_id).await.map_err(|e| e.to_string())?;
    if case.status != CaseStatus::NoRun {
        return Err(format!(
            "run status leaked into case status: {}",
            case.status
        ));
    }
    Ok(())
}

async fn run_steps_independent_of_canonical_steps<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (case_id, _run_id, link_id) = linked_case(&s, 2).await?;
    let canonical = s
        .list_test_steps(&case_id)
        .await
        .map_err(|e| e.to_string())?;
    let copies: Vec<NewRunStep> = canonical
        .iter()
        .map(|step| NewRunStep {
            source_step_id: step.id.clone(),
            description: step.description.clone(),
            expected_result: step.expected_result.clone(),
            actual_result: String::new(),
            status: StepStatus::Pending,
        })
        .collect();
    let created = s
        .create_run_steps(&link_id, copies)
        .await
        .map_err(|e| e.to_string())?;
    s.update_run_step(
        &created[0].id,
        RunStepPatch {
            status: Some(StepStatus::Passed),
            actual_result: Some("ok".to_string()),
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let run_steps = s
        .list_run_steps(&link_id)
        .await
        .map_err(|e| e.to_string())?;
    if run_steps.len() != 2 || run_steps[0].status != StepStatus::Passed {
        return Err(format!("run step update not applied: {:?}", run_steps));
    }
    if run_steps[0].source_step_id != canonical[0].id || run_steps[1].position != 1 {
        return Err("run steps lost their source or order".to_string());
    }
    let canonical_after = s
        .list_test_steps(&case_id)
        .await
        .map_err(|e| e.to_string())?;
    if canonical_after[0].status != StepStatus::Pending {
        return Err("run step update leaked into canonical step".to_string());
    }
    Ok(())
}

async fn delete_flow_run_case_cascades_run_steps<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (_case_id, run_id, link_id) = linked_case(&s, 0).await?;
    s.create_run_steps(
        &link_id,
        vec![NewRunStep {
            source_step_id: "src".to_string(),
            ..Default::default()
        }],
    )
    .await
    .map_err(|e| e.to_string())?;
    s.delete_flow_run_case(&link_id)
        .await
        .map_err(|e| e.to_string())?;

    let rows = s
        .list_flow_run_cases(&run_id)
        .await
        .map_err(|e| e.to_string())?;
    let steps = s
        .list_run_steps(&link_id)
        .await
        .map_err(|e| e.to_string())?;
    if !rows.is_empty() || !steps.is_empty() {
        return Err(format!(
            "expected nothing left, got {} rows and {} steps",
            rows.len(),
            steps.len()
        ));
    }
    Ok(())
}

async fn delete_flow_run_cascades_cases<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (case_id, run_id, _link_id) = linked_case(&s, 1).await?;
    s.delete_flow_run(&run_id)
        .await
        .map_err(|e| e.to_string())?;

    match s.get_flow_run_case(&run_id, &case_id).await {
        Err(StoreError::NotFound { .. }) => {}
        other => return Err(format!("expected NotFound, got {:?}", other)),
    }
    s.get_test_case(&case_id)
        .await
        .map_err(|e| format!("case must survive flow run delete: {e}"))?;
    Ok(())
}
