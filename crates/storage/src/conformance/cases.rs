use std::future::Future;

use super::{make_case, make_flow_run, make_steps, make_suite, TestResult};
use crate::record::{
    CaseStatus, NewFlowRunCase, Priority, StepIsolation, StepStatus, TestCasePatch, TestStepPatch,
};
use crate::{CaseStore, StoreError};

pub(super) async fn run_case_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "cases",
        "create_case_round_trips_fields",
        create_case_round_trips_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "cases",
        "update_case_applies_only_given_fields",
        update_case_applies_only_given_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "cases",
        "update_case_can_clear_assignee",
        update_case_can_clear_assignee(factory).await,
    ));
    results.push(TestResult::from_result(
        "cases",
        "list_cases_newest_first",
        list_cases_newest_first(factory).await,
    ));
    results.push(TestResult::from_result(
        "cases",
        "new_steps_are_pending_and_ordered",
        new_steps_are_pending_and_ordered(factory).await,
    ));
    results.push(TestResult::from_result(
        "cases",
        "steps_append_after_existing",
        steps_append_after_existing(factory).await,
    ));
    results.push(TestResult::from_result(
        "cases",
        "update_step_changes_status_and_result",
        update_step_changes_status_and_result(factory).await,
    ));
    results.push(TestResult::from_result(
        "cases",
        "delete_step_removes_only_that_step",
        delete_step_removes_only_that_step(factory).await,
    ));
    results.push(TestResult::from_result(
        "cases",
        "delete_case_cascades",
        delete_case_cascades(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A created case reads back with the fields it was created with.
async fn create_case_round_trips_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut new_case = make_case("Login");
    new_case.priority = Priority::High;
    new_case.assignee = Some("user-1".to_string());
    let created = s
        .create_test_case(new_case)
        .await
        .map_err(|e| e.to_string())?;
    if created.id.is_empty() || created.display_id.is_empty() {
        return Err("expected non-empty id and display_id".to_string());
    }

    let read = s
        .get_test_case(&created.id)
        .await
        .map_err(|e| e.to_string())?;
    if read != created {
        return Err(format!("read back {:?}, created {:?}", read, created));
    }
    if read.priority != Priority::High || read.status != CaseStatus::NoRun {
        return Err(format!(
            "expected high/no_run, got {}/{}",
            read.priority, read.status
        ));
    }
    Ok(())
}

/// A patch with only `title` set must leave every other field untouched.
async fn update_case_applies_only_given_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create_test_case(make_case("Login"))
        .await
        .map_err(|e| e.to_string())?;
    s.update_test_case(
        &created.id,
        TestCasePatch {
            title: Some("Login v2".to_string()),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let read = s
        .get_test_case(&created.id)
        .await
        .map_err(|e| e.to_string())?;
    if read.title != "Login v2" {
        return Err(format!("expected title \"Login v2\", got \"{}\"", read.title));
    }
    if read.description != created.description || read.labels != created.labels {
        return Err("untouched fields changed".to_string());
    }
    Ok(())
}

/// `assignee: Some(None)` clears the assignee.
async fn update_case_can_clear_assignee<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut new_case = make_case("Checkout");
    new_case.assignee = Some("user-9".to_string());
    let created = s
        .create_test_case(new_case)
        .await
        .map_err(|e| e.to_string())?;
    s.update_test_case(
        &created.id,
        TestCasePatch {
            assignee: Some(None),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let read = s
        .get_test_case(&created.id)
        .await
        .map_err(|e| e.to_string())?;
    if read.assignee.is_some() {
        return Err(format!("expected no assignee, got {:?}", read.assignee));
    }
    Ok(())
}

async fn list_cases_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = s
        .create_test_case(make_case("first"))
        .await
        .map_err(|e| e.to_string())?;
    let second = s
        .create_test_case(make_case("second"))
        .await
        .map_err(|e| e.to_string())?;

    let listed = s.list_test_cases().await.map_err(|e| e.to_string())?;
    let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
    if ids != [second.id.as_str(), first.id.as_str()] {
        return Err(format!("expected newest first, got {:?}", ids));
    }
    Ok(())
}

async fn new_steps_are_pending_and_ordered<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let case = s
        .create_test_case(make_case("Search"))
        .await
        .map_err(|e| e.to_string())?;
    s.create_test_steps(&case.id, make_steps(3))
        .await
        .map_err(|e| e.to_string())?;

    let steps = s
        .list_test_steps(&case.id)
        .await
        .map_err(|e| e.to_string())?;
    if steps.len() != 3 {
        return Err(format!("expected 3 steps, got {}", steps.len()));
    }
    for (i, step) in steps.iter().enumerate() {
        if step.position != i as u32 || step.description != format!("step {i}") {
            return Err(format!("step {i} out of order: {:?}", step));
        }
        if step.status != StepStatus::Pending || !step.actual_result.is_empty() {
            return Err(format!("step {i} not fresh: {:?}", step));
        }
    }
    Ok(())
}

async fn steps_append_after_existing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let case = s
        .create_test_case(make_case("Search"))
        .await
        .map_err(|e| e.to_string())?;
    s.create_test_steps(&case.id, make_steps(2))
        .await
        .map_err(|e| e.to_string())?;
    let appended = s
        .create_test_steps(&case.id, make_steps(1))
        .await
        .map_err(|e| e.to_string())?;

    if appended.len() != 1 || appended[0].position != 2 {
        return Err(format!("expected appended step at position 2, got {:?}", appended));
    }
    Ok(())
}

async fn update_step_changes_status_and_result<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let case = s
        .create_test_case(make_case("Search"))
        .await
        .map_err(|e| e.to_string())?;
    let steps = s
        .create_test_steps(&case.id, make_steps(1))
        .await
        .map_err(|e| e.to_string())?;
    s.update_test_step(
        &steps[0].id,
        TestStepPatch {
            actual_result: Some("saw results".to_string()),
            status: Some(StepStatus::Failed),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let read = s
        .list_test_steps(&case.id)
        .await
        .map_err(|e| e.to_string())?;
    let step = &read[0];
    if step.status != StepStatus::Failed || step.actual_result != "saw results" {
        return Err(format!("update not applied: {:?}", step));
    }
    if step.description != "step 0" {
        return Err("description changed by a status patch".to_string());
    }
    Ok(())
}

async fn delete_step_removes_only_that_step<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let case = s
        .create_test_case(make_case("Search"))
        .await
        .map_err(|e| e.to_string())?;
    let steps = s
        .create_test_steps(&case.id, make_steps(2))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_test_step(&steps[0].id)
        .await
        .map_err(|e| e.to_string())?;

    let left = s
        .list_test_steps(&case.id)
        .await
        .map_err(|e| e.to_string())?;
    if left.len() != 1 || left[0].id != steps[1].id {
        return Err(format!("expected only second step left, got {:?}", left));
    }
    Ok(())
}

/// Deleting a case removes its steps, suite links and flow-run cases.
async fn delete_case_cascades<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let case = s
        .create_test_case(make_case("Doomed"))
        .await
        .map_err(|e| e.to_string())?;
    s.create_test_steps(&case.id, make_steps(2))
        .await
        .map_err(|e| e.to_string())?;
    let suite = s
        .create_test_suite(make_suite("Regression"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_suite_case(&suite.id, &case.id)
        .await
        .map_err(|e| e.to_string())?;
    let run = s
        .create_flow_run(make_flow_run("Sprint 1"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_flow_run_case(NewFlowRunCase {
        flow_run_id: run.id.clone(),
        test_case_id: case.id.clone(),
        isolation: StepIsolation::CopyOnAdd,
        status: CaseStatus::NoRun,
    })
    .await
    .map_err(|e| e.to_string())?;

    s.delete_test_case(&case.id)
        .await
        .map_err(|e| e.to_string())?;

    match s.get_test_case(&case.id).await {
        Err(StoreError::NotFound { .. }) => {}
        other => return Err(format!("expected NotFound after delete, got {:?}", other)),
    }
    let steps = s
        .list_test_steps(&case.id)
        .await
        .map_err(|e| e.to_string())?;
    let links = s
        .list_suite_cases(&suite.id)
        .await
        .map_err(|e| e.to_string())?;
    let run_cases = s
        .list_flow_run_cases(&run.id)
        .await
        .map_err(|e| e.to_string())?;
    if !steps.is_empty() || !links.is_empty() || !run_cases.is_empty() {
        return Err(format!(
            "cascade incomplete: {} steps, {} links, {} run cases",
            steps.len(),
            links.len(),
            run_cases.len()
        ));
    }
    Ok(())
}
