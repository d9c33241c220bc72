use std::future::Future;

use super::{make_case, make_flow_run, make_steps, TestResult};
use crate::record::{
    BatchStatus, CaseStatus, NewFlowRunCase, NewRunStep, StepIsolation, StepStatus, StepUpdate,
    TestCasePatch,
};
use crate::{CaseStore, StoreError};

pub(super) async fn run_batch_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "batch",
        "replace_steps_restarts_positions_and_sets_status",
        replace_steps_restarts_positions_and_sets_status(factory).await,
    ));
    results.push(TestResult::from_result(
        "batch",
        "step_batch_applies_steps_and_status",
        step_batch_applies_steps_and_status(factory).await,
    ));
    results.push(TestResult::from_result(
        "batch",
        "step_batch_with_foreign_step_writes_nothing",
        step_batch_with_foreign_step_writes_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "batch",
        "step_batch_can_set_run_case_status",
        step_batch_can_set_run_case_status(factory).await,
    ));
    results.push(TestResult::from_result(
        "batch",
        "run_step_batch_is_all_or_nothing",
        run_step_batch_is_all_or_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "batch",
        "flow_run_case_keeps_isolation",
        flow_run_case_keeps_isolation(factory).await,
    ));

    results
}

fn passed(step_id: &str) -> StepUpdate {
    StepUpdate {
        step_id: step_id.to_string(),
        status: Some(StepStatus::Passed),
        actual_result: None,
    }
}

async fn case_with_steps<S: CaseStore>(s: &S, n: usize) -> Result<(String, Vec<String>), String> {
    let case = s
        .create_test_case(make_case("Checkout"))
        .await
        .map_err(|e| e.to_string())?;
    let steps = s
        .create_test_steps(&case.id, make_steps(n))
        .await
        .map_err(|e| e.to_string())?;
    Ok((case.id, steps.into_iter().map(|st| st.id).collect()))
}

async fn link<S: CaseStore>(
    s: &S,
    test_case_id: &str,
    isolation: StepIsolation,
) -> Result<String, String> {
    let run = s
        .create_flow_run(make_flow_run("Sprint 1"))
        .await
        .map_err(|e| e.to_string())?;
    let record = s
        .insert_flow_run_case(NewFlowRunCase {
            flow_run_id: run.id,
            test_case_id: test_case_id.to_string(),
            isolation,
            status: CaseStatus::NoRun,
        })
        .await
        .map_err(|e| e.to_string())?;
    Ok(record.id)
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn replace_steps_restarts_positions_and_sets_status<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (case_id, old) = case_with_steps(&s, 3).await?;
    s.update_test_case(
        &case_id,
        TestCasePatch {
            status: Some(CaseStatus::Failed),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let created = s
        .replace_test_steps(&case_id, make_steps(1), CaseStatus::NoRun)
        .await
        .map_err(|e| e.to_string())?;
    let steps = s
        .list_test_steps(&case_id)
        .await
        .map_err(|e| e.to_string())?;
    if steps.len() != 1 || steps[0].id != created[0].id || steps[0].position != 0 {
        return Err(format!("expected one fresh step at position 0, got {:?}", steps));
    }
    if old.contains(&steps[0].id) {
        return Err("old step survived replacement".to_string());
    }
    let case = s.get_test_case(&case_id).await.map_err(|e| e.to_string())?;
    if case.status != CaseStatus::NoRun {
        return Err(format!("status not replaced: {}", case.status));
    }
    Ok(())
}

async fn step_batch_applies_steps_and_status<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (case_id, steps) = case_with_steps(&s, 2).await?;
    s.update_test_steps(
        &case_id,
        vec![
            passed(&steps[0]),
            StepUpdate {
                step_id: steps[1].clone(),
                status: Some(StepStatus::Failed),
                actual_result: Some("timeout".to_string()),
            },
        ],
        BatchStatus {
            test_case: Some(CaseStatus::Failed),
            flow_run_case: None,
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let read = s
        .list_test_steps(&case_id)
        .await
        .map_err(|e| e.to_string())?;
    if read[0].status != StepStatus::Passed
        || read[1].status != StepStatus::Failed
        || read[1].actual_result != "timeout"
    {
        return Err(format!("batch not applied: {:?}", read));
    }
    let case = s.get_test_case(&case_id).await.map_err(|e| e.to_string())?;
    if case.status != CaseStatus::Failed {
        return Err(format!("case status not written: {}", case.status));
    }
    Ok(())
}

/// A batch naming a step of another case is rejected and changes nothing.
async fn step_batch_with_foreign_step_writes_nothing<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (case_id, steps) = case_with_steps(&s, 1).await?;
    let (_other_id, other_steps) = case_with_steps(&s, 1).await?;

    let result = s
        .update_test_steps(
            &case_id,
            vec![passed(&steps[0]), passed(&other_steps[0])],
            BatchStatus {
                test_case: Some(CaseStatus::Passed),
                flow_run_case: None,
            },
        )
        .await;
    if !matches!(result, Err(StoreError::NotFound { .. })) {
        return Err(format!("expected NotFound, got {:?}", result));
    }

    let read = s
        .list_test_steps(&case_id)
        .await
        .map_err(|e| e.to_string())?;
    if read[0].status != StepStatus::Pending {
        return Err("first step written by a rejected batch".to_string());
    }
    let case = s.get_test_case(&case_id).await.map_err(|e| e.to_string())?;
    if case.status != CaseStatus::NoRun {
        return Err("case status written by a rejected batch".to_string());
    }
    Ok(())
}

async fn step_batch_can_set_run_case_status<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (case_id, steps) = case_with_steps(&s, 1).await?;
    let run_case_id = link(&s, &case_id, StepIsolation::Shared).await?;

    s.update_test_steps(
        &case_id,
        vec![passed(&steps[0])],
        BatchStatus {
            test_case: Some(CaseStatus::Passed),
            flow_run_case: Some((run_case_id.clone(), CaseStatus::Passed)),
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let runs = s
        .list_flow_runs()
        .await
        .map_err(|e| e.to_string())?;
    let record = s
        .get_flow_run_case(&runs[0].id, &case_id)
        .await
        .map_err(|e| e.to_string())?;
    if record.id != run_case_id || record.status != CaseStatus::Passed {
        return Err(format!("run case status not written: {:?}", record));
    }
    Ok(())
}

async fn run_step_batch_is_all_or_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (case_id, steps) = case_with_steps(&s, 1).await?;
    let run_case_id = link(&s, &case_id, StepIsolation::CopyOnAdd).await?;
    let copies = s
        .create_run_steps(
            &run_case_id,
            vec![NewRunStep {
                source_step_id: steps[0].clone(),
                description: "step 0".to_string(),
                ..Default::default()
            }],
        )
        .await
        .map_err(|e| e.to_string())?;

    // The canonical step id is not a run step of this run case.
    let rejected = s
        .update_run_steps(
            &run_case_id,
            vec![passed(&copies[0].id), passed(&steps[0])],
            Some(CaseStatus::Passed),
        )
        .await;
    if !matches!(rejected, Err(StoreError::NotFound { .. })) {
        return Err(format!("expected NotFound, got {:?}", rejected));
    }
    let read = s
        .list_run_steps(&run_case_id)
        .await
        .map_err(|e| e.to_string())?;
    if read[0].status != StepStatus::Pending {
        return Err("run step written by a rejected batch".to_string());
    }

    s.update_run_steps(&run_case_id, vec![passed(&copies[0].id)], Some(CaseStatus::Passed))
        .await
        .map_err(|e| e.to_string())?;
    let read = s
        .list_run_steps(&run_case_id)
        .await
        .map_err(|e| e.to_string())?;
    if read[0].status != StepStatus::Passed {
        return Err("run step batch not applied".to_string());
    }
    let case = s.get_test_case(&case_id).await.map_err(|e| e.to_string())?;
    if case.status != CaseStatus::NoRun {
        return Err("run step batch leaked into the case status".to_string());
    }
    Ok(())
}

async fn flow_run_case_keeps_isolation<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (case_id, _) = case_with_steps(&s, 1).await?;
    link(&s, &case_id, StepIsolation::Shared).await?;
    let runs = s
        .list_flow_runs()
        .await
        .map_err(|e| e.to_string())?;
    let record = s
        .get_flow_run_case(&runs[0].id, &case_id)
        .await
        .map_err(|e| e.to_string())?;
    if record.isolation != StepIsolation::Shared {
        return Err(format!("isolation not kept: {}", record.isolation));
    }
    Ok(())
}
