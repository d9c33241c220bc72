use std::future::Future;

use super::TestResult;
use crate::record::{FlowRunCasePatch, RunStepPatch, TestCasePatch, TestStepPatch};
use crate::{CaseStore, StoreError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_test_case_nonexistent",
        get_test_case_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "not_found_has_correct_id",
        not_found_has_correct_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "updates_of_missing_records_fail",
        updates_of_missing_records_fail(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "deletes_of_missing_records_fail",
        deletes_of_missing_records_fail(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "steps_for_missing_case_fail",
        steps_for_missing_case_fail(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "lists_empty_on_fresh_store",
        lists_empty_on_fresh_store(factory).await,
    ));

    results
}

fn expect_not_found<T: std::fmt::Debug>(
    what: &str,
    result: Result<T, StoreError>,
) -> Result<(), String> {
    match result {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => Err(format!("{what}: expected NotFound, got {:?}", other)),
    }
}

// ── 1. get on empty store returns NotFound ────────────────────────────────────

async fn get_test_case_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_not_found("get_test_case", s.get_test_case("tc-999").await)?;
    expect_not_found("get_test_suite", s.get_test_suite("ts-999").await)?;
    expect_not_found("get_flow_run", s.get_flow_run("fr-999").await)?;
    expect_not_found(
        "get_flow_run_case",
        s.get_flow_run_case("fr-999", "tc-999").await,
    )
}

// ── 2. NotFound carries the requested id ──────────────────────────────────────

async fn not_found_has_correct_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_test_case("tc-42").await {
        Err(StoreError::NotFound { id, .. }) => {
            if id != "tc-42" {
                return Err(format!("expected id \"tc-42\", got \"{}\"", id));
            }
            Ok(())
        }
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

// ── 3. updates against missing ids fail ───────────────────────────────────────

async fn updates_of_missing_records_fail<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_not_found(
        "update_test_case",
        s.update_test_case("ghost", TestCasePatch::default()).await,
    )?;
    expect_not_found(
        "update_test_step",
        s.update_test_step("ghost", TestStepPatch::default()).await,
    )?;
    expect_not_found(
        "update_flow_run_case",
        s.update_flow_run_case("ghost", FlowRunCasePatch::default())
            .await,
    )?;
    expect_not_found(
        "update_run_step",
        s.update_run_step("ghost", RunStepPatch::default()).await,
    )
}

// ── 4. deletes against missing ids fail (links excepted) ──────────────────────

async fn deletes_of_missing_records_fail<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_not_found("delete_test_case", s.delete_test_case("ghost").await)?;
    expect_not_found("delete_test_suite", s.delete_test_suite("ghost").await)?;
    expect_not_found("delete_flow_run", s.delete_flow_run("ghost").await)?;
    expect_not_found(
        "delete_flow_run_case",
        s.delete_flow_run_case("ghost").await,
    )
}

async fn steps_for_missing_case_fail<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_not_found(
        "create_test_steps",
        s.create_test_steps("ghost", super::make_steps(1)).await,
    )?;
    expect_not_found(
        "create_run_steps",
        s.create_run_steps("ghost", Vec::new()).await,
    )
}

async fn lists_empty_on_fresh_store<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let cases = s.list_test_cases().await.map_err(|e| e.to_string())?;
    let suites = s.list_test_suites().await.map_err(|e| e.to_string())?;
    let runs = s.list_flow_runs().await.map_err(|e| e.to_string())?;
    let links = s
        .list_suite_cases("ghost")
        .await
        .map_err(|e| e.to_string())?;
    if !cases.is_empty() || !suites.is_empty() || !runs.is_empty() || !links.is_empty() {
        return Err("expected every list to be empty".to_string());
    }
    Ok(())
}
