use std::future::Future;

use super::{make_case, make_flow_run, make_suite, TestResult};
use crate::record::{CaseStatus, NewFlowRunCase, StepIsolation};
use crate::{CaseStore, StoreError};

pub(super) async fn run_link_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "links",
        "suite_link_visible_after_insert",
        suite_link_visible_after_insert(factory).await,
    ));
    results.push(TestResult::from_result(
        "links",
        "duplicate_suite_link_rejected",
        duplicate_suite_link_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "links",
        "delete_missing_suite_link_is_ok",
        delete_missing_suite_link_is_ok(factory).await,
    ));
    results.push(TestResult::from_result(
        "links",
        "delete_suite_link_removes_only_that_pair",
        delete_suite_link_removes_only_that_pair(factory).await,
    ));
    results.push(TestResult::from_result(
        "links",
        "suite_link_requires_existing_records",
        suite_link_requires_existing_records(factory).await,
    ));
    results.push(TestResult::from_result(
        "links",
        "duplicate_flow_run_case_rejected",
        duplicate_flow_run_case_rejected(factory).await,
    ));
    results.push(TestResult::from_result(
        "links",
        "case_can_join_many_suites",
        case_can_join_many_suites(factory).await,
    ));
    results.push(TestResult::from_result(
        "links",
        "delete_suite_cascades_links",
        delete_suite_cascades_links(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn suite_link_visible_after_insert<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let case = s
        .create_test_case(make_case("Login"))
        .await
        .map_err(|e| e.to_string())?;
    let suite = s
        .create_test_suite(make_suite("Smoke"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_suite_case(&suite.id, &case.id)
        .await
        .map_err(|e| e.to_string())?;

    let ids = s
        .list_suite_cases(&suite.id)
        .await
        .map_err(|e| e.to_string())?;
    if ids != vec![case.id.clone()] {
        return Err(format!("expected [{}], got {:?}", case.id, ids));
    }
    Ok(())
}

/// A second insert of the same pair fails with DuplicateLink and leaves one row.
async fn duplicate_suite_link_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let case = s
        .create_test_case(make_case("Login"))
        .await
        .map_err(|e| e.to_string())?;
    let suite = s
        .create_test_suite(make_suite("Smoke"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_suite_case(&suite.id, &case.id)
        .await
        .map_err(|e| e.to_string())?;

    match s.insert_suite_case(&suite.id, &case.id).await {
        Err(StoreError::DuplicateLink { .. }) => {}
        other => return Err(format!("expected DuplicateLink, got {:?}", other)),
    }
    let ids = s
        .list_suite_cases(&suite.id)
        .await
        .map_err(|e| e.to_string())?;
    if ids.len() != 1 {
        return Err(format!("expected exactly 1 link, got {}", ids.len()));
    }
    Ok(())
}

async fn delete_missing_suite_link_is_ok<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let suite = s
        .create_test_suite(make_suite("Smoke"))
        .await
        .map_err(|e| e.to_string())?;
    s.delete_suite_case(&suite.id, "no-such-case")
        .await
        .map_err(|e| format!("deleting a missing link must not fail: {e}"))?;
    Ok(())
}

async fn delete_suite_link_removes_only_that_pair<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s
        .create_test_case(make_case("a"))
        .await
        .map_err(|e| e.to_string())?;
    let b = s
        .create_test_case(make_case("b"))
        .await
        .map_err(|e| e.to_string())?;
    let suite = s
        .create_test_suite(make_suite("Smoke"))
        .await
        .map_err(|e| e.to_string())?;
    for id in [&a.id, &b.id] {
        s.insert_suite_case(&suite.id, id)
            .await
            .map_err(|e| e.to_string())?;
    }
    s.delete_suite_case(&suite.id, &a.id)
        .await
        .map_err(|e| e.to_string())?;

    let ids = s
        .list_suite_cases(&suite.id)
        .await
        .map_err(|e| e.to_string())?;
    if ids != vec![b.id.clone()] {
        return Err(format!("expected only {} left, got {:?}", b.id, ids));
    }
    Ok(())
}

async fn suite_link_requires_existing_records<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let suite = s
        .create_test_suite(make_suite("Smoke"))
        .await
        .map_err(|e| e.to_string())?;
    match s.insert_suite_case(&suite.id, "ghost").await {
        Err(StoreError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound for missing case, got {:?}", other)),
    }
}

async fn duplicate_flow_run_case_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let case = s
        .create_test_case(make_case("Login"))
        .await
        .map_err(|e| e.to_string())?;
    let run = s
        .create_flow_run(make_flow_run("Sprint 1"))
        .await
        .map_err(|e| e.to_string())?;
    let new_link = NewFlowRunCase {
        flow_run_id: run.id.clone(),
        test_case_id: case.id.clone(),
        isolation: StepIsolation::CopyOnAdd,
        status: CaseStatus::NoRun,
    };
    s.insert_flow_run_case(new_link.clone())
        .await
        .map_err(|e| e.to_string())?;

    match s.insert_flow_run_case(new_link).await {
        Err(StoreError::DuplicateLink { .. }) => {}
        other => return Err(format!("expected DuplicateLink, got {:?}", other)),
    }
    let rows = s
        .list_flow_run_cases(&run.id)
        .await
        .map_err(|e| e.to_string())?;
    if rows.len() != 1 {
        return Err(format!("expected exactly 1 flow run case, got {}", rows.len()));
    }
    Ok(())
}

async fn case_can_join_many_suites<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let case = s
        .create_test_case(make_case("Login"))
        .await
        .map_err(|e| e.to_string())?;
    let smoke = s
        .create_test_suite(make_suite("Smoke"))
        .await
        .map_err(|e| e.to_string())?;
    let full = s
        .create_test_suite(make_suite("Full"))
        .await
        .map_err(|e| e.to_string())?;
    for suite in [&smoke, &full] {
        s.insert_suite_case(&suite.id, &case.id)
            .await
            .map_err(|e| e.to_string())?;
    }
    for suite in [&smoke, &full] {
        let ids = s
            .list_suite_cases(&suite.id)
            .await
            .map_err(|e| e.to_string())?;
        if ids != vec![case.id.clone()] {
            return Err(format!("suite {} missing case: {:?}", suite.name, ids));
        }
    }
    Ok(())
}

async fn delete_suite_cascades_links<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let case = s
        .create_test_case(make_case("Login"))
        .await
        .map_err(|e| e.to_string())?;
    let suite = s
        .create_test_suite(make_suite("Smoke"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_suite_case(&suite.id, &case.id)
        .await
        .map_err(|e| e.to_string())?;
    s.delete_test_suite(&suite.id)
        .await
        .map_err(|e| e.to_string())?;

    let ids = s
        .list_suite_cases(&suite.id)
        .await
        .map_err(|e| e.to_string())?;
    if !ids.is_empty() {
        return Err(format!("links survived suite delete: {:?}", ids));
    }
    s.get_test_case(&case.id)
        .await
        .map_err(|e| format!("case must survive suite delete: {e}"))?;
    Ok(())
}
