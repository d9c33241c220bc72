use std::future::Future;
use std::sync::Arc;

use super::{make_case, make_flow_run, make_suite, TestResult};
use crate::record::{CaseStatus, NewFlowRunCase, StepIsolation};
use crate::{CaseStore, StoreError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_suite_links_exactly_one_wins",
        concurrent_suite_links_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_flow_run_cases_exactly_one_wins",
        concurrent_flow_run_cases_exactly_one_wins(factory).await,
    ));

    results
}

/// Tally task outcomes: `Ok(true)` won, `Ok(false)` lost to a duplicate.
async fn tally(
    handles: Vec<tokio::task::JoinHandle<Result<bool, StoreError>>>,
) -> Result<(usize, usize), String> {
    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StoreError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }
    Ok((winners, losers))
}

// ── Concurrent suite link inserts: exactly one wins ─────────────────────────

/// N tasks race to link the same case into the same suite. Exactly one insert
/// succeeds; the rest must get DuplicateLink, and one row remains.
async fn concurrent_suite_links_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let case = storage
        .create_test_case(make_case("Login"))
        .await
        .map_err(|e| format!("create case: {e}"))?;
    let suite = storage
        .create_test_suite(make_suite("Smoke"))
        .await
        .map_err(|e| format!("create suite: {e}"))?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        let suite_id = suite.id.clone();
        let case_id = case.id.clone();
        handles.push(tokio::spawn(async move {
            match s.insert_suite_case(&suite_id, &case_id).await {
                Ok(()) => Ok(true),
                Err(StoreError::DuplicateLink { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let (winners, losers) = tally(handles).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    let ids = storage
        .list_suite_cases(&suite.id)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if ids.len() != 1 {
        return Err(format!("expected 1 link row, got {}", ids.len()));
    }
    Ok(())
}

// ── Concurrent flow-run case inserts: exactly one wins ──────────────────────

async fn concurrent_flow_run_cases_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let case = storage
        .create_test_case(make_case("Login"))
        .await
        .map_err(|e| format!("create case: {e}"))?;
    let run = storage
        .create_flow_run(make_flow_run("Sprint 1"))
        .await
        .map_err(|e| format!("create run: {e}"))?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        let new_link = NewFlowRunCase {
            flow_run_id: run.id.clone(),
            test_case_id: case.id.clone(),
            isolation: StepIsolation::CopyOnAdd,
            status: CaseStatus::NoRun,
        };
        handles.push(tokio::spawn(async move {
            match s.insert_flow_run_case(new_link).await {
                Ok(_) => Ok(true),
                Err(StoreError::DuplicateLink { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let (winners, losers) = tally(handles).await?;
    if winners != 1 || losers != N - 1 {
        return Err(format!(
            "expected 1 winner and {} losers, got {winners}/{losers}",
            N - 1
        ));
    }
    let rows = storage
        .list_flow_run_cases(&run.id)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if rows.len() != 1 {
        return Err(format!("expected 1 flow run case row, got {}", rows.len()));
    }
    Ok(())
}
