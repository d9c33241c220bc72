//! Store-boundary adapter: assembles domain values from store records.

use std::collections::BTreeSet;

use caseflow_storage::{CaseStore, FlowRunCaseRecord, StepIsolation};

use crate::error::EngineError;
use crate::types::{FlowRun, FlowRunTestCase, TestCase, TestStep, TestSuite};

pub async fn load_test_case<S: CaseStore>(store: &S, id: &str) -> Result<TestCase, EngineError> {
    let record = store.get_test_case(id).await?;
    let steps = store.list_test_steps(id).await?;
    Ok(TestCase::from_records(record, steps))
}

/// All test cases with their steps, most recently created first.
pub async fn load_test_cases<S: CaseStore>(store: &S) -> Result<Vec<TestCase>, EngineError> {
    let records = store.list_test_cases().await?;
    let mut cases = Vec::with_capacity(records.len());
    for record in records {
        let steps = store.list_test_steps(&record.id).await?;
        cases.push(TestCase::from_records(record, steps));
    }
    Ok(cases)
}

pub async fn load_test_suite<S: CaseStore>(store: &S, id: &str) -> Result<TestSuite, EngineError> {
    let record = store.get_test_suite(id).await?;
    let members: BTreeSet<String> = store.list_suite_cases(id).await?.into_iter().collect();
    Ok(TestSuite {
        id: record.id,
        display_id: record.display_id,
        name: record.name,
        labels: record.labels,
        assignee: record.assignee,
        test_cases: members,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

pub async fn load_test_suites<S: CaseStore>(store: &S) -> Result<Vec<TestSuite>, EngineError> {
    let mut suites = Vec::new();
    for record in store.list_test_suites().await? {
        suites.push(load_test_suite(store, &record.id).await?);
    }
    Ok(suites)
}

pub async fn load_flow_run<S: CaseStore>(store: &S, id: &str) -> Result<FlowRun, EngineError> {
    Ok(store.get_flow_run(id).await?.into())
}

pub async fn load_flow_runs<S: CaseStore>(store: &S) -> Result<Vec<FlowRun>, EngineError> {
    Ok(store
        .list_flow_runs()
        .await?
        .into_iter()
        .map(FlowRun::from)
        .collect())
}

/// Steps a run case executes, according to the isolation it was added with.
async fn run_case_steps<S: CaseStore>(
    store: &S,
    record: &FlowRunCaseRecord,
) -> Result<Vec<TestStep>, EngineError> {
    Ok(match record.isolation {
        StepIsolation::CopyOnAdd => store
            .list_run_steps(&record.id)
            .await?
            .into_iter()
            .map(TestStep::from)
            .collect(),
        StepIsolation::Shared => store
            .list_test_steps(&record.test_case_id)
            .await?
            .into_iter()
            .map(TestStep::from)
            .collect(),
    })
}

/// The execution record of one case inside one run, with the steps it
/// executes.
pub async fn load_flow_run_case<S: CaseStore>(
    store: &S,
    flow_run_id: &str,
    test_case_id: &str,
) -> Result<FlowRunTestCase, EngineError> {
    let record = store.get_flow_run_case(flow_run_id, test_case_id).await?;
    let steps = run_case_steps(store, &record).await?;
    Ok(FlowRunTestCase::from_records(record, steps))
}

pub async fn load_flow_run_cases<S: CaseStore>(
    store: &S,
    flow_run_id: &str,
) -> Result<Vec<FlowRunTestCase>, EngineError> {
    // Surface a missing run as NotFound rather than an empty list.
    store.get_flow_run(flow_run_id).await?;
    let mut cases = Vec::new();
    for record in store.list_flow_run_cases(flow_run_id).await? {
        let steps = run_case_steps(store, &record).await?;
        cases.push(FlowRunTestCase::from_records(record, steps));
    }
    Ok(cases)
}
