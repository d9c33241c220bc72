//! Association registry: case↔suite membership and case↔flow-run execution
//! records.
//!
//! Links are sets. Adding an existing link is a successful no-op and
//! removing a missing one is a successful no-op; the store's duplicate
//! rejection is the authoritative guard, so concurrent adds of the same pair
//! still leave exactly one row.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use caseflow_storage::{CaseStore, NewFlowRunCase, NewRunStep, StoreError};

use crate::config::StepIsolation;
use crate::error::EngineError;
use crate::rollup::rollup_statuses;
use crate::types::{StepStatus, TestCase};

/// What a link or unlink request actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
    Unlinked,
    NotLinked,
}

// ──────────────────────────────────────────────
// Suites
// ──────────────────────────────────────────────

pub async fn add_case_to_suite<S: CaseStore>(
    store: &S,
    suite_id: &str,
    test_case_id: &str,
) -> Result<LinkOutcome, EngineError> {
    match store.insert_suite_case(suite_id, test_case_id).await {
        Ok(()) => {
            info!(suite_id, test_case_id, "case added to suite");
            Ok(LinkOutcome::Linked)
        }
        Err(StoreError::DuplicateLink { .. }) => {
            debug!(suite_id, test_case_id, "case already in suite");
            Ok(LinkOutcome::AlreadyLinked)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn remove_case_from_suite<S: CaseStore>(
    store: &S,
    suite_id: &str,
    test_case_id: &str,
) -> Result<LinkOutcome, EngineError> {
    store.get_test_suite(suite_id).await?;
    let members = store.list_suite_cases(suite_id).await?;
    if !members.iter().any(|id| id == test_case_id) {
        return Ok(LinkOutcome::NotLinked);
    }
    store.delete_suite_case(suite_id, test_case_id).await?;
    info!(suite_id, test_case_id, "case removed from suite");
    Ok(LinkOutcome::Unlinked)
}

// ──────────────────────────────────────────────
// Flow runs
// ──────────────────────────────────────────────

/// Add a test case to a flow run.
///
/// The new execution record starts fresh and remembers `isolation`, which
/// decides how it executes from then on. Under [`StepIsolation::CopyOnAdd`]
/// the case's current steps are snapshotted as pending run steps, so later
/// edits to the case do not reach this run; under [`StepIsolation::Shared`]
/// no copy is made and the run-local status mirrors the canonical steps.
pub async fn add_case_to_flow_run<S: CaseStore>(
    store: &S,
    isolation: StepIsolation,
    flow_run_id: &str,
    test_case_id: &str,
) -> Result<LinkOutcome, EngineError> {
    let steps = store.list_test_steps(test_case_id).await?;

    let (copies, status) = match isolation {
        StepIsolation::CopyOnAdd => {
            let copies: Vec<NewRunStep> = steps
                .into_iter()
                .map(|s| NewRunStep {
                    source_step_id: s.id,
                    description: s.description,
                    expected_result: s.expected_result,
                    actual_result: String::new(),
                    status: StepStatus::Pending,
                })
                .collect();
            let status = rollup_statuses(copies.iter().map(|s| s.status));
            (copies, status)
        }
        StepIsolation::Shared => (Vec::new(), rollup_statuses(steps.iter().map(|s| s.status))),
    };

    let record = match store
        .insert_flow_run_case(NewFlowRunCase {
            flow_run_id: flow_run_id.to_string(),
            test_case_id: test_case_id.to_string(),
            isolation,
            status,
        })
        .await
    {
        Ok(record) => record,
        Err(StoreError::DuplicateLink { .. }) => {
            debug!(flow_run_id, test_case_id, "case already in flow run");
            return Ok(LinkOutcome::AlreadyLinked);
        }
        Err(e) => return Err(e.into()),
    };

    if !copies.is_empty() {
        let count = copies.len();
        if let Err(e) = store.create_run_steps(&record.id, copies).await {
            // A run case without its snapshot would execute an empty case.
            let _ = store.delete_flow_run_case(&record.id).await;
            warn!(flow_run_id, test_case_id, error = %e, "step snapshot failed; link rolled back");
            return Err(e.into());
        }
        debug!(flow_run_id, test_case_id, steps = count, "steps snapshotted into run");
    }

    info!(flow_run_id, test_case_id, ?isolation, "case added to flow run");
    Ok(LinkOutcome::Linked)
}

pub async fn remove_case_from_flow_run<S: CaseStore>(
    store: &S,
    flow_run_id: &str,
    test_case_id: &str,
) -> Result<LinkOutcome, EngineError> {
    store.get_flow_run(flow_run_id).await?;
    let record = match store.get_flow_run_case(flow_run_id, test_case_id).await {
        Ok(record) => record,
        Err(StoreError::NotFound { .. }) => return Ok(LinkOutcome::NotLinked),
        Err(e) => return Err(e.into()),
    };
    store.delete_flow_run_case(&record.id).await?;
    info!(flow_run_id, test_case_id, "case removed from flow run");
    Ok(LinkOutcome::Unlinked)
}

/// Per-case result of [`add_suite_to_flow_run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkAddReport {
    pub linked: Vec<String>,
    pub already_linked: Vec<String>,
    pub failed: Vec<(String, EngineError)>,
}

impl BulkAddReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Add every member of a suite to a flow run.
///
/// Each case is added on its own. A failure does not stop the remaining
/// adds and does not undo earlier ones; the report says which cases landed.
pub async fn add_suite_to_flow_run<S: CaseStore>(
    store: &S,
    isolation: StepIsolation,
    flow_run_id: &str,
    suite_id: &str,
) -> Result<BulkAddReport, EngineError> {
    store.get_test_suite(suite_id).await?;
    store.get_flow_run(flow_run_id).await?;
    let members = store.list_suite_cases(suite_id).await?;

    let mut report = BulkAddReport::default();
    for case_id in members {
        match add_case_to_flow_run(store, isolation, flow_run_id, &case_id).await {
            Ok(LinkOutcome::AlreadyLinked) => report.already_linked.push(case_id),
            Ok(_) => report.linked.push(case_id),
            Err(e) => {
                warn!(flow_run_id, suite_id, test_case_id = %case_id, error = %e, "bulk add skipped case");
                report.failed.push((case_id, e));
            }
        }
    }

    info!(
        flow_run_id,
        suite_id,
        linked = report.linked.len(),
        already_linked = report.already_linked.len(),
        failed = report.failed.len(),
        "suite added to flow run"
    );
    Ok(report)
}

// ──────────────────────────────────────────────
// Availability
// ──────────────────────────────────────────────

/// Cases from `all_cases` whose id is not in `linked`, in input order.
pub fn available(all_cases: &[TestCase], linked: &BTreeSet<String>) -> Vec<TestCase> {
    all_cases
        .iter()
        .filter(|c| !linked.contains(&c.id))
        .cloned()
        .collect()
}

/// Cases not yet in the suite.
pub async fn available_for_suite<S: CaseStore>(
    store: &S,
    suite_id: &str,
    all_cases: &[TestCase],
) -> Result<Vec<TestCase>, EngineError> {
    store.get_test_suite(suite_id).await?;
    let linked: BTreeSet<String> = store.list_suite_cases(suite_id).await?.into_iter().collect();
    Ok(available(all_cases, &linked))
}

/// Cases not yet in the flow run.
pub async fn available_for_flow_run<S: CaseStore>(
    store: &S,
    flow_run_id: &str,
    all_cases: &[TestCase],
) -> Result<Vec<TestCase>, EngineError> {
    store.get_flow_run(flow_run_id).await?;
    let linked: BTreeSet<String> = store
        .list_flow_run_cases(flow_run_id)
        .await?
        .into_iter()
        .map(|r| r.test_case_id)
        .collect();
    Ok(available(all_cases, &linked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CaseStatus, Priority};

    fn case(id: &str) -> TestCase {
        TestCase {
            id: id.into(),
            display_id: String::new(),
            title: id.into(),
            description: String::new(),
            priority: Priority::Medium,
            status: CaseStatus::NoRun,
            labels: vec![],
            assignee: None,
            steps: vec![],
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn available_excludes_linked_and_keeps_order() {
        let all = vec![case("c3"), case("c1"), case("c2")];
        let linked: BTreeSet<String> = ["c1".to_string()].into_iter().collect();
        let ids: Vec<String> = available(&all, &linked).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["c3", "c2"]);
    }

    #[test]
    fn available_with_nothing_linked_is_everything() {
        let all = vec![case("a"), case("b")];
        assert_eq!(available(&all, &BTreeSet::new()).len(), 2);
    }

    #[test]
    fn available_ignores_links_to_unknown_cases() {
        let all = vec![case("a")];
        let linked: BTreeSet<String> = ["zzz".to_string()].into_iter().collect();
        assert_eq!(available(&all, &linked).len(), 1);
    }

    #[test]
    fn bulk_report_completeness() {
        let mut report = BulkAddReport::default();
        assert!(report.is_complete());
        report
            .failed
            .push(("c1".into(), EngineError::StoreUnavailable("down".into())));
        assert!(!report.is_complete());
    }
}
