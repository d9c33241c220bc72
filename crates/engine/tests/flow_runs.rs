//! Executing cases inside flow runs under both step isolation policies.

mod common;

use std::sync::Arc;

use caseflow_engine::adapter::{load_flow_run_case, load_flow_run_cases, load_test_case};
use caseflow_engine::authoring::{self, CaseEdit, StepDraft};
use caseflow_engine::lifecycle::flow_run_summary;
use caseflow_engine::registry::{
    add_case_to_flow_run, add_case_to_suite, add_suite_to_flow_run, remove_case_from_flow_run,
};
use caseflow_engine::{
    Catalog, CaseStatus, EngineError, ExecutionScope, LinkOutcome, Sequencer, StepIsolation,
    StepStatus,
};
use caseflow_storage::{CaseStore, MemoryStore};

use common::{case_with_steps, flow_run, suite};

// ──────────────────────────────────────
// Copy-on-add
// ──────────────────────────────────────

#[tokio::test]
async fn adding_a_case_snapshots_fresh_steps() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "login", 2).await;
    let mut seq = Sequencer::for_case(&store, &case.id).await.unwrap();
    seq.quick_complete(&store, StepStatus::Passed).await.unwrap();

    let run = flow_run(&store, "r").await;
    add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &case.id)
        .await
        .unwrap();

    let run_case = load_flow_run_case(&store, &run.id, &case.id).await.unwrap();
    assert_eq!(run_case.status, CaseStatus::NoRun);
    assert_eq!(run_case.steps.len(), 2);
    assert_eq!(run_case.steps[0].description, "login step 0");
    assert!(run_case.steps.iter().all(|s| s.status == StepStatus::Pending));
    assert_eq!(load_test_case(&store, &case.id).await.unwrap().status, CaseStatus::Passed);
}

#[tokio::test]
async fn run_execution_leaves_the_canonical_case_alone() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "pay", 2).await;
    let run = flow_run(&store, "r").await;
    add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &case.id)
        .await
        .unwrap();

    let mut seq = Sequencer::for_flow_run_case(&store, &run.id, &case.id)
        .await
        .unwrap();
    assert!(matches!(seq.context().scope, ExecutionScope::RunCopy { .. }));
    seq.start(&store).await.unwrap();
    let first = seq.steps()[0].id.clone();
    seq.record_step(&store, &first, StepStatus::Failed).await.unwrap();

    let run_case = load_flow_run_case(&store, &run.id, &case.id).await.unwrap();
    assert_eq!(run_case.status, CaseStatus::Failed);
    assert_eq!(run_case.steps[0].status, StepStatus::Failed);

    let canonical = load_test_case(&store, &case.id).await.unwrap();
    assert_eq!(canonical.status, CaseStatus::NoRun);
    assert!(canonical.steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn two_runs_of_the_same_case_are_independent() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "shared", 1).await;
    let first = flow_run(&store, "first").await;
    let second = flow_run(&store, "second").await;
    for run in [&first, &second] {
        add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &case.id)
            .await
            .unwrap();
    }

    let mut seq = Sequencer::for_flow_run_case(&store, &first.id, &case.id)
        .await
        .unwrap();
    seq.quick_complete(&store, StepStatus::Passed).await.unwrap();

    let other = load_flow_run_case(&store, &second.id, &case.id).await.unwrap();
    assert_eq!(other.status, CaseStatus::NoRun);
    assert_eq!(other.steps[0].status, StepStatus::Pending);
}

#[tokio::test]
async fn editing_the_case_does_not_reach_existing_snapshots() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "edit", 1).await;
    let run = flow_run(&store, "r").await;
    add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &case.id)
        .await
        .unwrap();

    authoring::edit_test_case(
        &store,
        &case.id,
        CaseEdit {
            steps: Some(vec![StepDraft {
                description: "rewritten".into(),
                expected_result: "new".into(),
            }]),
            ..CaseEdit::default()
        },
    )
    .await
    .unwrap();

    let run_case = load_flow_run_case(&store, &run.id, &case.id).await.unwrap();
    assert_eq!(run_case.steps[0].description, "edit step 0");
}

#[tokio::test]
async fn failed_snapshot_rolls_the_link_back() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "fragile", 2).await;
    let run = flow_run(&store, "r").await;

    // list_test_steps and insert_flow_run_case go through, create_run_steps fails.
    store.fail_after(2, 1);
    let err = add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &case.id)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(store.list_flow_run_cases(&run.id).await.unwrap().is_empty());

    let retry = add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &case.id)
        .await
        .unwrap();
    assert_eq!(retry, LinkOutcome::Linked);
}

// ──────────────────────────────────────
// Shared steps
// ──────────────────────────────────────

#[tokio::test]
async fn shared_execution_updates_both_statuses() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "live", 2).await;
    let run = flow_run(&store, "r").await;
    add_case_to_flow_run(&store, StepIsolation::Shared, &run.id, &case.id)
        .await
        .unwrap();
    let run_case = load_flow_run_case(&store, &run.id, &case.id).await.unwrap();
    assert_eq!(run_case.isolation, StepIsolation::Shared);
    assert_eq!(run_case.steps, case.steps);

    let mut seq = Sequencer::for_flow_run_case(&store, &run.id, &case.id)
        .await
        .unwrap();
    assert!(matches!(seq.context().scope, ExecutionScope::RunShared { .. }));
    seq.start(&store).await.unwrap();
    let ids: Vec<String> = seq.steps().iter().map(|s| s.id.clone()).collect();
    seq.record_step(&store, &ids[0], StepStatus::Passed).await.unwrap();
    seq.record_step(&store, &ids[1], StepStatus::Passed).await.unwrap();

    let run_case = load_flow_run_case(&store, &run.id, &case.id).await.unwrap();
    assert_eq!(run_case.status, CaseStatus::Passed);
    let canonical = load_test_case(&store, &case.id).await.unwrap();
    assert_eq!(canonical.status, CaseStatus::Passed);
    assert!(canonical.steps.iter().all(|s| s.status == StepStatus::Passed));
}

#[tokio::test]
async fn copied_run_case_stays_isolated_after_switching_to_shared() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "mixed", 2).await;
    let copied = flow_run(&store, "copied").await;
    let shared = flow_run(&store, "shared").await;
    add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &copied.id, &case.id)
        .await
        .unwrap();
    // Later adds use the other policy; the earlier run case must not follow.
    add_case_to_flow_run(&store, StepIsolation::Shared, &shared.id, &case.id)
        .await
        .unwrap();

    let mut seq = Sequencer::for_flow_run_case(&store, &copied.id, &case.id)
        .await
        .unwrap();
    assert!(matches!(seq.context().scope, ExecutionScope::RunCopy { .. }));
    seq.quick_complete(&store, StepStatus::Failed).await.unwrap();

    let run_case = load_flow_run_case(&store, &copied.id, &case.id).await.unwrap();
    assert_eq!(run_case.status, CaseStatus::Failed);
    let canonical = load_test_case(&store, &case.id).await.unwrap();
    assert_eq!(canonical.status, CaseStatus::NoRun);
    assert!(canonical.steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn shared_run_case_executes_canonical_steps_after_switching_to_copies() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "mixed", 2).await;
    let shared = flow_run(&store, "shared").await;
    let copied = flow_run(&store, "copied").await;
    add_case_to_flow_run(&store, StepIsolation::Shared, &shared.id, &case.id)
        .await
        .unwrap();
    add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &copied.id, &case.id)
        .await
        .unwrap();

    let mut seq = Sequencer::for_flow_run_case(&store, &shared.id, &case.id)
        .await
        .unwrap();
    assert!(matches!(seq.context().scope, ExecutionScope::RunShared { .. }));
    assert_eq!(seq.steps().len(), 2);
    assert!(!seq.start(&store).await.unwrap().is_empty());
    assert!(seq.is_running());
    seq.quick_complete(&store, StepStatus::Passed).await.unwrap();

    let run_case = load_flow_run_case(&store, &shared.id, &case.id).await.unwrap();
    assert_eq!(run_case.status, CaseStatus::Passed);
    assert_eq!(load_test_case(&store, &case.id).await.unwrap().status, CaseStatus::Passed);
    let other = load_flow_run_case(&store, &copied.id, &case.id).await.unwrap();
    assert_eq!(other.status, CaseStatus::NoRun);
    assert!(other.steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn abandoning_a_run_execution_resets_the_run_case() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "abandon", 2).await;
    let run = flow_run(&store, "r").await;
    add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &case.id)
        .await
        .unwrap();

    let mut seq = Sequencer::for_flow_run_case(&store, &run.id, &case.id)
        .await
        .unwrap();
    seq.start(&store).await.unwrap();
    let first = seq.steps()[0].id.clone();
    seq.record_step(&store, &first, StepStatus::Passed).await.unwrap();
    assert_eq!(
        seq.exit(&store, false).await.unwrap_err(),
        EngineError::ConfirmationRequired
    );
    seq.exit(&store, true).await.unwrap();

    let run_case = load_flow_run_case(&store, &run.id, &case.id).await.unwrap();
    assert_eq!(run_case.status, CaseStatus::NoRun);
    assert!(run_case.steps.iter().all(|s| s.status == StepStatus::Pending));
}

// ──────────────────────────────────────
// Membership
// ──────────────────────────────────────

#[tokio::test]
async fn adding_twice_keeps_one_execution_record() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "dup", 3).await;
    let run = flow_run(&store, "r").await;

    add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &case.id)
        .await
        .unwrap();
    let again = add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &case.id)
        .await
        .unwrap();
    assert_eq!(again, LinkOutcome::AlreadyLinked);

    let cases = load_flow_run_cases(&store, &run.id).await.unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].steps.len(), 3);
}

#[tokio::test]
async fn concurrent_adds_of_one_pair_leave_one_record() {
    let store = Arc::new(MemoryStore::new());
    let case = case_with_steps(&store, "race", 1).await;
    let run = flow_run(&store, "r").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let run_id = run.id.clone();
        let case_id = case.id.clone();
        handles.push(tokio::spawn(async move {
            add_case_to_flow_run(&*store, StepIsolation::CopyOnAdd, &run_id, &case_id).await
        }));
    }
    let mut linked = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() == LinkOutcome::Linked {
            linked += 1;
        }
    }
    assert_eq!(linked, 1);
    assert_eq!(store.list_flow_run_cases(&run.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn removing_from_a_run_is_idempotent() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "gone", 1).await;
    let run = flow_run(&store, "r").await;
    add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &case.id)
        .await
        .unwrap();

    let first = remove_case_from_flow_run(&store, &run.id, &case.id).await.unwrap();
    let second = remove_case_from_flow_run(&store, &run.id, &case.id).await.unwrap();
    assert_eq!(first, LinkOutcome::Unlinked);
    assert_eq!(second, LinkOutcome::NotLinked);
}

#[tokio::test]
async fn suite_bulk_add_reports_each_case() {
    let store = MemoryStore::new();
    let smoke = suite(&store, "smoke").await;
    let a = case_with_steps(&store, "a", 1).await;
    let b = case_with_steps(&store, "b", 1).await;
    let c = case_with_steps(&store, "c", 1).await;
    for case in [&a, &b, &c] {
        add_case_to_suite(&store, &smoke.id, &case.id).await.unwrap();
    }
    let run = flow_run(&store, "r").await;
    add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &a.id)
        .await
        .unwrap();

    let report = add_suite_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &smoke.id)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.already_linked, vec![a.id.clone()]);
    assert_eq!(report.linked, vec![b.id.clone(), c.id.clone()]);
    assert_eq!(store.list_flow_run_cases(&run.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn suite_bulk_add_keeps_partial_progress() {
    let store = MemoryStore::new();
    let smoke = suite(&store, "smoke").await;
    let a = case_with_steps(&store, "a", 0).await;
    let b = case_with_steps(&store, "b", 0).await;
    for case in [&a, &b] {
        add_case_to_suite(&store, &smoke.id, &case.id).await.unwrap();
    }
    let run = flow_run(&store, "r").await;

    // get suite, get run, list members, then case a's list_test_steps and
    // insert go through; case b's list_test_steps fails.
    store.fail_after(5, 1);
    let report = add_suite_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &smoke.id)
        .await
        .unwrap();
    assert_eq!(report.linked, vec![a.id.clone()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, b.id);
    assert_eq!(store.list_flow_run_cases(&run.id).await.unwrap().len(), 1);
}

// ──────────────────────────────────────
// Notes, summary, catalog
// ──────────────────────────────────────

#[tokio::test]
async fn notes_and_summary_reflect_run_state() {
    let store = MemoryStore::new();
    let run = flow_run(&store, "r").await;
    let pass = case_with_steps(&store, "pass", 1).await;
    let fail = case_with_steps(&store, "fail", 1).await;
    let idle = case_with_steps(&store, "idle", 1).await;
    for case in [&pass, &fail, &idle] {
        add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &case.id)
            .await
            .unwrap();
    }
    for (case, status) in [(&pass, StepStatus::Passed), (&fail, StepStatus::Failed)] {
        let mut seq = Sequencer::for_flow_run_case(&store, &run.id, &case.id)
            .await
            .unwrap();
        seq.quick_complete(&store, status).await.unwrap();
    }

    let noted = authoring::set_run_case_notes(&store, &run.id, &fail.id, "blocked by bug 88")
        .await
        .unwrap();
    assert_eq!(noted.notes, "blocked by bug 88");

    let summary = flow_run_summary(&store, &run.id).await.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.no_run, 1);
}

#[tokio::test]
async fn catalog_drops_cases_the_store_lost() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "doomed", 1).await;
    let mut catalog = Catalog::load(&store).await.unwrap();
    assert_eq!(catalog.all_cases().len(), 1);

    authoring::delete_test_case(&store, &case.id).await.unwrap();
    let err = Sequencer::for_case(&store, &case.id).await.unwrap_err();
    assert!(catalog.absorb(&err));
    assert!(catalog.all_cases().is_empty());
}
