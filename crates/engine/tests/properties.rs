//! End-to-end behaviour of rollup, associations, sequencing and the flow run
//! lifecycle against the in-memory store.

mod common;

use caseflow_engine::adapter::{load_test_case, load_test_suite};
use caseflow_engine::lifecycle::{archive_flow_run, complete_flow_run, start_flow_run};
use caseflow_engine::registry::{
    add_case_to_flow_run, add_case_to_suite, available_for_flow_run, remove_case_from_suite,
};
use caseflow_engine::{
    transition_flow_run, CaseStatus, EngineError, FlowRunStatus, LinkOutcome, Sequencer,
    StepIsolation, StepStatus,
};
use caseflow_storage::{CaseStore, MemoryStore};

use common::{case_with_steps, flow_run, suite};

// ──────────────────────────────────────
// Suite membership
// ──────────────────────────────────────

#[tokio::test]
async fn adding_the_same_case_twice_keeps_one_link() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "login", 1).await;
    let smoke = suite(&store, "smoke").await;

    let first = add_case_to_suite(&store, &smoke.id, &case.id).await.unwrap();
    let second = add_case_to_suite(&store, &smoke.id, &case.id).await.unwrap();
    assert_eq!(first, LinkOutcome::Linked);
    assert_eq!(second, LinkOutcome::AlreadyLinked);
    assert_eq!(store.list_suite_cases(&smoke.id).await.unwrap(), vec![case.id]);
}

#[tokio::test]
async fn removing_a_non_member_is_a_quiet_no_op() {
    let store = MemoryStore::new();
    let member = case_with_steps(&store, "member", 1).await;
    let outsider = case_with_steps(&store, "outsider", 1).await;
    let smoke = suite(&store, "smoke").await;
    add_case_to_suite(&store, &smoke.id, &member.id).await.unwrap();

    let outcome = remove_case_from_suite(&store, &smoke.id, &outsider.id)
        .await
        .unwrap();
    assert_eq!(outcome, LinkOutcome::NotLinked);
    let reloaded = load_test_suite(&store, &smoke.id).await.unwrap();
    assert_eq!(reloaded.test_cases.len(), 1);
    assert!(reloaded.test_cases.contains(&member.id));
}

#[tokio::test]
async fn removing_a_member_unlinks_it() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "c", 1).await;
    let smoke = suite(&store, "smoke").await;
    add_case_to_suite(&store, &smoke.id, &case.id).await.unwrap();

    let outcome = remove_case_from_suite(&store, &smoke.id, &case.id).await.unwrap();
    assert_eq!(outcome, LinkOutcome::Unlinked);
    assert!(store.list_suite_cases(&smoke.id).await.unwrap().is_empty());
}

// ──────────────────────────────────────
// Step-by-step execution
// ──────────────────────────────────────

#[tokio::test]
async fn three_step_walk_passes_the_case() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "checkout", 3).await;
    let mut seq = Sequencer::for_case(&store, &case.id).await.unwrap();

    seq.start(&store).await.unwrap();
    assert_eq!(seq.cursor(), Some(0));
    assert!(seq.steps().iter().all(|s| s.status == StepStatus::Pending));
    assert_eq!(load_test_case(&store, &case.id).await.unwrap().status, CaseStatus::Pending);

    let ids: Vec<String> = seq.steps().iter().map(|s| s.id.clone()).collect();
    seq.record_step(&store, &ids[0], StepStatus::Passed).await.unwrap();
    assert_eq!(seq.cursor(), Some(1));
    assert_eq!(load_test_case(&store, &case.id).await.unwrap().status, CaseStatus::Pending);

    seq.record_step(&store, &ids[1], StepStatus::Passed).await.unwrap();
    seq.record_step(&store, &ids[2], StepStatus::Passed).await.unwrap();
    assert!(!seq.is_running());

    let stored = load_test_case(&store, &case.id).await.unwrap();
    assert_eq!(stored.status, CaseStatus::Passed);
    assert!(stored.steps.iter().all(|s| s.status == StepStatus::Passed));
}

#[tokio::test]
async fn first_step_failure_fails_the_case_at_once() {
    let store = MemoryStore::new();
    let case = case_with_steps(&store, "search", 3).await;
    let mut seq = Sequencer::for_case(&store, &case.id).await.unwrap();
    seq.start(&store).await.unwrap();

    let first = seq.steps()[0].id.clone();
    seq.record_step(&store, &first, StepStatus::Failed).await.unwrap();
    assert!(!seq.is_running());
    assert_eq!(load_test_case(&store, &case.id).await.unwrap().status, CaseStatus::Failed);
}

#[tokio::test]
async fn quick_fail_marks_everything_failed_for_any_step_count() {
    let store = MemoryStore::new();
    for n in [0, 1, 4] {
        let case = case_with_steps(&store, &format!("case {n}"), n).await;
        let mut seq = Sequencer::for_case(&store, &case.id).await.unwrap();
        seq.quick_complete(&store, StepStatus::Failed).await.unwrap();

        let stored = load_test_case(&store, &case.id).await.unwrap();
        assert_eq!(stored.status, CaseStatus::Failed, "{n} steps");
        assert_eq!(stored.steps.len(), n);
        assert!(stored.steps.iter().all(|s| s.status == StepStatus::Failed));
    }
}

// ──────────────────────────────────────
// Flow run lifecycle
// ──────────────────────────────────────

#[tokio::test]
async fn completed_run_cannot_go_back_in_progress() {
    let store = MemoryStore::new();
    let run = flow_run(&store, "release").await;
    start_flow_run(&store, &run.id).await.unwrap();
    complete_flow_run(&store, &run.id).await.unwrap();

    let err = transition_flow_run(&store, &run.id, FlowRunStatus::InProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn in_progress_and_completed_runs_can_be_archived() {
    let store = MemoryStore::new();

    let running = flow_run(&store, "a").await;
    start_flow_run(&store, &running.id).await.unwrap();
    let archived = archive_flow_run(&store, &running.id).await.unwrap();
    assert_eq!(archived.status, FlowRunStatus::Archived);

    let done = flow_run(&store, "b").await;
    start_flow_run(&store, &done.id).await.unwrap();
    complete_flow_run(&store, &done.id).await.unwrap();
    let archived = archive_flow_run(&store, &done.id).await.unwrap();
    assert_eq!(archived.status, FlowRunStatus::Archived);
}

#[tokio::test]
async fn dates_are_stamped_once() {
    let store = MemoryStore::new();
    let run = flow_run(&store, "dates").await;
    assert!(run.start_date.is_none());

    let started = start_flow_run(&store, &run.id).await.unwrap();
    assert!(started.start_date.is_some());
    assert!(started.end_date.is_none());

    let completed = complete_flow_run(&store, &run.id).await.unwrap();
    assert_eq!(completed.start_date, started.start_date);
    assert!(completed.end_date.is_some());

    let archived = archive_flow_run(&store, &run.id).await.unwrap();
    assert_eq!(archived.start_date, started.start_date);
    assert_eq!(archived.end_date, completed.end_date);
}

#[tokio::test]
async fn archived_is_terminal() {
    let store = MemoryStore::new();
    let run = flow_run(&store, "old").await;
    archive_flow_run(&store, &run.id).await.unwrap();
    for to in [
        FlowRunStatus::Draft,
        FlowRunStatus::InProgress,
        FlowRunStatus::Completed,
        FlowRunStatus::Archived,
    ] {
        assert!(transition_flow_run(&store, &run.id, to).await.is_err());
    }
}

// ──────────────────────────────────────
// Availability
// ──────────────────────────────────────

#[tokio::test]
async fn added_case_is_no_longer_available_for_the_run() {
    let store = MemoryStore::new();
    let a = case_with_steps(&store, "a", 1).await;
    let b = case_with_steps(&store, "b", 2).await;
    let run = flow_run(&store, "r").await;

    add_case_to_flow_run(&store, StepIsolation::CopyOnAdd, &run.id, &a.id)
        .await
        .unwrap();
    let all = vec![a.clone(), b.clone()];
    let available = available_for_flow_run(&store, &run.id, &all).await.unwrap();
    let ids: Vec<&str> = available.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![b.id.as_str()]);
}
