#![allow(dead_code)]

use caseflow_engine::authoring::{self, CaseDraft, FlowRunDraft, StepDraft, SuiteDraft};
use caseflow_engine::{FlowRun, TestCase, TestSuite};
use caseflow_storage::MemoryStore;

pub async fn case_with_steps(store: &MemoryStore, title: &str, n: usize) -> TestCase {
    let steps = (0..n)
        .map(|i| StepDraft {
            description: format!("{title} step {i}"),
            expected_result: format!("{title} result {i}"),
        })
        .collect();
    authoring::create_test_case(
        store,
        CaseDraft {
            title: title.to_string(),
            steps,
            ..CaseDraft::default()
        },
    )
    .await
    .unwrap()
}

pub async fn suite(store: &MemoryStore, name: &str) -> TestSuite {
    authoring::create_test_suite(
        store,
        SuiteDraft {
            name: name.to_string(),
            ..SuiteDraft::default()
        },
    )
    .await
    .unwrap()
}

pub async fn flow_run(store: &MemoryStore, title: &str) -> FlowRun {
    authoring::create_flow_run(
        store,
        FlowRunDraft {
            title: title.to_string(),
            ..FlowRunDraft::default()
        },
    )
    .await
    .unwrap()
}
