//! Domain values the engine works on.
//!
//! These are assembled from store records by [`crate::adapter`]. They are
//! plain snapshots: changing one never writes anything back.

use std::collections::BTreeSet;

use serde::Serialize;

use caseflow_storage::{FlowRunCaseRecord, FlowRunRecord, RunStepRecord, TestCaseRecord, TestStepRecord};

pub use caseflow_storage::{CaseStatus, FlowRunStatus, Priority, StepIsolation, StepStatus};

// ──────────────────────────────────────────────
// Steps and cases
// ──────────────────────────────────────────────

/// One step of a test case, or of a run-scoped copy of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestStep {
    pub id: String,
    pub description: String,
    pub expected_result: String,
    pub actual_result: String,
    pub status: StepStatus,
}

impl TestStep {
    /// A copy of this step as it looks before anyone has executed it.
    pub fn reset(&self) -> TestStep {
        TestStep {
            actual_result: String::new(),
            status: StepStatus::Pending,
            ..self.clone()
        }
    }
}

impl From<TestStepRecord> for TestStep {
    fn from(r: TestStepRecord) -> Self {
        TestStep {
            id: r.id,
            description: r.description,
            expected_result: r.expected_result,
            actual_result: r.actual_result,
            status: r.status,
        }
    }
}

impl From<RunStepRecord> for TestStep {
    fn from(r: RunStepRecord) -> Self {
        TestStep {
            id: r.id,
            description: r.description,
            expected_result: r.expected_result,
            actual_result: r.actual_result,
            status: r.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub id: String,
    pub display_id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    /// Stored status. Outside an execution this equals the rollup of `steps`.
    pub status: CaseStatus,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    /// Ordered by position.
    pub steps: Vec<TestStep>,
    pub created_at: String,
    pub updated_at: String,
}

impl TestCase {
    pub fn from_records(record: TestCaseRecord, steps: Vec<TestStepRecord>) -> Self {
        TestCase {
            id: record.id,
            display_id: record.display_id,
            title: record.title,
            description: record.description,
            priority: record.priority,
            status: record.status,
            labels: record.labels,
            assignee: record.assignee,
            steps: steps.into_iter().map(TestStep::from).collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

// ──────────────────────────────────────────────
// Suites
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestSuite {
    pub id: String,
    pub display_id: String,
    pub name: String,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    /// Ids of member cases. Membership is a set; order carries no meaning.
    pub test_cases: BTreeSet<String>,
    pub created_at: String,
    pub updated_at: String,
}

// ──────────────────────────────────────────────
// Flow runs
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowRun {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: FlowRunStatus,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<FlowRunRecord> for FlowRun {
    fn from(r: FlowRunRecord) -> Self {
        FlowRun {
            id: r.id,
            title: r.title,
            description: r.description,
            status: r.status,
            start_date: r.start_date,
            end_date: r.end_date,
            labels: r.labels,
            assignee: r.assignee,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// A test case's execution record inside one flow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowRunTestCase {
    pub id: String,
    pub flow_run_id: String,
    pub test_case_id: String,
    /// Fixed when the case joined the run.
    pub isolation: StepIsolation,
    /// Run-local status, independent of the case's global status.
    pub status: CaseStatus,
    pub notes: String,
    /// The steps this run executes: its own copies, or the canonical steps
    /// when the run shares them.
    pub steps: Vec<TestStep>,
    pub created_at: String,
    pub updated_at: String,
}

impl FlowRunTestCase {
    pub fn from_records(record: FlowRunCaseRecord, steps: Vec<TestStep>) -> Self {
        FlowRunTestCase {
            id: record.id,
            flow_run_id: record.flow_run_id,
            test_case_id: record.test_case_id,
            isolation: record.isolation,
            status: record.status,
            notes: record.notes,
            steps,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
