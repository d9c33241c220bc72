use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{
    BatchStatus, CaseStatus, FlowRunCasePatch, FlowRunCaseRecord, FlowRunPatch, FlowRunRecord,
    NewFlowRun, NewFlowRunCase, NewRunStep, NewTestCase, NewTestStep, NewTestSuite,
    RunStepPatch, RunStepRecord, StepUpdate, TestCasePatch, TestCaseRecord, TestStepPatch,
    TestStepRecord, TestSuitePatch, TestSuiteRecord,
};

/// The persistence contract consumed by the caseflow engine.
///
/// A `CaseStore` is a narrow CRUD surface over test cases, their steps,
/// suites, flow runs and the two association tables. It holds no business
/// rules: statuses are written exactly as given, and deriving them is the
/// engine's job.
///
/// ## Association uniqueness
///
/// `insert_suite_case` and `insert_flow_run_case` MUST reject a second row
/// for the same pair with `StoreError::DuplicateLink`. The engine treats that
/// error as success, so it is the authoritative guard against duplicates.
/// Deleting a link that does not exist is not an error.
///
/// ## Batched writes
///
/// `replace_test_steps`, `update_test_steps` and `update_run_steps` apply all
/// of their changes or none of them. The engine relies on this to keep a
/// stored status equal to the rollup of the stored steps.
///
/// ## Cascades
///
/// Deleting a test case removes its steps, its suite links and its flow-run
/// cases. Deleting a suite removes its links. Deleting a flow run removes its
/// flow-run cases, and deleting a flow-run case removes its run steps.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so one store can back
/// several async tasks.
#[async_trait]
pub trait CaseStore: Send + Sync + 'static {
    // ── Test cases ────────────────────────────────────────────────────────────

    async fn create_test_case(&self, case: NewTestCase) -> Result<TestCaseRecord, StoreError>;

    /// Returns `Err(StoreError::NotFound)` if the case does not exist.
    async fn get_test_case(&self, id: &str) -> Result<TestCaseRecord, StoreError>;

    async fn update_test_case(&self, id: &str, patch: TestCasePatch) -> Result<(), StoreError>;

    async fn delete_test_case(&self, id: &str) -> Result<(), StoreError>;

    /// All cases, most recently created first.
    async fn list_test_cases(&self) -> Result<Vec<TestCaseRecord>, StoreError>;

    // ── Test steps ────────────────────────────────────────────────────────────

    /// Append steps to a case, in order. Positions continue after the
    /// highest existing position. New steps are `pending` with an empty
    /// actual result.
    async fn create_test_steps(
        &self,
        test_case_id: &str,
        steps: Vec<NewTestStep>,
    ) -> Result<Vec<TestStepRecord>, StoreError>;

    async fn update_test_step(&self, id: &str, patch: TestStepPatch) -> Result<(), StoreError>;

    async fn delete_test_step(&self, id: &str) -> Result<(), StoreError>;

    /// Steps of one case ordered by position.
    async fn list_test_steps(&self, test_case_id: &str)
        -> Result<Vec<TestStepRecord>, StoreError>;

    /// Replace every step of a case with `steps` (positions restart at 0)
    /// and set the case status, as one write.
    async fn replace_test_steps(
        &self,
        test_case_id: &str,
        steps: Vec<NewTestStep>,
        status: CaseStatus,
    ) -> Result<Vec<TestStepRecord>, StoreError>;

    /// Apply `updates` to steps of one case together with the status writes
    /// in `status`, as one write. A step id that does not belong to the case
    /// fails the whole batch with `StoreError::NotFound`.
    async fn update_test_steps(
        &self,
        test_case_id: &str,
        updates: Vec<StepUpdate>,
        status: BatchStatus,
    ) -> Result<(), StoreError>;

    // ── Suites ────────────────────────────────────────────────────────────────

    async fn create_test_suite(&self, suite: NewTestSuite)
        -> Result<TestSuiteRecord, StoreError>;

    async fn get_test_suite(&self, id: &str) -> Result<TestSuiteRecord, StoreError>;

    async fn update_test_suite(&self, id: &str, patch: TestSuitePatch) -> Result<(), StoreError>;

    async fn delete_test_suite(&self, id: &str) -> Result<(), StoreError>;

    async fn list_test_suites(&self) -> Result<Vec<TestSuiteRecord>, StoreError>;

    // ── Suite ↔ case links ────────────────────────────────────────────────────

    /// Returns `Err(StoreError::DuplicateLink)` if the pair is already linked.
    async fn insert_suite_case(&self, suite_id: &str, test_case_id: &str)
        -> Result<(), StoreError>;

    async fn delete_suite_case(&self, suite_id: &str, test_case_id: &str)
        -> Result<(), StoreError>;

    /// Ids of the cases linked to a suite, in link order.
    async fn list_suite_cases(&self, suite_id: &str) -> Result<Vec<String>, StoreError>;

    // ── Flow runs ─────────────────────────────────────────────────────────────

    async fn create_flow_run(&self, run: NewFlowRun) -> Result<FlowRunRecord, StoreError>;

    async fn get_flow_run(&self, id: &str) -> Result<FlowRunRecord, StoreError>;

    async fn update_flow_run(&self, id: &str, patch: FlowRunPatch) -> Result<(), StoreError>;

    async fn delete_flow_run(&self, id: &str) -> Result<(), StoreError>;

    async fn list_flow_runs(&self) -> Result<Vec<FlowRunRecord>, StoreError>;

    // ── Flow run ↔ case execution records ─────────────────────────────────────

    /// Returns `Err(StoreError::DuplicateLink)` if the pair already has a row.
    async fn insert_flow_run_case(
        &self,
        record: NewFlowRunCase,
    ) -> Result<FlowRunCaseRecord, StoreError>;

    /// Returns `Err(StoreError::NotFound)` if the pair has no row.
    async fn get_flow_run_case(
        &self,
        flow_run_id: &str,
        test_case_id: &str,
    ) -> Result<FlowRunCaseRecord, StoreError>;

    async fn update_flow_run_case(
        &self,
        id: &str,
        patch: FlowRunCasePatch,
    ) -> Result<(), StoreError>;

    async fn delete_flow_run_case(&self, id: &str) -> Result<(), StoreError>;

    async fn list_flow_run_cases(
        &self,
        flow_run_id: &str,
    ) -> Result<Vec<FlowRunCaseRecord>, StoreError>;

    // ── Run-scoped step copies ────────────────────────────────────────────────

    async fn create_run_steps(
        &self,
        flow_run_case_id: &str,
        steps: Vec<NewRunStep>,
    ) -> Result<Vec<RunStepRecord>, StoreError>;

    async fn update_run_step(&self, id: &str, patch: RunStepPatch) -> Result<(), StoreError>;

    /// Apply `updates` to run steps of one flow-run case and optionally set
    /// its status, as one write. Same all-or-nothing rule as
    /// `update_test_steps`.
    async fn update_run_steps(
        &self,
        flow_run_case_id: &str,
        updates: Vec<StepUpdate>,
        status: Option<CaseStatus>,
    ) -> Result<(), StoreError>;

    /// Run steps of one flow-run case ordered by position.
    async fn list_run_steps(
        &self,
        flow_run_case_id: &str,
    ) -> Result<Vec<RunStepRecord>, StoreError>;
}
