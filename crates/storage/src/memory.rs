//! In-memory `CaseStore` backend.
//!
//! All tables live behind one mutex, so every call is trivially atomic.
//! The whole store serializes to a single JSON document, which is how the
//! CLI persists state between invocations.
//!
//! For tests, the store can simulate an unreachable backend: see
//! [`MemoryStore::set_unavailable`], [`MemoryStore::fail_next`] and
//! [`MemoryStore::fail_after`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::record::{
    now_rfc3339, BatchStatus, CaseStatus, FlowRunCasePatch, FlowRunCaseRecord, FlowRunPatch,
    FlowRunRecord, NewFlowRun, NewFlowRunCase, NewRunStep, NewTestCase, NewTestStep,
    NewTestSuite, RunStepPatch, RunStepRecord, StepStatus, StepUpdate, TestCasePatch,
    TestCaseRecord, TestStepPatch, TestStepRecord, TestSuitePatch, TestSuiteRecord,
};
use crate::traits::CaseStore;

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct MemoryInner {
    test_cases: Vec<TestCaseRecord>,
    test_steps: Vec<TestStepRecord>,
    test_suites: Vec<TestSuiteRecord>,
    suite_cases: Vec<SuiteCaseLink>,
    flow_runs: Vec<FlowRunRecord>,
    flow_run_cases: Vec<FlowRunCaseRecord>,
    run_steps: Vec<RunStepRecord>,
    next_case_number: u64,
    next_suite_number: u64,
    #[serde(skip)]
    faults: Faults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SuiteCaseLink {
    suite_id: String,
    test_case_id: String,
    created_at: String,
}

#[derive(Default)]
struct Faults {
    unavailable: bool,
    skip: usize,
    fail_next: usize,
    calls: usize,
}

impl Faults {
    fn check(&mut self) -> Result<(), StoreError> {
        self.calls += 1;
        if self.unavailable {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        if self.fail_next > 0 {
            if self.skip > 0 {
                self.skip -= 1;
                return Ok(());
            }
            self.fail_next -= 1;
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn new_step_records(
    test_case_id: &str,
    first_position: u32,
    steps: Vec<NewTestStep>,
    now: &str,
) -> Vec<TestStepRecord> {
    steps
        .into_iter()
        .zip(first_position..)
        .map(|(step, position)| TestStepRecord {
            id: new_id(),
            test_case_id: test_case_id.to_string(),
            position,
            description: step.description,
            expected_result: step.expected_result,
            actual_result: String::new(),
            status: StepStatus::Pending,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        })
        .collect()
}

fn apply_update(
    update: StepUpdate,
    status: &mut StepStatus,
    actual_result: &mut String,
    updated_at: &mut String,
    now: &str,
) {
    if let Some(new_status) = update.status {
        *status = new_status;
    }
    if let Some(actual) = update.actual_result {
        *actual_result = actual;
    }
    *updated_at = now.to_string();
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON file. A missing file yields an empty store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(StoreError::Backend(format!(
                    "could not read '{}': {}",
                    path.display(),
                    e
                )))
            }
        };
        let inner: MemoryInner = serde_json::from_str(&content).map_err(|e| {
            StoreError::Backend(format!("could not parse '{}': {}", path.display(), e))
        })?;
        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Write the full store to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = {
            let inner = self.lock()?;
            serde_json::to_string_pretty(&*inner)
                .map_err(|e| StoreError::Backend(format!("could not serialize store: {}", e)))?
        };
        std::fs::write(path, json).map_err(|e| {
            StoreError::Backend(format!("could not write '{}': {}", path.display(), e))
        })
    }

    /// While set, every call fails with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults.unavailable = unavailable;
        }
    }

    /// Fail the next `n` calls with `StoreError::Unavailable`.
    pub fn fail_next(&self, n: usize) {
        self.fail_after(0, n);
    }

    /// Let `skip` calls through, then fail the `n` after them.
    pub fn fail_after(&self, skip: usize, n: usize) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults.skip = skip;
            inner.faults.fail_next = n;
        }
    }

    /// Number of trait calls made against this store, failed ones included.
    pub fn call_count(&self) -> usize {
        self.inner.lock().map(|i| i.faults.calls).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    /// Lock the tables for one trait call, applying injected faults.
    fn access(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        let mut inner = self.lock()?;
        inner.faults.check()?;
        Ok(inner)
    }
}

#[async_trait]
impl CaseStore for MemoryStore {
    // ── Test cases ────────────────────────────────────────────────────────────

    async fn create_test_case(&self, case: NewTestCase) -> Result<TestCaseRecord, StoreError> {
        let mut inner = self.access()?;
        inner.next_case_number += 1;
        let now = now_rfc3339();
        let record = TestCaseRecord {
            id: new_id(),
            display_id: format!("TC-{}", inner.next_case_number),
            title: case.title,
            description: case.description,
            priority: case.priority,
            status: case.status,
            labels: case.labels,
            assignee: case.assignee,
            created_at: now.clone(),
            updated_at: now,
        };
        inner.test_cases.push(record.clone());
        Ok(record)
    }

    async fn get_test_case(&self, id: &str) -> Result<TestCaseRecord, StoreError> {
        let inner = self.access()?;
        inner
            .test_cases
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("test case", id))
    }

    async fn update_test_case(&self, id: &str, patch: TestCasePatch) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        let case = inner
            .test_cases
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("test case", id))?;
        if let Some(title) = patch.title {
            case.title = title;
        }
        if let Some(description) = patch.description {
            case.description = description;
        }
        if let Some(priority) = patch.priority {
            case.priority = priority;
        }
        if let Some(status) = patch.status {
            case.status = status;
        }
        if let Some(labels) = patch.labels {
            case.labels = labels;
        }
        if let Some(assignee) = patch.assignee {
            case.assignee = assignee;
        }
        case.updated_at = now_rfc3339();
        Ok(())
    }

    async fn delete_test_case(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        let before = inner.test_cases.len();
        inner.test_cases.retain(|c| c.id != id);
        if inner.test_cases.len() == before {
            return Err(StoreError::not_found("test case", id));
        }
        inner.test_steps.retain(|s| s.test_case_id != id);
        inner.suite_cases.retain(|l| l.test_case_id != id);
        let removed: Vec<String> = inner
            .flow_run_cases
            .iter()
            .filter(|r| r.test_case_id == id)
            .map(|r| r.id.clone())
            .collect();
        inner.flow_run_cases.retain(|r| r.test_case_id != id);
        inner
            .run_steps
            .retain(|s| !removed.contains(&s.flow_run_case_id));
        Ok(())
    }

    async fn list_test_cases(&self) -> Result<Vec<TestCaseRecord>, StoreError> {
        let inner = self.access()?;
        Ok(inner.test_cases.iter().rev().cloned().collect())
    }

    // ── Test steps ────────────────────────────────────────────────────────────

    async fn create_test_steps(
        &self,
        test_case_id: &str,
        steps: Vec<NewTestStep>,
    ) -> Result<Vec<TestStepRecord>, StoreError> {
        let mut inner = self.access()?;
        if !inner.test_cases.iter().any(|c| c.id == test_case_id) {
            return Err(StoreError::not_found("test case", test_case_id));
        }
        let position = inner
            .test_steps
            .iter()
            .filter(|s| s.test_case_id == test_case_id)
            .map(|s| s.position + 1)
            .max()
            .unwrap_or(0);
        let created = new_step_records(test_case_id, position, steps, &now_rfc3339());
        inner.test_steps.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_test_step(&self, id: &str, patch: TestStepPatch) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        let step = inner
            .test_steps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("test step", id))?;
        if let Some(description) = patch.description {
            step.description = description;
        }
        if let Some(expected) = patch.expected_result {
            step.expected_result = expected;
        }
        if let Some(actual) = patch.actual_result {
            step.actual_result = actual;
        }
        if let Some(status) = patch.status {
            step.status = status;
        }
        step.updated_at = now_rfc3339();
        Ok(())
    }

    async fn delete_test_step(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        let before = inner.test_steps.len();
        inner.test_steps.retain(|s| s.id != id);
        if inner.test_steps.len() == before {
            return Err(StoreError::not_found("test step", id));
        }
        Ok(())
    }

    async fn list_test_steps(
        &self,
        test_case_id: &str,
    ) -> Result<Vec<TestStepRecord>, StoreError> {
        let inner = self.access()?;
        let mut steps: Vec<TestStepRecord> = inner
            .test_steps
            .iter()
            .filter(|s| s.test_case_id == test_case_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.position);
        Ok(steps)
    }

    async fn replace_test_steps(
        &self,
        test_case_id: &str,
        steps: Vec<NewTestStep>,
        status: CaseStatus,
    ) -> Result<Vec<TestStepRecord>, StoreError> {
        let mut inner = self.access()?;
        let now = now_rfc3339();
        let case = inner
            .test_cases
            .iter_mut()
            .find(|c| c.id == test_case_id)
            .ok_or_else(|| StoreError::not_found("test case", test_case_id))?;
        case.status = status;
        case.updated_at = now.clone();
        inner.test_steps.retain(|s| s.test_case_id != test_case_id);
        let created = new_step_records(test_case_id, 0, steps, &now);
        inner.test_steps.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_test_steps(
        &self,
        test_case_id: &str,
        updates: Vec<StepUpdate>,
        status: BatchStatus,
    ) -> Result<(), StoreError> {
        let mut guard = self.access()?;
        let inner = &mut *guard;

        // Validate everything before touching anything.
        if !inner.test_cases.iter().any(|c| c.id == test_case_id) {
            return Err(StoreError::not_found("test case", test_case_id));
        }
        for update in &updates {
            if !inner
                .test_steps
                .iter()
                .any(|s| s.id == update.step_id && s.test_case_id == test_case_id)
            {
                return Err(StoreError::not_found("test step", &update.step_id));
            }
        }
        if let Some((run_case_id, _)) = &status.flow_run_case {
            if !inner.flow_run_cases.iter().any(|r| &r.id == run_case_id) {
                return Err(StoreError::not_found("flow run case", run_case_id));
            }
        }

        let now = now_rfc3339();
        for update in updates {
            if let Some(step) = inner.test_steps.iter_mut().find(|s| s.id == update.step_id) {
                apply_update(
                    update,
                    &mut step.status,
                    &mut step.actual_result,
                    &mut step.updated_at,
                    &now,
                );
            }
        }
        if let Some(case_status) = status.test_case {
            if let Some(case) = inner.test_cases.iter_mut().find(|c| c.id == test_case_id) {
                case.status = case_status;
                case.updated_at = now.clone();
            }
        }
        if let Some((run_case_id, run_status)) = status.flow_run_case {
            if let Some(record) = inner.flow_run_cases.iter_mut().find(|r| r.id == run_case_id) {
                record.status = run_status;
                record.updated_at = now;
            }
        }
        Ok(())
    }

    // ── Suites ────────────────────────────────────────────────────────────────

    async fn create_test_suite(
        &self,
        suite: NewTestSuite,
    ) -> Result<TestSuiteRecord, StoreError> {
        let mut inner = self.access()?;
        inner.next_suite_number += 1;
        let now = now_rfc3339();
        let record = TestSuiteRecord {
            id: new_id(),
            display_id: format!("TS-{}", inner.next_suite_number),
            name: suite.name,
            labels: suite.labels,
            assignee: suite.assignee,
            created_at: now.clone(),
            updated_at: now,
        };
        inner.test_suites.push(record.clone());
        Ok(record)
    }

    async fn get_test_suite(&self, id: &str) -> Result<TestSuiteRecord, StoreError> {
        let inner = self.access()?;
        inner
            .test_suites
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("test suite", id))
    }

    async fn update_test_suite(&self, id: &str, patch: TestSuitePatch) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        let suite = inner
            .test_suites
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("test suite", id))?;
        if let Some(name) = patch.name {
            suite.name = name;
        }
        if let Some(labels) = patch.labels {
            suite.labels = labels;
        }
        if let Some(assignee) = patch.assignee {
            suite.assignee = assignee;
        }
        suite.updated_at = now_rfc3339();
        Ok(())
    }

    async fn delete_test_suite(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        let before = inner.test_suites.len();
        inner.test_suites.retain(|s| s.id != id);
        if inner.test_suites.len() == before {
            return Err(StoreError::not_found("test suite", id));
        }
        inner.suite_cases.retain(|l| l.suite_id != id);
        Ok(())
    }

    async fn list_test_suites(&self) -> Result<Vec<TestSuiteRecord>, StoreError> {
        let inner = self.access()?;
        Ok(inner.test_suites.iter().rev().cloned().collect())
    }

    // ── Suite ↔ case links ────────────────────────────────────────────────────

    async fn insert_suite_case(
        &self,
        suite_id: &str,
        test_case_id: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        if !inner.test_suites.iter().any(|s| s.id == suite_id) {
            return Err(StoreError::not_found("test suite", suite_id));
        }
        if !inner.test_cases.iter().any(|c| c.id == test_case_id) {
            return Err(StoreError::not_found("test case", test_case_id));
        }
        if inner
            .suite_cases
            .iter()
            .any(|l| l.suite_id == suite_id && l.test_case_id == test_case_id)
        {
            return Err(StoreError::duplicate(suite_id, test_case_id));
        }
        inner.suite_cases.push(SuiteCaseLink {
            suite_id: suite_id.to_string(),
            test_case_id: test_case_id.to_string(),
            created_at: now_rfc3339(),
        });
        Ok(())
    }

    async fn delete_suite_case(
        &self,
        suite_id: &str,
        test_case_id: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        inner
            .suite_cases
            .retain(|l| !(l.suite_id == suite_id && l.test_case_id == test_case_id));
        Ok(())
    }

    async fn list_suite_cases(&self, suite_id: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.access()?;
        Ok(inner
            .suite_cases
            .iter()
            .filter(|l| l.suite_id == suite_id)
            .map(|l| l.test_case_id.clone())
            .collect())
    }

    // ── Flow runs ─────────────────────────────────────────────────────────────

    async fn create_flow_run(&self, run: NewFlowRun) -> Result<FlowRunRecord, StoreError> {
        let mut inner = self.access()?;
        let now = now_rfc3339();
        let record = FlowRunRecord {
            id: new_id(),
            title: run.title,
            description: run.description,
            status: run.status,
            start_date: run.start_date,
            end_date: run.end_date,
            labels: run.labels,
            assignee: run.assignee,
            created_at: now.clone(),
            updated_at: now,
        };
        inner.flow_runs.push(record.clone());
        Ok(record)
    }

    async fn get_flow_run(&self, id: &str) -> Result<FlowRunRecord, StoreError> {
        let inner = self.access()?;
        inner
            .flow_runs
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("flow run", id))
    }

    async fn update_flow_run(&self, id: &str, patch: FlowRunPatch) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        let run = inner
            .flow_runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::not_found("flow run", id))?;
        if let Some(title) = patch.title {
            run.title = title;
        }
        if let Some(description) = patch.description {
            run.description = description;
        }
        if let Some(status) = patch.status {
            run.status = status;
        }
        if let Some(start_date) = patch.start_date {
            run.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            run.end_date = end_date;
        }
        if let Some(labels) = patch.labels {
            run.labels = labels;
        }
        if let Some(assignee) = patch.assignee {
            run.assignee = assignee;
        }
        run.updated_at = now_rfc3339();
        Ok(())
    }

    async fn delete_flow_run(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        let before = inner.flow_runs.len();
        inner.flow_runs.retain(|r| r.id != id);
        if inner.flow_runs.len() == before {
            return Err(StoreError::not_found("flow run", id));
        }
        let removed: Vec<String> = inner
            .flow_run_cases
            .iter()
            .filter(|r| r.flow_run_id == id)
            .map(|r| r.id.clone())
            .collect();
        inner.flow_run_cases.retain(|r| r.flow_run_id != id);
        inner
            .run_steps
            .retain(|s| !removed.contains(&s.flow_run_case_id));
        Ok(())
    }

    async fn list_flow_runs(&self) -> Result<Vec<FlowRunRecord>, StoreError> {
        let inner = self.access()?;
        Ok(inner.flow_runs.iter().rev().cloned().collect())
    }

    // ── Flow run ↔ case execution records ─────────────────────────────────────

    async fn insert_flow_run_case(
        &self,
        record: NewFlowRunCase,
    ) -> Result<FlowRunCaseRecord, StoreError> {
        let mut inner = self.access()?;
        if !inner.flow_runs.iter().any(|r| r.id == record.flow_run_id) {
            return Err(StoreError::not_found("flow run", &record.flow_run_id));
        }
        if !inner.test_cases.iter().any(|c| c.id == record.test_case_id) {
            return Err(StoreError::not_found("test case", &record.test_case_id));
        }
        if inner.flow_run_cases.iter().any(|r| {
            r.flow_run_id == record.flow_run_id && r.test_case_id == record.test_case_id
        }) {
            return Err(StoreError::duplicate(
                &record.flow_run_id,
                &record.test_case_id,
            ));
        }
        let now = now_rfc3339();
        let created = FlowRunCaseRecord {
            id: new_id(),
            flow_run_id: record.flow_run_id,
            test_case_id: record.test_case_id,
            isolation: record.isolation,
            status: record.status,
            notes: String::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        inner.flow_run_cases.push(created.clone());
        Ok(created)
    }

    async fn get_flow_run_case(
        &self,
        flow_run_id: &str,
        test_case_id: &str,
    ) -> Result<FlowRunCaseRecord, StoreError> {
        let inner = self.access()?;
        inner
            .flow_run_cases
            .iter()
            .find(|r| r.flow_run_id == flow_run_id && r.test_case_id == test_case_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::not_found("flow run case", &format!("{flow_run_id}/{test_case_id}"))
            })
    }

    async fn update_flow_run_case(
        &self,
        id: &str,
        patch: FlowRunCasePatch,
    ) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        let record = inner
            .flow_run_cases
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::not_found("flow run case", id))?;
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(notes) = patch.notes {
            record.notes = notes;
        }
        record.updated_at = now_rfc3339();
        Ok(())
    }

    async fn delete_flow_run_case(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        let before = inner.flow_run_cases.len();
        inner.flow_run_cases.retain(|r| r.id != id);
        if inner.flow_run_cases.len() == before {
            return Err(StoreError::not_found("flow run case", id));
        }
        inner.run_steps.retain(|s| s.flow_run_case_id != id);
        Ok(())
    }

    async fn list_flow_run_cases(
        &self,
        flow_run_id: &str,
    ) -> Result<Vec<FlowRunCaseRecord>, StoreError> {
        let inner = self.access()?;
        Ok(inner
            .flow_run_cases
            .iter()
            .filter(|r| r.flow_run_id == flow_run_id)
            .cloned()
            .collect())
    }

    // ── Run-scoped step copies ────────────────────────────────────────────────

    async fn create_run_steps(
        &self,
        flow_run_case_id: &str,
        steps: Vec<NewRunStep>,
    ) -> Result<Vec<RunStepRecord>, StoreError> {
        let mut inner = self.access()?;
        if !inner.flow_run_cases.iter().any(|r| r.id == flow_run_case_id) {
            return Err(StoreError::not_found("flow run case", flow_run_case_id));
        }
        let mut position = inner
            .run_steps
            .iter()
            .filter(|s| s.flow_run_case_id == flow_run_case_id)
            .map(|s| s.position + 1)
            .max()
            .unwrap_or(0);
        let now = now_rfc3339();
        let mut created = Vec::with_capacity(steps.len());
        for step in steps {
            created.push(RunStepRecord {
                id: new_id(),
                flow_run_case_id: flow_run_case_id.to_string(),
                source_step_id: step.source_step_id,
                position,
                description: step.description,
                expected_result: step.expected_result,
                actual_result: step.actual_result,
                status: step.status,
                created_at: now.clone(),
                updated_at: now.clone(),
            });
            position += 1;
        }
        inner.run_steps.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_run_step(&self, id: &str, patch: RunStepPatch) -> Result<(), StoreError> {
        let mut inner = self.access()?;
        let step = inner
            .run_steps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("run step", id))?;
        if let Some(actual) = patch.actual_result {
            step.actual_result = actual;
        }
        if let Some(status) = patch.status {
            step.status = status;
        }
        step.updated_at = now_rfc3339();
        Ok(())
    }

    async fn update_run_steps(
        &self,
        flow_run_case_id: &str,
        updates: Vec<StepUpdate>,
        status: Option<CaseStatus>,
    ) -> Result<(), StoreError> {
        let mut guard = self.access()?;
        let inner = &mut *guard;

        if !inner.flow_run_cases.iter().any(|r| r.id == flow_run_case_id) {
            return Err(StoreError::not_found("flow run case", flow_run_case_id));
        }
        for update in &updates {
            if !inner
                .run_steps
                .iter()
                .any(|s| s.id == update.step_id && s.flow_run_case_id == flow_run_case_id)
            {
                return Err(StoreError::not_found("run step", &update.step_id));
            }
        }

        let now = now_rfc3339();
        for update in updates {
            if let Some(step) = inner.run_steps.iter_mut().find(|s| s.id == update.step_id) {
                apply_update(
                    update,
                    &mut step.status,
                    &mut step.actual_result,
                    &mut step.updated_at,
                    &now,
                );
            }
        }
        if let Some(run_status) = status {
            if let Some(record) = inner
                .flow_run_cases
                .iter_mut()
                .find(|r| r.id == flow_run_case_id)
            {
                record.status = run_status;
                record.updated_at = now;
            }
        }
        Ok(())
    }

    async fn list_run_steps(
        &self,
        flow_run_case_id: &str,
    ) -> Result<Vec<RunStepRecord>, StoreError> {
        let inner = self.access()?;
        let mut steps: Vec<RunStepRecord> = inner
            .run_steps
            .iter()
            .filter(|s| s.flow_run_case_id == flow_run_case_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.position);
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CaseStatus;

    fn new_case(title: &str) -> NewTestCase {
        NewTestCase {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn display_ids_are_sequential() {
        let store = MemoryStore::new();
        let a = store.create_test_case(new_case("a")).await.unwrap();
        let b = store.create_test_case(new_case("b")).await.unwrap();
        assert_eq!(a.display_id, "TC-1");
        assert_eq!(b.display_id, "TC-2");
        let suite = store
            .create_test_suite(NewTestSuite {
                name: "smoke".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(suite.display_id, "TS-1");
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let store = MemoryStore::new();
        store.fail_next(2);
        assert!(matches!(
            store.list_test_cases().await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.list_test_cases().await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.list_test_cases().await.is_ok());
        assert_eq!(store.call_count(), 3);
    }

    #[tokio::test]
    async fn fail_after_lets_earlier_calls_through() {
        let store = MemoryStore::new();
        store.fail_after(1, 1);
        assert!(store.list_test_cases().await.is_ok());
        assert!(store.list_test_cases().await.is_err());
        assert!(store.list_test_cases().await.is_ok());
    }

    #[tokio::test]
    async fn unavailable_flag_blocks_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.create_test_case(new_case("x")).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.create_test_case(new_case("x")).await.is_ok());
    }

    #[tokio::test]
    async fn save_and_open_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = MemoryStore::new();
        let case = store
            .create_test_case(NewTestCase {
                title: "login".to_string(),
                status: CaseStatus::Passed,
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .create_test_steps(
                &case.id,
                vec![NewTestStep {
                    description: "open page".to_string(),
                    expected_result: "form shown".to_string(),
                }],
            )
            .await
            .unwrap();
        store.save(&path).unwrap();

        let reopened = MemoryStore::open(&path).unwrap();
        let loaded = reopened.get_test_case(&case.id).await.unwrap();
        assert_eq!(loaded, case);
        assert_eq!(reopened.list_test_steps(&case.id).await.unwrap().len(), 1);

        // Counters survive, so the next display id does not collide.
        let next = reopened.create_test_case(new_case("next")).await.unwrap();
        assert_eq!(next.display_id, "TC-2");
    }

    #[test]
    fn open_missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&dir.path().join("absent.json")).unwrap();
        assert_eq!(store.call_count(), 0);
    }

    #[test]
    fn open_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MemoryStore::open(&path),
            Err(StoreError::Backend(_))
        ));
    }
}
