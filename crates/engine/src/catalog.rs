//! A caller-owned snapshot of everything in the store.
//!
//! The engine keeps no global state; front ends that want a cached view load
//! a [`Catalog`], update it from operation results, and hand engine errors to
//! [`Catalog::absorb`] so that entities the store no longer has drop out.

use std::collections::BTreeMap;

use tracing::debug;

use caseflow_storage::CaseStore;

use crate::adapter::{load_flow_runs, load_test_cases, load_test_suites};
use crate::error::EngineError;
use crate::types::{FlowRun, TestCase, TestSuite};

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    cases: BTreeMap<String, TestCase>,
    suites: BTreeMap<String, TestSuite>,
    flow_runs: BTreeMap<String, FlowRun>,
}

impl Catalog {
    pub async fn load<S: CaseStore>(store: &S) -> Result<Self, EngineError> {
        let mut catalog = Catalog::default();
        for case in load_test_cases(store).await? {
            catalog.upsert_case(case);
        }
        for suite in load_test_suites(store).await? {
            catalog.upsert_suite(suite);
        }
        for run in load_flow_runs(store).await? {
            catalog.upsert_flow_run(run);
        }
        debug!(
            cases = catalog.cases.len(),
            suites = catalog.suites.len(),
            flow_runs = catalog.flow_runs.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn case(&self, id: &str) -> Option<&TestCase> {
        self.cases.get(id)
    }

    pub fn suite(&self, id: &str) -> Option<&TestSuite> {
        self.suites.get(id)
    }

    pub fn flow_run(&self, id: &str) -> Option<&FlowRun> {
        self.flow_runs.get(id)
    }

    /// Every cached case, newest first.
    pub fn all_cases(&self) -> Vec<TestCase> {
        let mut cases: Vec<TestCase> = self.cases.values().cloned().collect();
        cases.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.display_id.cmp(&a.display_id)));
        cases
    }

    pub fn upsert_case(&mut self, case: TestCase) {
        self.cases.insert(case.id.clone(), case);
    }

    pub fn upsert_suite(&mut self, suite: TestSuite) {
        self.suites.insert(suite.id.clone(), suite);
    }

    pub fn upsert_flow_run(&mut self, run: FlowRun) {
        self.flow_runs.insert(run.id.clone(), run);
    }

    /// Forget a case and its suite memberships.
    pub fn remove_case(&mut self, id: &str) {
        self.cases.remove(id);
        for suite in self.suites.values_mut() {
            suite.test_cases.remove(id);
        }
    }

    /// React to a failed operation. A `NotFound` evicts the missing entity;
    /// returns whether anything was evicted.
    pub fn absorb(&mut self, err: &EngineError) -> bool {
        let EngineError::NotFound { entity, id } = err else {
            return false;
        };
        let evicted = match *entity {
            "test case" => {
                let known = self.cases.contains_key(id);
                self.remove_case(id);
                known
            }
            "test suite" => self.suites.remove(id).is_some(),
            "flow run" => self.flow_runs.remove(id).is_some(),
            "test step" => {
                let mut found = false;
                for case in self.cases.values_mut() {
                    let before = case.steps.len();
                    case.steps.retain(|s| s.id != *id);
                    found |= case.steps.len() != before;
                }
                found
            }
            _ => false,
        };
        if evicted {
            debug!(entity = *entity, id = %id, "evicted stale entity from catalog");
        }
        evicted
    }
}
