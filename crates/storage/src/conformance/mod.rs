//! Conformance test suite for `CaseStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `CaseStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Cases**: creation defaults, partial updates, ordering, cascading deletes
//! - **Links**: duplicate suite/flow-run associations rejected, idempotent removal
//! - **Runs**: flow run updates, flow-run cases and their run-scoped steps
//! - **Batches**: step replacement and batched step writes are all-or-nothing
//! - **Error handling**: correct error variants for missing records
//! - **Concurrency**: racing inserts of the same association leave one row
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use caseflow_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn sqlite_conformance() {
//!     let report = run_conformance_suite(|| async { create_test_sqlite_store().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod batch;
mod cases;
mod concurrent;
mod error;
mod links;
mod runs;

use std::fmt;
use std::future::Future;

use crate::record::{NewFlowRun, NewTestCase, NewTestStep, NewTestSuite};
use crate::CaseStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "cases", "links", "runs").
    pub category: String,
    /// Test name (e.g. "duplicate_suite_link_rejected").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: CaseStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(cases::run_case_tests(&factory).await);
    results.extend(links::run_link_tests(&factory).await);
    results.extend(runs::run_run_tests(&factory).await);
    results.extend(batch::run_batch_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_case(title: &str) -> NewTestCase {
    NewTestCase {
        title: title.to_string(),
        description: format!("{title} description"),
        labels: vec!["smoke".to_string()],
        ..Default::default()
    }
}

fn make_steps(n: usize) -> Vec<NewTestStep> {
    (0..n)
        .map(|i| NewTestStep {
            description: format!("step {i}"),
            expected_result: format!("result {i}"),
        })
        .collect()
}

fn make_suite(name: &str) -> NewTestSuite {
    NewTestSuite {
        name: name.to_string(),
        ..Default::default()
    }
}

fn make_flow_run(title: &str) -> NewFlowRun {
    NewFlowRun {
        title: title.to_string(),
        description: "release candidate".to_string(),
        ..Default::default()
    }
}
