//! caseflow engine -- derives test case status from step results, drives an
//! operator through a test case step by step, keeps case/suite and
//! case/flow-run associations duplicate-free, and moves flow runs through
//! their lifecycle.
//!
//! All persistence goes through a [`caseflow_storage::CaseStore`]. The engine
//! holds no ambient state: every operation takes the store and the explicit
//! context it acts on, and reports what changed through return values.

pub mod adapter;
pub mod authoring;
pub mod catalog;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod rollup;
pub mod sequencer;
pub mod types;

pub use catalog::Catalog;
pub use config::{ConfigError, EngineConfig, StepIsolation};
pub use error::EngineError;
pub use lifecycle::{transition_flow_run, RunSummary};
pub use registry::{BulkAddReport, LinkOutcome};
pub use rollup::rollup;
pub use sequencer::{ExecutionContext, ExecutionEvent, ExecutionScope, Sequencer};
pub use types::{
    CaseStatus, FlowRun, FlowRunStatus, FlowRunTestCase, Priority, StepStatus, TestCase, TestStep,
    TestSuite,
};
