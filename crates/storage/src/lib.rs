pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use record::{
    now_rfc3339, BatchStatus, CaseStatus, FlowRunCasePatch, FlowRunCaseRecord, FlowRunPatch,
    FlowRunRecord, FlowRunStatus, NewFlowRun, NewFlowRunCase, NewRunStep, NewTestCase,
    NewTestStep, NewTestSuite, ParseEnumError, Priority, RunStepPatch, RunStepRecord,
    StepIsolation, StepStatus, StepUpdate, TestCasePatch, TestCaseRecord, TestStepPatch,
    TestStepRecord, TestSuitePatch, TestSuiteRecord,
};
pub use traits::CaseStore;
