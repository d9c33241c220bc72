use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Status and priority enums ─────────────────────────────────────────────────

/// Returned when a status or priority string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

/// Status of a single test step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Passed,
    Failed,
}

string_enum!(StepStatus, "step status", {
    Pending => "pending",
    Passed => "passed",
    Failed => "failed",
});

/// Aggregate status of a test case, either globally or within one flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    NoRun,
    Pending,
    Passed,
    Failed,
}

string_enum!(CaseStatus, "case status", {
    NoRun => "no_run",
    Pending => "pending",
    Passed => "passed",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

string_enum!(Priority, "priority", {
    High => "high",
    Medium => "medium",
    Low => "low",
});

/// Coarse lifecycle status of a flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowRunStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
    Archived,
}

string_enum!(FlowRunStatus, "flow run status", {
    Draft => "draft",
    InProgress => "in_progress",
    Completed => "completed",
    Archived => "archived",
});

/// How a flow-run case sources its steps. Fixed when the case joins the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepIsolation {
    /// The run executes its own snapshot of the steps taken at add time.
    #[default]
    CopyOnAdd,
    /// The run executes the canonical steps, and results flow back into the
    /// test case's own status.
    Shared,
}

string_enum!(StepIsolation, "step isolation", {
    CopyOnAdd => "copy_on_add",
    Shared => "shared",
});

// ── Test cases and steps ──────────────────────────────────────────────────────

/// A test case row. Steps are stored separately and keyed by `test_case_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseRecord {
    pub id: String,
    /// Human-facing sequential id, e.g. `TC-12`.
    pub display_id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: CaseStatus,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTestCase {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: CaseStatus,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
}

/// Partial update of a test case. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCasePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<CaseStatus>,
    pub labels: Option<Vec<String>>,
    pub assignee: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStepRecord {
    pub id: String,
    pub test_case_id: String,
    /// Zero-based order within the owning case.
    pub position: u32,
    pub description: String,
    pub expected_result: String,
    pub actual_result: String,
    pub status: StepStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTestStep {
    pub description: String,
    pub expected_result: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestStepPatch {
    pub description: Option<String>,
    pub expected_result: Option<String>,
    pub actual_result: Option<String>,
    pub status: Option<StepStatus>,
}

// ── Suites ────────────────────────────────────────────────────────────────────

/// A suite row. Membership lives in the suite-case link table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuiteRecord {
    pub id: String,
    pub display_id: String,
    pub name: String,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTestSuite {
    pub name: String,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSuitePatch {
    pub name: Option<String>,
    pub labels: Option<Vec<String>>,
    pub assignee: Option<Option<String>>,
}

// ── Flow runs ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRunRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: FlowRunStatus,
    /// Set once, when the run leaves `draft`.
    pub start_date: Option<String>,
    /// Set once, when the run is completed.
    pub end_date: Option<String>,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFlowRun {
    pub title: String,
    pub description: String,
    pub status: FlowRunStatus,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowRunPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<FlowRunStatus>,
    pub start_date: Option<Option<String>>,
    pub end_date: Option<Option<String>>,
    pub labels: Option<Vec<String>>,
    pub assignee: Option<Option<String>>,
}

/// One test case's execution record inside a flow run.
///
/// Unique per `(flow_run_id, test_case_id)`. The status here is independent
/// of the test case's own global status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRunCaseRecord {
    pub id: String,
    pub flow_run_id: String,
    pub test_case_id: String,
    /// Stores written before isolation was recorded load as `copy_on_add`.
    #[serde(default)]
    pub isolation: StepIsolation,
    pub status: CaseStatus,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFlowRunCase {
    pub flow_run_id: String,
    pub test_case_id: String,
    pub isolation: StepIsolation,
    pub status: CaseStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowRunCasePatch {
    pub status: Option<CaseStatus>,
    pub notes: Option<String>,
}

/// A run-scoped copy of a test step, owned by one flow-run case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStepRecord {
    pub id: String,
    pub flow_run_case_id: String,
    /// The canonical step this copy was taken from.
    pub source_step_id: String,
    pub position: u32,
    pub description: String,
    pub expected_result: String,
    pub actual_result: String,
    pub status: StepStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRunStep {
    pub source_step_id: String,
    pub description: String,
    pub expected_result: String,
    pub actual_result: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStepPatch {
    pub actual_result: Option<String>,
    pub status: Option<StepStatus>,
}

// ── Batched step writes ──────────────────────────────────────────────────────

/// New execution state for one step inside a batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepUpdate {
    pub step_id: String,
    pub status: Option<StepStatus>,
    pub actual_result: Option<String>,
}

/// Status writes that land together with a batch of canonical step updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStatus {
    /// New status of the test case owning the steps.
    pub test_case: Option<CaseStatus>,
    /// New status of a flow-run case executing the canonical steps, as
    /// `(flow_run_case_id, status)`.
    pub flow_run_case: Option<(String, CaseStatus)>,
}

/// Current UTC time as an RFC 3339 string with second precision.
pub fn now_rfc3339() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
