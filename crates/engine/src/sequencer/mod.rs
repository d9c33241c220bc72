//! Execution sequencer: walks an operator through a test case one step at a
//! time.
//!
//! A [`Sequencer`] is either idle or running with a cursor on the step that
//! must be recorded next. Steps are recorded strictly in order; a failure or
//! the last step finishes the execution and writes the rolled-up status back
//! to whatever owns it. Quick-complete sets every step at once without a
//! walk.
//!
//! Every operation makes exactly one batched store write covering its steps
//! and the owner's status, and only then changes local state. A failed write
//! leaves both the store and the sequencer exactly as they were, so the
//! caller can retry the same call.
//!
//! Where results are written depends on the [`ExecutionScope`]:
//!
//! | scope       | steps written to      | status written to            |
//! |-------------|-----------------------|------------------------------|
//! | `Case`      | canonical test steps  | test case                    |
//! | `RunCopy`   | run-scoped step copies| flow-run case                |
//! | `RunShared` | canonical test steps  | flow-run case and test case  |

use serde::Serialize;
use tracing::{debug, info, warn};

use caseflow_storage::{BatchStatus, CaseStore, StepUpdate};

use crate::adapter::{load_flow_run_case, load_test_case};
use crate::error::EngineError;
use crate::rollup::rollup;
use crate::types::{CaseStatus, StepIsolation, StepStatus, TestStep};


// ──────────────────────────────────────────────
// Context
// ──────────────────────────────────────────────

/// Where an execution's results go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ExecutionScope {
    /// Executing a test case on its own.
    Case,
    /// Executing inside a flow run against the run's step snapshot.
    RunCopy {
        flow_run_id: String,
        flow_run_case_id: String,
    },
    /// Executing inside a flow run against the canonical steps.
    RunShared {
        flow_run_id: String,
        flow_run_case_id: String,
    },
}

/// Identifies the execution a [`Sequencer`] drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionContext {
    pub test_case_id: String,
    #[serde(flatten)]
    pub scope: ExecutionScope,
}

impl ExecutionContext {
    pub fn case(test_case_id: impl Into<String>) -> Self {
        ExecutionContext {
            test_case_id: test_case_id.into(),
            scope: ExecutionScope::Case,
        }
    }

    pub fn flow_run_id(&self) -> Option<&str> {
        match &self.scope {
            ExecutionScope::Case => None,
            ExecutionScope::RunCopy { flow_run_id, .. }
            | ExecutionScope::RunShared { flow_run_id, .. } => Some(flow_run_id),
        }
    }
}

/// A state change produced by a sequencer operation, in the order it
/// happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    Started { cursor: usize },
    StepRecorded { step_id: String, status: StepStatus },
    CursorAdvanced { from: usize, to: usize },
    ResultRecorded { step_id: String },
    CaseStatusChanged { status: CaseStatus },
    Finished { status: CaseStatus },
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running { cursor: usize },
}

// ──────────────────────────────────────────────
// Sequencer
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Sequencer {
    context: ExecutionContext,
    steps: Vec<TestStep>,
    status: CaseStatus,
    phase: Phase,
}

impl Sequencer {
    /// An idle sequencer over already-loaded steps.
    pub fn new(context: ExecutionContext, steps: Vec<TestStep>, status: CaseStatus) -> Self {
        Sequencer {
            context,
            steps,
            status,
            phase: Phase::Idle,
        }
    }

    /// Execute a test case on its own.
    pub async fn for_case<S: CaseStore>(store: &S, test_case_id: &str) -> Result<Self, EngineError> {
        let case = load_test_case(store, test_case_id).await?;
        Ok(Sequencer::new(
            ExecutionContext::case(case.id),
            case.steps,
            case.status,
        ))
    }

    /// Execute a test case inside a flow run. Steps and results follow the
    /// isolation the case was added to the run with.
    pub async fn for_flow_run_case<S: CaseStore>(
        store: &S,
        flow_run_id: &str,
        test_case_id: &str,
    ) -> Result<Self, EngineError> {
        let run_case = load_flow_run_case(store, flow_run_id, test_case_id).await?;
        let scope = match run_case.isolation {
            StepIsolation::CopyOnAdd => ExecutionScope::RunCopy {
                flow_run_id: run_case.flow_run_id,
                flow_run_case_id: run_case.id,
            },
            StepIsolation::Shared => ExecutionScope::RunShared {
                flow_run_id: run_case.flow_run_id,
                flow_run_case_id: run_case.id,
            },
        };
        Ok(Sequencer::new(
            ExecutionContext {
                test_case_id: run_case.test_case_id,
                scope,
            },
            run_case.steps,
            run_case.status,
        ))
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn steps(&self) -> &[TestStep] {
        &self.steps
    }

    /// Status of whatever owns this execution: the case, or the run case.
    pub fn status(&self) -> CaseStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    /// Index of the step to record next, while running.
    pub fn cursor(&self) -> Option<usize> {
        match self.phase {
            Phase::Idle => None,
            Phase::Running { cursor } => Some(cursor),
        }
    }

    pub fn current_step(&self) -> Option<&TestStep> {
        self.cursor().and_then(|i| self.steps.get(i))
    }

    fn state_name(&self) -> &'static str {
        match self.phase {
            Phase::Idle => "idle",
            Phase::Running { .. } => "running",
        }
    }

    // ── Operations ───────────────────────────────

    /// Begin a step-by-step execution from the first step.
    ///
    /// Every step is reset to pending with an empty actual result and the
    /// owning status becomes `pending`. A case with no steps has nothing to
    /// walk; the call succeeds and changes nothing.
    pub async fn start<S: CaseStore>(&mut self, store: &S) -> Result<Vec<ExecutionEvent>, EngineError> {
        if self.is_running() {
            warn!(test_case_id = %self.context.test_case_id, "start rejected: already running");
            return Err(EngineError::invalid(self.state_name(), "start"));
        }
        if self.steps.is_empty() {
            debug!(test_case_id = %self.context.test_case_id, "start on a case without steps");
            return Ok(Vec::new());
        }

        let updates = self.every_step(StepStatus::Pending, Some(String::new()));
        self.write_batch(store, updates, Some(CaseStatus::Pending))
            .await?;

        self.steps = self.steps.iter().map(TestStep::reset).collect();
        self.status = CaseStatus::Pending;
        self.phase = Phase::Running { cursor: 0 };
        info!(test_case_id = %self.context.test_case_id, steps = self.steps.len(), "execution started");
        Ok(vec![
            ExecutionEvent::Started { cursor: 0 },
            ExecutionEvent::CaseStatusChanged {
                status: CaseStatus::Pending,
            },
        ])
    }

    /// Record the outcome of the step under the cursor.
    ///
    /// A pass advances the cursor. A failure, or passing the last step,
    /// finishes the execution and writes the rolled-up status.
    pub async fn record_step<S: CaseStore>(
        &mut self,
        store: &S,
        step_id: &str,
        status: StepStatus,
    ) -> Result<Vec<ExecutionEvent>, EngineError> {
        if status == StepStatus::Pending {
            return Err(EngineError::invalid(self.state_name(), "record a step as pending"));
        }
        let cursor = match self.phase {
            Phase::Running { cursor } => cursor,
            Phase::Idle => {
                return Err(EngineError::invalid("idle", format!("record step {step_id}")));
            }
        };
        let current = &self.steps[cursor];
        if current.id != step_id {
            warn!(
                test_case_id = %self.context.test_case_id,
                expected = %current.id,
                got = step_id,
                "out-of-order step rejected"
            );
            return Err(EngineError::invalid(
                format!("running at step {}", current.id),
                format!("record step {step_id}"),
            ));
        }

        let mut steps = self.steps.clone();
        steps[cursor].status = status;
        let last = cursor + 1 == steps.len();
        let finished = status == StepStatus::Failed || last;
        let rolled = rollup(&steps);

        let update = StepUpdate {
            step_id: step_id.to_string(),
            status: Some(status),
            actual_result: None,
        };
        self.write_batch(store, vec![update], finished.then_some(rolled))
            .await?;

        let mut events = vec![ExecutionEvent::StepRecorded {
            step_id: step_id.to_string(),
            status,
        }];

        if finished {
            self.steps = steps;
            self.status = rolled;
            self.phase = Phase::Idle;
            info!(test_case_id = %self.context.test_case_id, status = %rolled, "execution finished");
            events.push(ExecutionEvent::CaseStatusChanged { status: rolled });
            events.push(ExecutionEvent::Finished { status: rolled });
        } else {
            self.steps = steps;
            self.phase = Phase::Running { cursor: cursor + 1 };
            debug!(test_case_id = %self.context.test_case_id, cursor = cursor + 1, "cursor advanced");
            events.push(ExecutionEvent::CursorAdvanced {
                from: cursor,
                to: cursor + 1,
            });
        }
        Ok(events)
    }

    /// Store free-text observations for any step. Does not touch status or
    /// the cursor.
    pub async fn record_result<S: CaseStore>(
        &mut self,
        store: &S,
        step_id: &str,
        text: &str,
    ) -> Result<Vec<ExecutionEvent>, EngineError> {
        let index = self
            .steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or_else(|| EngineError::NotFound {
                entity: "test step",
                id: step_id.to_string(),
            })?;

        let update = StepUpdate {
            step_id: step_id.to_string(),
            status: None,
            actual_result: Some(text.to_string()),
        };
        self.write_batch(store, vec![update], None).await?;

        self.steps[index].actual_result = text.to_string();
        debug!(test_case_id = %self.context.test_case_id, step_id, "actual result recorded");
        Ok(vec![ExecutionEvent::ResultRecorded {
            step_id: step_id.to_string(),
        }])
    }

    /// Mark every step with `status` at once and finish.
    ///
    /// Valid whether or not an execution is running; a running execution is
    /// ended by it.
    pub async fn quick_complete<S: CaseStore>(
        &mut self,
        store: &S,
        status: StepStatus,
    ) -> Result<Vec<ExecutionEvent>, EngineError> {
        let case_status = match status {
            StepStatus::Passed => CaseStatus::Passed,
            StepStatus::Failed => CaseStatus::Failed,
            StepStatus::Pending => {
                return Err(EngineError::invalid(self.state_name(), "quick-complete as pending"));
            }
        };

        let updates = self.every_step(status, None);
        self.write_batch(store, updates, Some(case_status)).await?;

        for step in &mut self.steps {
            step.status = status;
        }
        self.status = case_status;
        self.phase = Phase::Idle;
        info!(test_case_id = %self.context.test_case_id, status = %case_status, "execution quick-completed");
        Ok(vec![
            ExecutionEvent::CaseStatusChanged {
                status: case_status,
            },
            ExecutionEvent::Finished {
                status: case_status,
            },
        ])
    }

    /// Leave the current execution.
    ///
    /// Idle: nothing to leave. Running: requires `confirmed`; then every
    /// step goes back to pending (recorded actual results are kept) and the
    /// owning status becomes `no_run`.
    pub async fn exit<S: CaseStore>(
        &mut self,
        store: &S,
        confirmed: bool,
    ) -> Result<Vec<ExecutionEvent>, EngineError> {
        if !self.is_running() {
            return Ok(Vec::new());
        }
        if !confirmed {
            return Err(EngineError::ConfirmationRequired);
        }

        let updates = self.every_step(StepStatus::Pending, None);
        self.write_batch(store, updates, Some(CaseStatus::NoRun))
            .await?;

        for step in &mut self.steps {
            step.status = StepStatus::Pending;
        }
        self.status = CaseStatus::NoRun;
        self.phase = Phase::Idle;
        info!(test_case_id = %self.context.test_case_id, "execution abandoned");
        Ok(vec![
            ExecutionEvent::Abandoned,
            ExecutionEvent::CaseStatusChanged {
                status: CaseStatus::NoRun,
            },
        ])
    }

    // ── Persistence ──────────────────────────────

    fn every_step(&self, status: StepStatus, actual_result: Option<String>) -> Vec<StepUpdate> {
        self.steps
            .iter()
            .map(|step| StepUpdate {
                step_id: step.id.clone(),
                status: Some(status),
                actual_result: actual_result.clone(),
            })
            .collect()
    }

    /// Write step updates and, when given, the owner's status in one store
    /// call.
    async fn write_batch<S: CaseStore>(
        &self,
        store: &S,
        updates: Vec<StepUpdate>,
        status: Option<CaseStatus>,
    ) -> Result<(), EngineError> {
        let case_id = &self.context.test_case_id;
        match &self.context.scope {
            ExecutionScope::Case => {
                store
                    .update_test_steps(
                        case_id,
                        updates,
                        BatchStatus {
                            test_case: status,
                            flow_run_case: None,
                        },
                    )
                    .await?
            }
            ExecutionScope::RunCopy {
                flow_run_case_id, ..
            } => store.update_run_steps(flow_run_case_id, updates, status).await?,
            // The canonical steps change too, so the case's own status
            // follows them.
            ExecutionScope::RunShared {
                flow_run_case_id, ..
            } => {
                store
                    .update_test_steps(
                        case_id,
                        updates,
                        BatchStatus {
                            test_case: status,
                            flow_run_case: status.map(|s| (flow_run_case_id.clone(), s)),
                        },
                    )
                    .await?
            }
        }
        if let Some(status) = status {
            debug!(test_case_id = %case_id, status = %status, "status propagated");
        }
        Ok(())
    }
}
