//! Flow run lifecycle.
//!
//! ```text
//! draft ──▶ in_progress ──▶ completed
//!   │            │              │
//!   └────────────┴──────────────┴──▶ archived
//! ```
//!
//! `start_date` is stamped the first time a run enters `in_progress` and
//! `end_date` the first time it enters `completed`; neither is overwritten
//! afterwards. `archived` is terminal.

use serde::Serialize;
use tracing::{info, warn};

use caseflow_storage::{now_rfc3339, CaseStore, FlowRunPatch};

use crate::adapter::load_flow_run;
use crate::error::EngineError;
use crate::types::{CaseStatus, FlowRun, FlowRunStatus};

/// Whether `from -> to` is an allowed lifecycle step.
pub fn can_transition(from: FlowRunStatus, to: FlowRunStatus) -> bool {
    use FlowRunStatus::*;
    matches!(
        (from, to),
        (Draft, InProgress) | (InProgress, Completed) | (Draft | InProgress | Completed, Archived)
    )
}

/// Validate a transition and compute the store patch for it.
pub fn plan_transition(
    run: &FlowRun,
    to: FlowRunStatus,
    now: &str,
) -> Result<FlowRunPatch, EngineError> {
    if !can_transition(run.status, to) {
        return Err(EngineError::invalid(
            run.status.as_str(),
            format!("move flow run to {to}"),
        ));
    }
    let mut patch = FlowRunPatch {
        status: Some(to),
        ..FlowRunPatch::default()
    };
    if to == FlowRunStatus::InProgress && run.start_date.is_none() {
        patch.start_date = Some(Some(now.to_string()));
    }
    if to == FlowRunStatus::Completed && run.end_date.is_none() {
        patch.end_date = Some(Some(now.to_string()));
    }
    Ok(patch)
}

/// Move a flow run to `to`, returning the run as stored afterwards.
pub async fn transition_flow_run<S: CaseStore>(
    store: &S,
    flow_run_id: &str,
    to: FlowRunStatus,
) -> Result<FlowRun, EngineError> {
    let run = load_flow_run(store, flow_run_id).await?;
    let patch = match plan_transition(&run, to, &now_rfc3339()) {
        Ok(patch) => patch,
        Err(e) => {
            warn!(flow_run_id, from = %run.status, to = %to, "flow run transition rejected");
            return Err(e);
        }
    };
    store.update_flow_run(flow_run_id, patch).await?;
    info!(flow_run_id, from = %run.status, to = %to, "flow run transitioned");
    load_flow_run(store, flow_run_id).await
}

pub async fn start_flow_run<S: CaseStore>(store: &S, flow_run_id: &str) -> Result<FlowRun, EngineError> {
    transition_flow_run(store, flow_run_id, FlowRunStatus::InProgress).await
}

pub async fn complete_flow_run<S: CaseStore>(store: &S, flow_run_id: &str) -> Result<FlowRun, EngineError> {
    transition_flow_run(store, flow_run_id, FlowRunStatus::Completed).await
}

pub async fn archive_flow_run<S: CaseStore>(store: &S, flow_run_id: &str) -> Result<FlowRun, EngineError> {
    transition_flow_run(store, flow_run_id, FlowRunStatus::Archived).await
}

// ──────────────────────────────────────────────
// Progress summary
// ──────────────────────────────────────────────

/// Run-local status counts across a flow run's cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub no_run: usize,
    pub pending: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn tally<I: IntoIterator<Item = CaseStatus>>(statuses: I) -> Self {
        let mut summary = RunSummary::default();
        for status in statuses {
            summary.total += 1;
            match status {
                CaseStatus::NoRun => summary.no_run += 1,
                CaseStatus::Pending => summary.pending += 1,
                CaseStatus::Passed => summary.passed += 1,
                CaseStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

pub async fn flow_run_summary<S: CaseStore>(store: &S, flow_run_id: &str) -> Result<RunSummary, EngineError> {
    store.get_flow_run(flow_run_id).await?;
    let cases = store.list_flow_run_cases(flow_run_id).await?;
    Ok(RunSummary::tally(cases.into_iter().map(|c| c.status)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use FlowRunStatus::*;

    fn run(status: FlowRunStatus) -> FlowRun {
        FlowRun {
            id: "r1".into(),
            title: "release".into(),
            description: String::new(),
            status,
            start_date: None,
            end_date: None,
            labels: vec![],
            assignee: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn allowed_transitions() {
        assert!(can_transition(Draft, InProgress));
        assert!(can_transition(InProgress, Completed));
        assert!(can_transition(InProgress, Archived));
        assert!(can_transition(Completed, Archived));
        assert!(can_transition(Draft, Archived));
    }

    #[test]
    fn skipping_and_reversing_are_rejected() {
        assert!(!can_transition(Draft, Completed));
        assert!(!can_transition(Completed, InProgress));
        assert!(!can_transition(InProgress, Draft));
        for to in [Draft, InProgress, Completed, Archived] {
            assert!(!can_transition(Archived, to));
        }
    }

    #[test]
    fn same_state_is_not_a_transition() {
        for s in [Draft, InProgress, Completed, Archived] {
            assert!(!can_transition(s, s));
        }
    }

    #[test]
    fn starting_stamps_start_date() {
        let patch = plan_transition(&run(Draft), InProgress, "2026-01-02T03:04:05Z").unwrap();
        assert_eq!(patch.status, Some(InProgress));
        assert_eq!(patch.start_date, Some(Some("2026-01-02T03:04:05Z".into())));
        assert_eq!(patch.end_date, None);
    }

    #[test]
    fn completing_stamps_end_date_once() {
        let mut r = run(InProgress);
        let patch = plan_transition(&r, Completed, "t1").unwrap();
        assert_eq!(patch.end_date, Some(Some("t1".into())));

        r.end_date = Some("t0".into());
        let patch = plan_transition(&r, Completed, "t1").unwrap();
        assert_eq!(patch.end_date, None);
    }

    #[test]
    fn archiving_leaves_dates_alone() {
        let patch = plan_transition(&run(Completed), Archived, "t").unwrap();
        assert_eq!(patch.start_date, None);
        assert_eq!(patch.end_date, None);
    }

    #[test]
    fn rejected_transition_names_both_states() {
        let err = plan_transition(&run(Draft), Completed, "t").unwrap_err();
        assert_eq!(err.to_string(), "cannot move flow run to completed while draft");
    }

    #[test]
    fn summary_counts_each_status() {
        let s = RunSummary::tally([
            CaseStatus::Passed,
            CaseStatus::Passed,
            CaseStatus::Failed,
            CaseStatus::NoRun,
        ]);
        assert_eq!(s.total, 4);
        assert_eq!(s.passed, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.no_run, 1);
        assert_eq!(s.pending, 0);
    }
}
