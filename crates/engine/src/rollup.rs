//! Status rollup: the aggregate status of a test case from its steps.
//!
//! Rules, first match wins:
//!
//! 1. no steps, or every step pending -> `no_run`
//! 2. any step failed -> `failed`
//! 3. every step passed -> `passed`
//! 4. otherwise (some passed, some pending) -> `pending`

use crate::types::{CaseStatus, StepStatus, TestStep};

pub fn rollup(steps: &[TestStep]) -> CaseStatus {
    rollup_statuses(steps.iter().map(|s| s.status))
}

/// [`rollup`] over bare step statuses.
pub fn rollup_statuses<I>(statuses: I) -> CaseStatus
where
    I: IntoIterator<Item = StepStatus>,
{
    let mut any_passed = false;
    let mut any_pending = false;
    let mut any_failed = false;
    for status in statuses {
        match status {
            StepStatus::Pending => any_pending = true,
            StepStatus::Passed => any_passed = true,
            StepStatus::Failed => any_failed = true,
        }
    }

    if any_failed {
        CaseStatus::Failed
    } else if !any_passed {
        CaseStatus::NoRun
    } else if any_pending {
        CaseStatus::Pending
    } else {
        CaseStatus::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StepStatus::*;

    fn roll(statuses: &[StepStatus]) -> CaseStatus {
        rollup_statuses(statuses.iter().copied())
    }

    #[test]
    fn empty_case_has_not_run() {
        assert_eq!(roll(&[]), CaseStatus::NoRun);
    }

    #[test]
    fn all_pending_has_not_run() {
        assert_eq!(roll(&[Pending, Pending, Pending]), CaseStatus::NoRun);
    }

    #[test]
    fn any_failure_fails_the_case() {
        assert_eq!(roll(&[Passed, Failed, Pending]), CaseStatus::Failed);
        assert_eq!(roll(&[Failed, Pending]), CaseStatus::Failed);
        assert_eq!(roll(&[Failed]), CaseStatus::Failed);
    }

    #[test]
    fn all_passed_passes_the_case() {
        assert_eq!(roll(&[Passed, Passed]), CaseStatus::Passed);
    }

    #[test]
    fn partial_progress_is_pending() {
        assert_eq!(roll(&[Passed, Passed, Pending]), CaseStatus::Pending);
        assert_eq!(roll(&[Pending, Passed]), CaseStatus::Pending);
    }

    #[test]
    fn order_does_not_matter() {
        let forward = [Passed, Pending, Failed];
        let mut backward = forward;
        backward.reverse();
        assert_eq!(roll(&forward), roll(&backward));
    }

    #[test]
    fn rollup_reads_step_statuses() {
        let step = |status| TestStep {
            id: String::new(),
            description: String::new(),
            expected_result: String::new(),
            actual_result: String::new(),
            status,
        };
        assert_eq!(rollup(&[step(Passed), step(Passed)]), CaseStatus::Passed);
    }
}
