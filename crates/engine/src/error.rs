use caseflow_storage::StoreError;

/// Errors surfaced by engine operations.
///
/// Every operation that fails leaves the caller's local state untouched, so
/// the variant alone tells the caller what to do next: retry on
/// `StoreUnavailable`, drop the cached entity on `NotFound`, and surface the
/// rest to the operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The backing store could not be reached. Safe to retry.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The referenced entity no longer exists.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation is not valid from the current state.
    #[error("cannot {attempted} while {state}")]
    InvalidTransition { state: String, attempted: String },

    /// Leaving a running execution needs explicit confirmation.
    #[error("execution in progress; exit requires confirmation")]
    ConfirmationRequired,

    /// Any other store failure.
    #[error("storage error: {0}")]
    Store(String),
}

impl EngineError {
    pub(crate) fn invalid(state: impl Into<String>, attempted: impl Into<String>) -> Self {
        EngineError::InvalidTransition {
            state: state.into(),
            attempted: attempted.into(),
        }
    }

    /// Whether the same call may succeed if repeated unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::StoreUnavailable(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => EngineError::StoreUnavailable(msg),
            StoreError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            // Engine code absorbs duplicates before they get here; anything
            // that leaks through is reported as a plain store failure.
            other @ StoreError::DuplicateLink { .. } => EngineError::Store(other.to_string()),
            StoreError::Backend(msg) => EngineError::Store(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_onto_engine_kinds() {
        let e: EngineError = StoreError::Unavailable("timeout".into()).into();
        assert_eq!(e, EngineError::StoreUnavailable("timeout".into()));
        assert!(e.is_retryable());

        let e: EngineError = StoreError::NotFound {
            entity: "test case",
            id: "c1".into(),
        }
        .into();
        assert_eq!(e.to_string(), "test case not found: c1");
        assert!(!e.is_retryable());

        let e: EngineError = StoreError::Backend("disk full".into()).into();
        assert_eq!(e, EngineError::Store("disk full".into()));
    }

    #[test]
    fn invalid_transition_message_names_state_and_attempt() {
        let e = EngineError::invalid("running", "start");
        assert_eq!(e.to_string(), "cannot start while running");
    }
}
