/// All errors that can be returned by a CaseStore implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Transient failure reaching the backend. Callers may retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// No record of kind `entity` with the given id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An association row for this pair already exists.
    #[error("link already exists: {left}/{right}")]
    DuplicateLink { left: String, right: String },

    /// A backend-specific storage error (serialization, file I/O, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn duplicate(left: &str, right: &str) -> Self {
        StoreError::DuplicateLink {
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}
