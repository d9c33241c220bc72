use caseflow_engine::EngineError;
use caseflow_storage::StoreError;

/// Everything that can end a `caseflow` invocation with a non-zero exit.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{failed} of {total} cases could not be added to the flow run")]
    PartialAdd { failed: usize, total: usize },
}
