use seqmodel_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

pub type TrainResult<T> = std::result::Result<T, TrainError>;

/// Error taxonomy of the training core.
///
/// The top-level controller maps every variant to a non-zero exit code and
/// guarantees that no output file exists after a failure.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("optimization failed: {0}")]
    OptimizationFailed(String),

    #[error("incompatible model: artifact schema version {found}, this build supports {supported}")]
    IncompatibleModel { found: u32, supported: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<CoreError> for TrainError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InputNotFound(path) => Self::InputNotFound(path),
            CoreError::Io(e) => Self::Io(e),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}
