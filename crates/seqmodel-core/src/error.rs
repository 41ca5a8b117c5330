use std::path::PathBuf;
use thiserror::Error;

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("feature extraction failed for record '{id}': {reason}")]
    Extraction { id: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
