use schemapath_storage::StoreError;
use std::path::PathBuf;

/// Terminal failures of a derivation run.
///
/// "No record found" is not an error: the parse entry points return
/// `Ok(None)` for it. Malformed tree nodes are skipped where they occur.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("cannot read schema source {location}: {reason}")]
    SourceUnreadable { location: String, reason: String },

    #[error("invalid parser config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl IngestError {
    pub(crate) fn unreadable(location: impl Into<String>, reason: impl ToString) -> Self {
        IngestError::SourceUnreadable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
