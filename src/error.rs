use std::path::PathBuf;

use thiserror::Error;

/// Fatal pipeline failures. Join mismatches are not errors; they surface as
/// nulls and in [`crate::join::JoinSummary`].
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Unable to fetch {url} after exhausting all URL variants and retries")]
    Fetch { url: String },

    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("Critical expectations failed ({}); see {report:?}", .failed.join(", "))]
    Validation { failed: Vec<String>, report: PathBuf },

    #[error("Warehouse error: {message}")]
    Warehouse {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },
}

impl EtlError {
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::Parse {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn warehouse(message: impl Into<String>, source: rusqlite::Error) -> Self {
        EtlError::Warehouse {
            message: message.into(),
            source: Some(source),
        }
    }
}
