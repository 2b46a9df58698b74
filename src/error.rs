use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::Backend;

/// Run stage, used to say where a timeout or cancellation hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ActiveSet,
    Scan(Backend),
    Aggregate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::ActiveSet => f.write_str("active-set fetch"),
            Stage::Scan(backend) => write!(f, "{} scan", backend),
            Stage::Aggregate => f.write_str("scan aggregation"),
        }
    }
}

/// Fatal errors of a sweep run
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to load config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to fetch open merge requests: {0}")]
    ActiveSetFetch(#[source] anyhow::Error),

    #[error("{backend} scan failed: {source}")]
    Scan {
        backend: Backend,
        #[source]
        source: ScanError,
    },

    #[error("{backend} scan task panicked: {message}")]
    TaskFailed { backend: Backend, message: String },

    #[error("{stage} timed out")]
    Timeout { stage: Stage },

    #[error("{stage} cancelled")]
    Cancelled { stage: Stage },
}

/// Failure of a single backend scan
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to enumerate resources: {0:#}")]
    Enumerate(#[source] anyhow::Error),

    #[error("resource {name:?} has no segment at index {index}")]
    MissingSegment { name: String, index: usize },

    #[error("resource {name:?} has non-numeric review segment {segment:?}")]
    InvalidIdentifier {
        name: String,
        segment: String,
        #[source]
        source: ParseIntError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_stage() {
        let err = SweepError::Scan {
            backend: Backend::ObjectStore,
            source: ScanError::MissingSegment {
                name: "mirera-".to_string(),
                index: 1,
            },
        };
        assert!(err.to_string().starts_with("object-store scan failed"));

        let err = SweepError::Timeout {
            stage: Stage::ActiveSet,
        };
        assert_eq!(err.to_string(), "active-set fetch timed out");
    }
}
