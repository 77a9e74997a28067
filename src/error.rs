//! Error types for the RestPose client.
//!
//! Every fallible operation in the crate returns [`Result`], whose error
//! side is the [`Error`] enum.
//!
//! # Categories
//!
//! | Category | Variants | Raised by |
//! |----------|----------|-----------|
//! | Usage | `NoTarget`, `InconsistentTargets`, `DivisionByZero`, `InvalidFactor`, `EmptyCombination`, `NegativeIndex`, `UnsupportedStep`, `IndexOutOfRange`, `InvalidKeyType`, `InvalidName` | The call that broke the contract, before any I/O |
//! | Checkpoint | `CheckpointExpired`, `CheckpointTimeout`, `WaitCancelled` | [`CheckPoint`](crate::checkpoint::CheckPoint) |
//! | Transport | `Http`, `Transport`, `Json` | The HTTP layer, passed through unchanged |
//! | Config | `Config` | [`load_config`](crate::config::load_config) |

use std::time::Duration;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the RestPose client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ==================== Usage ====================
    /// A result-dependent property was accessed with no target bound.
    #[error("target of search not set")]
    NoTarget,

    /// Queries bound to different targets were combined.
    #[error("queries have inconsistent targets: {first} and {second}")]
    InconsistentTargets { first: String, second: String },

    /// A query weight was divided by zero.
    #[error("division of query weight by zero")]
    DivisionByZero,

    /// A weight factor was NaN or infinite.
    #[error("weight factor must be finite, got {factor}")]
    InvalidFactor { factor: f64 },

    /// A boolean combination was built from no subqueries.
    #[error("cannot combine an empty list of queries with '{op}'")]
    EmptyCombination { op: &'static str },

    /// An index or slice bound was negative.
    #[error("negative indexing is not supported (got {index})")]
    NegativeIndex { index: i64 },

    /// A slice step other than 1 was requested.
    #[error("step values != 1 are not supported (got {step})")]
    UnsupportedStep { step: i64 },

    /// A rank or index fell outside the range of the current view.
    #[error("rank {rank} is out of range")]
    IndexOutOfRange { rank: u64 },

    /// A dynamic key was neither an integer nor a slice.
    #[error("keys must be integers or slices, got {found}")]
    InvalidKeyType { found: String },

    /// A collection or document type name contained invalid characters.
    #[error("invalid {kind} name '{name}': names may contain only lowercase letters, numbers, underscore and hyphen")]
    InvalidName { kind: &'static str, name: String },

    // ==================== Checkpoint ====================
    /// The server no longer knows about the checkpoint.
    #[error("checkpoint '{checkid}' has expired")]
    CheckpointExpired { checkid: String },

    /// The checkpoint was not reached within the allowed wait.
    #[error("checkpoint '{checkid}' not reached after {waited:?}")]
    CheckpointTimeout { checkid: String, waited: Duration },

    /// The wait was cancelled through its cancel flag.
    #[error("wait for checkpoint '{checkid}' was cancelled")]
    WaitCancelled { checkid: String },

    // ==================== Transport ====================
    /// The server answered with a non-success status.
    #[error("HTTP {status} for {method} {path}: {message}")]
    Http {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A body could not be encoded or decoded as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ==================== Config ====================
    /// The client configuration was unreadable or invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// True for errors caused by misuse of the API rather than by the
    /// server or the network.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::NoTarget
                | Error::InconsistentTargets { .. }
                | Error::DivisionByZero
                | Error::InvalidFactor { .. }
                | Error::EmptyCombination { .. }
                | Error::NegativeIndex { .. }
                | Error::UnsupportedStep { .. }
                | Error::IndexOutOfRange { .. }
                | Error::InvalidKeyType { .. }
                | Error::InvalidName { .. }
        )
    }

    /// True when the server reported that the requested resource does not
    /// exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Http { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_classification() {
        assert!(Error::NoTarget.is_usage());
        assert!(Error::UnsupportedStep { step: 2 }.is_usage());
        assert!(!Error::Config("bad".to_string()).is_usage());
        assert!(!Error::CheckpointExpired {
            checkid: "x".to_string()
        }
        .is_usage());
    }

    #[test]
    fn test_not_found() {
        let err = Error::Http {
            method: "GET".to_string(),
            path: "/coll/c/type/t/id/2".to_string(),
            status: 404,
            message: "No document found".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_usage());
        assert_eq!(
            err.to_string(),
            "HTTP 404 for GET /coll/c/type/t/id/2: No document found"
        );
    }
}
