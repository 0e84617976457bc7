//! Error taxonomy for the gomod resolution engine.
//!
//! Mirrors the five error categories the engine distinguishes: an input
//! that is well-formed but cannot be processed ([`EngineError::PackageRejected`]),
//! a feature the engine deliberately refuses
//! ([`EngineError::UnsupportedFeature`]), a malformed external artifact
//! ([`EngineError::UnexpectedFormat`]), a non-retried network/git failure
//! ([`EngineError::FetchFailure`]), and a toolchain invocation that failed
//! after any applicable retries ([`EngineError::GoModFailure`]).

use thiserror::Error;

/// The single error type returned by every public entry point of the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The request is well-formed but cannot be processed as given (missing
    /// `go.mod`, strict-vendor violation, unused replacements, vendor drift).
    #[error("{reason}")]
    PackageRejected {
        reason: String,
        solution: Option<String>,
    },

    /// The request asks for behavior the engine deliberately refuses.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// An external artifact (e.g. `vendor/modules.txt`) could not be parsed.
    #[error("{reason}")]
    UnexpectedFormat {
        reason: String,
        solution: Option<String>,
    },

    /// A non-retried network or Git fetch failure.
    #[error("fetch failed: {0}")]
    FetchFailure(String),

    /// A toolchain command exited non-zero, after retries if the command is
    /// retryable.
    #[error("command `{command}` failed with exit code {rc}")]
    GoModFailure { command: String, rc: i32 },

    /// I/O error surfaced while touching the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure to parse a JSON listing emitted by the toolchain.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure from the Git repository inspector.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

/// Convenience alias for `Result<T, EngineError>`.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Builds a [`EngineError::PackageRejected`] with an optional remediation hint.
    pub fn package_rejected(reason: impl Into<String>, solution: Option<String>) -> Self {
        Self::PackageRejected {
            reason: reason.into(),
            solution,
        }
    }

    /// Builds an [`EngineError::UnexpectedFormat`] with an optional remediation hint.
    pub fn unexpected_format(reason: impl Into<String>, solution: Option<String>) -> Self {
        Self::UnexpectedFormat {
            reason: reason.into(),
            solution,
        }
    }

    /// Builds a [`EngineError::GoModFailure`] from the command that was run and its exit code.
    pub fn gomod_failure(command: impl IntoIterator<Item = impl AsRef<str>>, rc: i32) -> Self {
        let command = command
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Self::GoModFailure { command, rc }
    }
}
