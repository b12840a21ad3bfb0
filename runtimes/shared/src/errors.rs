use crate::FailureKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Failed to create evaluation context: {0}")]
    ContextSetup(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The interpreter exists but the OS refused the arguments carrying the
    /// source (embedded NUL byte, argument list too long).
    #[error("Source code could not be passed to {program}: {source}")]
    SourceRejected {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Lost track of {program} while waiting for it: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Execution worker failed: {0}")]
    Worker(String),

    #[error("Invalid language: {0}")]
    InvalidLanguage(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidConfig { key: String, value: String },
}

impl RuntimeError {
    /// The underlying cause without the variant prefix, for user-facing
    /// launch messages.
    pub fn reason(&self) -> String {
        match self {
            RuntimeError::Spawn { source, .. } => source.to_string(),
            RuntimeError::ContextSetup(reason) | RuntimeError::Worker(reason) => reason.clone(),
            other => other.to_string(),
        }
    }

    /// How this error is reported when it ends an execution. Only an
    /// interpreter or context that cannot be started is a launch failure.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            RuntimeError::Spawn { .. } | RuntimeError::ContextSetup(_) => FailureKind::Launch,
            RuntimeError::SourceRejected { source, .. }
                if source.kind() == std::io::ErrorKind::InvalidInput =>
            {
                FailureKind::Syntax
            }
            _ => FailureKind::Runtime,
        }
    }
}
