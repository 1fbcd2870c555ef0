//! Error kinds for delve operations

use std::fmt;

/// The kind of error that occurred.
///
/// This enum categorizes errors to help users write clear error handling logic.
/// The agent loop matches on ErrorKind to decide whether a failed step is
/// recorded and retried within the budget or ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid configuration or parameters
    ConfigInvalid,

    /// Invalid argument passed to function
    InvalidArgument,

    // =========================================================================
    // Agent loop errors
    // =========================================================================
    /// Model output could not be parsed into an action
    ParseFailed,

    /// The step budget ran out before a final answer
    StepLimitExceeded,

    /// The model named a tool that is not registered
    ToolNotFound,

    /// A tool invocation failed; the loop may continue
    ToolFailed,

    /// A tool hit a fault it could not contain; the run must stop
    ToolCrashed,

    /// A delegated sub-agent did not produce an answer
    DelegationFailed,

    /// Building the agent hierarchy failed
    HierarchyInvalid,

    // =========================================================================
    // Inference/LLM errors
    // =========================================================================
    /// LLM inference failed
    InferenceFailed,

    /// Context too large for model
    ContextTooLarge,

    /// Provider not available
    ProviderUnavailable,

    /// Rate limit exceeded
    RateLimited,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Network error
    NetworkFailed,

    /// Serialization/deserialization failed
    SerializationFailed,

    /// The results sink rejected or lost a record
    SinkFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // Agent loop
            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::StepLimitExceeded => "StepLimitExceeded",
            ErrorKind::ToolNotFound => "ToolNotFound",
            ErrorKind::ToolFailed => "ToolFailed",
            ErrorKind::ToolCrashed => "ToolCrashed",
            ErrorKind::DelegationFailed => "DelegationFailed",
            ErrorKind::HierarchyInvalid => "HierarchyInvalid",

            // Inference
            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::ContextTooLarge => "ContextTooLarge",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::RateLimited => "RateLimited",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",
            ErrorKind::SinkFailed => "SinkFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InferenceFailed
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
                | ErrorKind::ProviderUnavailable
        )
    }

    /// Whether an error of this kind, raised by a tool, stays inside the step.
    ///
    /// Recoverable tool errors are written to memory as observations and the
    /// model gets another turn. Everything else aborts the run.
    pub fn is_recoverable_in_step(&self) -> bool {
        matches!(
            self,
            ErrorKind::ToolFailed
                | ErrorKind::ToolNotFound
                | ErrorKind::InvalidArgument
                | ErrorKind::DelegationFailed
                | ErrorKind::FileNotFound
                | ErrorKind::PermissionDenied
                | ErrorKind::NetworkFailed
                | ErrorKind::ParseFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
