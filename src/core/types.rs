use serde::{Deserialize, Serialize};

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// A transformation could not be turned into a callable descriptor.
    ResolutionError,
    /// A bound value names a parameter the descriptor does not declare.
    ParameterMismatch,
    /// A step raised while a pipeline was running.
    StepExecutionError,
    ValidationError,
    SerializationError,
    DatasetError,
    IoError,
    InternalError,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Error,
    Warning,
    Info,
    Debug,
}

/// Lifecycle of a pipeline instance with respect to the resumable discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Stepping,
    Complete,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Stepping => "stepping",
            PipelineState::Complete => "complete",
        }
    }
}
