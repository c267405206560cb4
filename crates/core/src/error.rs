//! Engine and collaborator error types.

/// Failures reported by an external collaborator (history store, context tracker, repository).
///
/// All of these are retryable from the engine's point of view: the engine performs no retry
/// itself, the host decides.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },
    #[error("{collaborator} rejected the request: {reason}")]
    Rejected {
        collaborator: &'static str,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("code '{code}' is claimed by both {first} and {second} in {registry}")]
    DuplicateCode {
        registry: &'static str,
        code: &'static str,
        first: String,
        second: String,
    },
    #[error("{constant} is registered more than once in {registry}")]
    DuplicateConstant {
        registry: &'static str,
        constant: String,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to parse frequency table: {0}")]
    FrequencyTable(#[from] serde_yaml::Error),
    #[error("invalid frequency table entry '{code}': {reason}")]
    FrequencyEntry { code: String, reason: String },

    #[error("collaborator failure: {0}")]
    Collaborator(#[from] CollaboratorError),
    #[error("failed to serialize harm evidence document: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize harm evidence document: {0}")]
    Deserialization(serde_json::Error),
}

impl EngineError {
    /// Whether the host may retry the entry point that produced this error.
    ///
    /// Configuration errors are raised at startup and are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Collaborator(_))
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
