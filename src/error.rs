//! Error types for the buyer agent

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Local validation failures of the settlement state machine
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementError {
    #[error("Invalid party: {0}")]
    InvalidParty(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Price already set for {0}")]
    AlreadySet(String),

    #[error("Session is not active")]
    SessionNotActive,

    #[error("Session not ready: missing {0}")]
    NotReady(String),

    #[error("Session already completed")]
    AlreadyCompleted,
}

/// How an external collaborator call failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorFailure {
    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("transport: {0}")]
    Transport(String),

    #[error("schema mismatch: {0}")]
    Schema(String),

    #[error("process failed: {0}")]
    Process(String),
}

/// Main error type for the buyer agent
#[derive(Error, Debug)]
pub enum AgentError {
    // Settlement errors
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already exists: {0}")]
    SessionAlreadyExists(String),

    // Ledger errors
    #[error("Transaction not confirmed in time: {0}")]
    ConfirmationTimeout(String),

    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    // Collaborator errors
    #[error("{service} call failed: {failure}")]
    Collaborator {
        service: String,
        failure: CollaboratorFailure,
    },

    // Request errors
    #[error("parameter {0} is missing")]
    MissingParameter(String),

    #[error("parameter {name} is invalid: {reason}")]
    InvalidParameter { name: String, reason: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing configuration field: {0}")]
    MissingConfig(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl AgentError {
    /// Build a collaborator error for `service`
    pub fn collaborator(service: &str, failure: CollaboratorFailure) -> Self {
        AgentError::Collaborator {
            service: service.to_string(),
            failure,
        }
    }

    /// Map a transport-level `reqwest` failure for `service`
    pub fn transport(service: &str, err: reqwest::Error) -> Self {
        Self::collaborator(service, CollaboratorFailure::Transport(err.to_string()))
    }

    /// Whether a retry wrapper may try the operation again
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Collaborator { failure, .. } => match failure {
                CollaboratorFailure::RateLimited { .. } | CollaboratorFailure::Transport(_) => true,
                CollaboratorFailure::Status(status) => *status >= 500,
                CollaboratorFailure::Schema(_) | CollaboratorFailure::Process(_) => false,
            },
            AgentError::ConfirmationTimeout(_) => true,
            _ => false,
        }
    }

    /// Minimum wait requested by a rate-limited collaborator
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            AgentError::Collaborator {
                failure: CollaboratorFailure::RateLimited { retry_after_ms },
                ..
            } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Result type alias for buyer agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
