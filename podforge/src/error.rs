//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("{service}: transient failure: {message}")]
    ProviderTransient { service: String, message: String },

    #[error("{service}: authentication rejected")]
    ProviderUnauthorized { service: String },

    #[error("{service}: rate limited")]
    ProviderRateLimited { service: String },

    #[error("{service}: rejected request: {message}")]
    ProviderRejected { service: String, message: String },

    #[error("{operation}: all {attempted} candidates failed, last error: {last_error}")]
    AllCandidatesFailed {
        operation: String,
        attempted: usize,
        last_error: String,
    },

    #[error("Highlight duration {seconds:.1}s outside allowed range 2-60s")]
    DurationConstraint { seconds: f64 },

    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Map an error to the message persisted on a task record.
    ///
    /// Raw provider payloads never reach the caller; they are logged with
    /// full context at the failure site instead.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => format!("Invalid input: {msg}"),
            Self::DurationConstraint { seconds } => {
                format!("Highlight duration {seconds:.1}s is outside the allowed 2-60s range")
            }
            Self::Timeout { operation } => {
                format!("{operation} did not finish in time")
            }
            Self::ProviderUnauthorized { service } => {
                format!("The {service} service rejected our credentials")
            }
            Self::ProviderRateLimited { service } => {
                format!("The {service} service is over its usage quota")
            }
            Self::ProviderTransient { service, .. } | Self::ProviderRejected { service, .. } => {
                format!("The {service} service is currently unavailable")
            }
            Self::AllCandidatesFailed { operation, .. } => {
                format!("{operation} failed after trying every configured provider")
            }
            Self::NotFound { entity_type, .. } => format!("{entity_type} not found"),
            Self::Validation(msg) => msg.clone(),
            _ => "An internal error occurred while processing the request".to_string(),
        }
    }
}
