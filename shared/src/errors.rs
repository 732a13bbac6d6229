//! Shared error types for the service contract

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service is not running")]
    NotRunning,

    #[error("Service already started")]
    AlreadyStarted,

    #[error("Unknown scheduler: {name}")]
    UnknownScheduler { name: String },

    #[error("Resource not found: {path}")]
    NotFound { path: String },

    #[error("Event bus closed")]
    BusClosed,

    #[error("Listener probe failed: {listener}: {message}")]
    ProbeFailed { listener: String, message: String },

    #[error("Trigger rejected: {message}")]
    TriggerRejected { message: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
