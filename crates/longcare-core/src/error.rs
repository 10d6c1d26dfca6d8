//! Error types for Longcare Core

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Expected, caller-facing outcomes
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // Multi-tenancy errors
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Invalid tenant: {0}")]
    InvalidTenant(String),

    // Mutation errors
    #[error("Concurrent modification: {0}")]
    ConcurrencyConflict(String),

    #[error("Mutation timed out after {0:?}")]
    Timeout(Duration),

    // Infrastructure errors
    #[error("Storage connectivity: {0}")]
    Connectivity(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is an expected caller-facing outcome rather than
    /// a server-side failure. Expected outcomes are logged at low severity.
    pub fn is_expected(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Validation(_))
    }
}
