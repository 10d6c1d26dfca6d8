//! Tenancy configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use longcare_core::{Error, Result};

/// Configuration for the tenant connection router.
///
/// The base database URL is required: a deployment without it must fail at
/// startup, not on the first request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// Base PostgreSQL connection string (server, credentials, database)
    pub database_url: String,

    /// Prefix for per-tenant schema names
    #[serde(default = "default_schema_prefix")]
    pub schema_prefix: String,

    /// Maximum connections per tenant pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections per tenant pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Timeout for acquiring a connection from a tenant pool
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_schema_prefix() -> String {
    "tenant_".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    0
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

impl TenancyConfig {
    /// Create a configuration for the given base database URL
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            schema_prefix: default_schema_prefix(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }

    /// Set the per-tenant schema prefix
    pub fn with_schema_prefix(mut self, schema_prefix: impl Into<String>) -> Self {
        self.schema_prefix = schema_prefix.into();
        self
    }

    /// Set maximum connections per tenant pool
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set minimum connections per tenant pool
    pub fn with_min_connections(mut self, min_connections: u32) -> Self {
        self.min_connections = min_connections;
        self
    }

    /// Timeout for acquiring a connection
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Validate the configuration. Called once at startup; an invalid base
    /// configuration is fatal there rather than on the first request.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config(
                "Tenancy base database URL is not configured".to_string(),
            ));
        }
        if !self
            .schema_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::Config(format!(
                "Schema prefix must be alphanumeric/underscore: {:?}",
                self.schema_prefix
            )));
        }
        if self.max_connections == 0 {
            return Err(Error::Config(
                "Tenant pools need at least one connection".to_string(),
            ));
        }
        Ok(())
    }
}
