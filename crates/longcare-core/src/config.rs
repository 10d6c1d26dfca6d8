//! Audit engine configuration

use std::time::Duration;

use crate::{Error, Result};

/// Configuration for the versioned mutation engine.
///
/// # Example
/// ```
/// use longcare_core::AuditConfig;
/// use std::time::Duration;
///
/// let config = AuditConfig::default()
///     .with_min_reason_len(15)
///     .with_mutation_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Minimum length (in characters, after trimming) of a change reason
    pub min_reason_len: usize,

    /// How many times a mutation transaction is retried when the version
    /// slot it picked was taken by a concurrent writer
    pub max_version_retries: u32,

    /// Upper bound on one mutation transaction; past it the transaction is
    /// aborted and rolled back, and the caller may retry the whole operation
    pub mutation_timeout: Duration,

    /// Whether record creation writes a version-1 CREATE history entry
    pub record_creations: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            min_reason_len: 10,
            max_version_retries: 3,
            mutation_timeout: Duration::from_secs(15),
            record_creations: false,
        }
    }
}

impl AuditConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum change-reason length
    pub fn with_min_reason_len(mut self, min_reason_len: usize) -> Self {
        self.min_reason_len = min_reason_len;
        self
    }

    /// Set the version-conflict retry budget
    pub fn with_max_version_retries(mut self, max_version_retries: u32) -> Self {
        self.max_version_retries = max_version_retries;
        self
    }

    /// Set the mutation transaction timeout
    pub fn with_mutation_timeout(mut self, mutation_timeout: Duration) -> Self {
        self.mutation_timeout = mutation_timeout;
        self
    }

    /// Enable or disable CREATE history entries
    pub fn with_record_creations(mut self, record_creations: bool) -> Self {
        self.record_creations = record_creations;
        self
    }

    /// Validate a change reason against this configuration.
    ///
    /// Runs before any transaction is opened, so a rejected reason never
    /// touches the store.
    pub fn validate_reason(&self, reason: &str) -> Result<()> {
        let trimmed = reason.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("Change reason is required".to_string()));
        }
        let len = trimmed.chars().count();
        if len < self.min_reason_len {
            return Err(Error::Validation(format!(
                "Change reason must be at least {} characters, got {}",
                self.min_reason_len, len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_boundary() {
        let config = AuditConfig::default().with_min_reason_len(10);

        // One below the minimum fails, at the minimum succeeds
        assert!(config.validate_reason("123456789").is_err());
        assert!(config.validate_reason("1234567890").is_ok());
    }

    #[test]
    fn test_reason_trimmed_before_counting() {
        let config = AuditConfig::default().with_min_reason_len(5);
        assert!(config.validate_reason("   ab   ").is_err());
        assert!(config.validate_reason("  abcde  ").is_ok());
    }

    #[test]
    fn test_empty_reason_rejected() {
        let config = AuditConfig::default();
        assert!(matches!(
            config.validate_reason(""),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            config.validate_reason("   "),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_reason_counts_chars_not_bytes() {
        let config = AuditConfig::default().with_min_reason_len(10);
        // 10 accented characters, more than 10 bytes
        assert!(config.validate_reason("áéíóúâêôãç").is_ok());
    }
}
