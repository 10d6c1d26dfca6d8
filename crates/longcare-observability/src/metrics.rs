//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for the Longcare storage layer:
//! - Data operation counts and latency histograms (by entity and operation)
//! - Slow-operation counts (by severity)
//! - History entries written (by entity and change type)
//! - Version-slot conflicts and retries

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector for the governed stores
#[derive(Clone)]
pub struct AuditMetrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    // Operation metrics
    /// Total data operations (entity, operation)
    pub operations_total: CounterVec,
    /// Data operation duration (entity, operation)
    pub operation_duration_seconds: HistogramVec,
    /// Operations that exceeded a slow threshold (entity, operation, severity)
    pub slow_operations_total: CounterVec,

    // Audit trail metrics
    /// History entries written (entity, change_type)
    pub history_entries_total: CounterVec,
    /// Version-slot conflicts that triggered a transaction retry (entity)
    pub version_conflicts_total: CounterVec,
}

impl AuditMetrics {
    /// Create and register all metrics on a fresh registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = CounterVec::new(
            Opts::new("longcare_operations_total", "Total data operations"),
            &["entity", "operation"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "longcare_operation_duration_seconds",
                "Data operation duration",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["entity", "operation"],
        )?;
        registry.register(Box::new(operation_duration_seconds.clone()))?;

        let slow_operations_total = CounterVec::new(
            Opts::new(
                "longcare_slow_operations_total",
                "Operations that exceeded a slow threshold",
            ),
            &["entity", "operation", "severity"],
        )?;
        registry.register(Box::new(slow_operations_total.clone()))?;

        let history_entries_total = CounterVec::new(
            Opts::new(
                "longcare_history_entries_total",
                "Audit history entries written",
            ),
            &["entity", "change_type"],
        )?;
        registry.register(Box::new(history_entries_total.clone()))?;

        let version_conflicts_total = CounterVec::new(
            Opts::new(
                "longcare_version_conflicts_total",
                "Version-slot conflicts that triggered a retry",
            ),
            &["entity"],
        )?;
        registry.register(Box::new(version_conflicts_total.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            operation_duration_seconds,
            slow_operations_total,
            history_entries_total,
            version_conflicts_total,
        })
    }

    /// The underlying registry, for exposition
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
