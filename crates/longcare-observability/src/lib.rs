//! Longcare Observability
//!
//! This crate provides observability features for the storage layer:
//! - Correlated structured logging for every data operation
//! - Slow-operation detection with client-safe shape metadata
//! - Metrics collection (Prometheus)

pub mod metrics;
pub mod query_log;

pub use metrics::AuditMetrics;
pub use query_log::{ObserverConfig, QueryObserver, QueryShape};
