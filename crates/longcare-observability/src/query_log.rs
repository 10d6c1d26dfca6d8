//! Correlated query logging and slow-operation detection
//!
//! Every data operation is wrapped by [`QueryObserver::observe`], which times
//! the operation and emits a structured event carrying the ambient request
//! correlation ({request_id, tenant_id, user_id}). Operations exceeding the
//! configured thresholds additionally log the query *shape*: filter,
//! projection, sort and pagination field names. Literal parameter values
//! never reach a log sink: resident data is personal data.
//!
//! The observer is a bystander: it returns the wrapped future's output
//! untouched, and a fault inside the logging path is contained rather than
//! propagated into the operation.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use longcare_core::context;

use crate::metrics::AuditMetrics;

/// Thresholds for slow-operation detection.
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// Operations slower than this log a warning with shape metadata
    pub slow_threshold: Duration,
    /// Operations slower than this log an error with shape metadata
    pub very_slow_threshold: Duration,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            slow_threshold: Duration::from_millis(200),
            very_slow_threshold: Duration::from_secs(1),
        }
    }
}

impl ObserverConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slow-operation threshold
    pub fn with_slow_threshold(mut self, slow_threshold: Duration) -> Self {
        self.slow_threshold = slow_threshold;
        self
    }

    /// Set the very-slow-operation threshold
    pub fn with_very_slow_threshold(mut self, very_slow_threshold: Duration) -> Self {
        self.very_slow_threshold = very_slow_threshold;
        self
    }
}

/// Client-safe description of a query's shape.
///
/// Only field names, never the values bound to them.
#[derive(Debug, Clone, Default)]
pub struct QueryShape {
    /// Fields the operation filters on
    pub filter: Vec<&'static str>,
    /// Fields the operation returns (empty = whole record)
    pub projection: Vec<&'static str>,
    /// Sort expression, if any
    pub sort: Option<&'static str>,
    /// Page size, if paginated
    pub limit: Option<u32>,
    /// Page offset, if paginated
    pub offset: Option<u32>,
}

impl QueryShape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: &[&'static str]) -> Self {
        self.filter = filter.to_vec();
        self
    }

    pub fn with_projection(mut self, projection: &[&'static str]) -> Self {
        self.projection = projection.to_vec();
        self
    }

    pub fn with_sort(mut self, sort: &'static str) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_pagination(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
}

/// One observed data operation, as handed to a custom sink.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub request_id: Option<String>,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub entity: &'static str,
    pub operation: &'static str,
    pub duration_ms: u64,
}

type Sink = Arc<dyn Fn(&QueryRecord) + Send + Sync>;

/// Wraps data operations with correlated structured logs, slow-operation
/// detection and metrics.
#[derive(Clone)]
pub struct QueryObserver {
    config: ObserverConfig,
    metrics: Option<AuditMetrics>,
    sink: Option<Sink>,
}

impl QueryObserver {
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            config,
            metrics: None,
            sink: None,
        }
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: AuditMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Attach an additional structured sink (beyond tracing)
    pub fn with_sink(mut self, sink: impl Fn(&QueryRecord) + Send + Sync + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// The attached metrics collector, if any
    pub fn metrics(&self) -> Option<&AuditMetrics> {
        self.metrics.as_ref()
    }

    /// Run `fut`, then emit a correlated log entry for it.
    ///
    /// The output passes through unchanged and the logging path is fault-
    /// contained: a panic in a sink is swallowed (with a best-effort
    /// diagnostic) instead of failing the observed operation.
    pub async fn observe<F, T>(
        &self,
        entity: &'static str,
        operation: &'static str,
        shape: QueryShape,
        fut: F,
    ) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let output = fut.await;
        let elapsed = started.elapsed();

        let contained = catch_unwind(AssertUnwindSafe(|| {
            self.emit(entity, operation, &shape, elapsed);
        }));
        if contained.is_err() {
            tracing::debug!(entity, operation, "query log sink panicked; suppressed");
        }

        output
    }

    fn emit(&self, entity: &'static str, operation: &'static str, shape: &QueryShape, elapsed: Duration) {
        let ctx = context::current();
        let tenant = ctx.tenant_id.map(|t| t.to_string());
        let duration_ms = elapsed.as_millis() as u64;

        if let Some(metrics) = &self.metrics {
            metrics
                .operations_total
                .with_label_values(&[entity, operation])
                .inc();
            metrics
                .operation_duration_seconds
                .with_label_values(&[entity, operation])
                .observe(elapsed.as_secs_f64());
        }

        if elapsed >= self.config.very_slow_threshold {
            if let Some(metrics) = &self.metrics {
                metrics
                    .slow_operations_total
                    .with_label_values(&[entity, operation, "critical"])
                    .inc();
            }
            tracing::error!(
                request_id = ctx.request_id.as_deref(),
                tenant_id = tenant.as_deref(),
                user_id = ctx.user_id.as_deref(),
                entity,
                operation,
                duration_ms,
                filter = ?shape.filter,
                projection = ?shape.projection,
                sort = shape.sort,
                limit = shape.limit,
                offset = shape.offset,
                "critically slow data operation"
            );
        } else if elapsed >= self.config.slow_threshold {
            if let Some(metrics) = &self.metrics {
                metrics
                    .slow_operations_total
                    .with_label_values(&[entity, operation, "warning"])
                    .inc();
            }
            tracing::warn!(
                request_id = ctx.request_id.as_deref(),
                tenant_id = tenant.as_deref(),
                user_id = ctx.user_id.as_deref(),
                entity,
                operation,
                duration_ms,
                filter = ?shape.filter,
                projection = ?shape.projection,
                sort = shape.sort,
                limit = shape.limit,
                offset = shape.offset,
                "slow data operation"
            );
        } else {
            tracing::debug!(
                request_id = ctx.request_id.as_deref(),
                tenant_id = tenant.as_deref(),
                user_id = ctx.user_id.as_deref(),
                entity,
                operation,
                duration_ms,
                "data operation"
            );
        }

        if let Some(sink) = &self.sink {
            sink(&QueryRecord {
                request_id: ctx.request_id.clone(),
                tenant_id: tenant,
                user_id: ctx.user_id.clone(),
                entity,
                operation,
                duration_ms,
            });
        }
    }
}

impl Default for QueryObserver {
    fn default() -> Self {
        Self::new(ObserverConfig::default())
    }
}
