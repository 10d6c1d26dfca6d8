//! Request-scoped context propagation
//!
//! Binds {request_id, tenant_id, user_id} plus client metadata to the logical
//! execution of one request, so that storage and observability code can pick
//! them up without explicit parameter threading.
//!
//! The context rides on a tokio task-local scope: it follows the request
//! through every awaited sub-operation, and two requests interleaving on the
//! same worker threads each see only their own context. Fields resolved
//! mid-request (the user id is typically known only after authentication)
//! are written through a shared cell and become visible to code that runs
//! later in the same request.
//!
//! Reading the context outside any bound scope yields an empty default:
//! background jobs and shutdown paths must be able to call [`current`]
//! without risk of a panic.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, RwLock};

use crate::tenant::TenantId;

/// Correlation data for one logical request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Request correlation ID
    pub request_id: Option<String>,
    /// Tenant the request operates on
    pub tenant_id: Option<TenantId>,
    /// Authenticated user, once known
    pub user_id: Option<String>,
    /// Client IP as reported by the boundary layer
    pub client_ip: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Create a context with a fresh random request ID
    pub fn new() -> Self {
        Self {
            request_id: Some(uuid::Uuid::new_v4().to_string()),
            ..Self::default()
        }
    }

    /// Set the tenant ID
    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Set the user ID
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set client metadata
    pub fn with_client(
        mut self,
        client_ip: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        self.client_ip = Some(client_ip.into());
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Shared cell holding the context for one request scope.
///
/// Cloned handles refer to the same cell, so updates made deeper in the
/// request are observed by everything still running under the same scope.
#[derive(Clone)]
struct Scope(Arc<RwLock<RequestContext>>);

tokio::task_local! {
    static CURRENT: Scope;
}

/// Run `fut` with `seed` bound as the request context for its full dynamic
/// extent, including every awaited sub-operation.
pub async fn with_context<F>(seed: RequestContext, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT
        .scope(Scope(Arc::new(RwLock::new(seed))), fut)
        .await
}

/// Snapshot of the currently bound request context.
///
/// Returns `RequestContext::default()` when called outside any bound scope
/// (e.g. from a background job). Never panics.
pub fn current() -> RequestContext {
    CURRENT
        .try_with(|scope| scope.0.read().map(|ctx| ctx.clone()).unwrap_or_default())
        .unwrap_or_default()
}

/// Record the authenticated user on the current request scope.
///
/// No-op outside a bound scope.
pub fn set_user_id(user_id: impl Into<String>) {
    let user_id = user_id.into();
    update(move |ctx| ctx.user_id = Some(user_id));
}

/// Record the resolved tenant on the current request scope.
///
/// No-op outside a bound scope.
pub fn set_tenant_id(tenant_id: TenantId) {
    update(move |ctx| ctx.tenant_id = Some(tenant_id));
}

/// Record client metadata on the current request scope.
///
/// No-op outside a bound scope.
pub fn set_client_meta(client_ip: impl Into<String>, user_agent: impl Into<String>) {
    let client_ip = client_ip.into();
    let user_agent = user_agent.into();
    update(move |ctx| {
        ctx.client_ip = Some(client_ip);
        ctx.user_agent = Some(user_agent);
    });
}

fn update(f: impl FnOnce(&mut RequestContext)) {
    let _ = CURRENT.try_with(|scope| {
        if let Ok(mut ctx) = scope.0.write() {
            f(&mut ctx);
        }
    });
}
