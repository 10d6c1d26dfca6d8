//! Longcare Tenancy
//!
//! Tenant registry and per-tenant connection routing for the PostgreSQL
//! backend. Each tenant's data lives in its own schema; a router caches one
//! lazily-created pool per tenant, with connections pinned to the tenant's
//! schema, so per-request client construction never happens.

pub mod config;
pub mod registry;
pub mod router;

pub use config::TenancyConfig;
pub use registry::{TenantRegistry, TenantRecord};
pub use router::PgTenantRouter;
