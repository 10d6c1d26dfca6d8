//! PostgreSQL-backed governed record storage for multi-tenant deployments
//!
//! This crate implements the `GovernedStore` trait using PostgreSQL with one
//! schema per tenant. Connections arrive through the tenant router already
//! pinned to the tenant's schema, and every query still binds the tenant id
//! explicitly.
//!
//! # Features
//! - One atomic transaction pairs each record mutation with its history entry
//! - `SELECT ... FOR UPDATE` serializes concurrent mutations of one record,
//!   so version numbers are gapless and strictly increasing
//! - Versioned per-tenant schema migrations, applied on first touch
//! - Soft deletes only; history rows are never updated or deleted
//!
//! # Example
//! ```no_run
//! # use longcare_audit_postgres::PostgresGovernedStore;
//! # use longcare_tenancy::{PgTenantRouter, TenancyConfig};
//! # async fn example() -> longcare_core::Result<()> {
//! let router = PgTenantRouter::connect(TenancyConfig::new("postgres://localhost/longcare")).await?;
//! let store = PostgresGovernedStore::new(router);
//! # Ok(())
//! # }
//! ```

mod migrations;
mod postgres_governed_store;

pub use postgres_governed_store::PostgresGovernedStore;
