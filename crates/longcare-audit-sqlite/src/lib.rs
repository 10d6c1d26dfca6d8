//! SQLite-backed governed record storage
//!
//! This crate implements the `GovernedStore` trait over SQLite for embedded
//! single-node deployments (one facility running on-premise) and for tests.
//! Tenant isolation is physical: each tenant gets its own database file
//! under a base directory, or its own in-memory database in test mode.
//!
//! Semantics match the PostgreSQL backend: every update/delete pairs with
//! exactly one history entry in the same transaction, and version numbers
//! are gapless per record. SQLite has no row-level locks, so the version
//! race is resolved by a bounded compare-and-retry loop on the
//! (tenant, record, version) uniqueness constraint.

mod router;
mod schema;
mod sqlite_governed_store;

pub use router::SqliteTenantRouter;
pub use sqlite_governed_store::SqliteGovernedStore;
