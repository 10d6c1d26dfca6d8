//! End-to-end integration tests for Longcare
//!
//! These tests wire the tenant router, request context, query observer and
//! the SQLite governed store together to verify the full mutation and audit
//! flow the way a request would drive it.
