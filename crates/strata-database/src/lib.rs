//! Primary/replica database access for Strata.
//!
//! [`DbManager`] opens one pool per data source, routes reads to weighted
//! replicas and writes to the primary, runs closure-scoped transactions and
//! tracks per-source health and pool statistics.

pub mod database;

pub use database::*;
