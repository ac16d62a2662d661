//! Configuration types for Strata.
//!
//! This crate provides the database manager configuration, its validation,
//! and loading from `strata.yaml` files with environment overrides.

pub mod duration;
pub mod env;
pub mod loader;
pub mod types;
pub mod validate;

#[cfg(test)]
mod integration_test;

pub use env::*;
pub use loader::*;
pub use types::*;
