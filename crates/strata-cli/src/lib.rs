//! Strata CLI library
//!
//! Command definitions and output rendering for the `strata` binary.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use error::CliError;
