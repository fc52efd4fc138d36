//! Shared types and utilities for numacopy
//!
//! This crate contains the data model used across the GPU runtime layer, the
//! benchmark core and the command-line front end: measurement cases, their
//! lifecycle stages, outcomes and running statistics.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{case::*, result::*, stats::*};
