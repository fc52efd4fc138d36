//! Data model for measurement cases and their results

pub mod case;
pub mod result;
pub mod stats;
