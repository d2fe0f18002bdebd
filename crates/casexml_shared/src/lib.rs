//! Shared functionality
//!
//! Error types, the result alias and source locations used by all casexml crates.
//!

pub mod errors;
pub mod location;
pub mod types;
