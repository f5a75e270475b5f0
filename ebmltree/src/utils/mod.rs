//! Utility functions and supporting infrastructure.
//!
//! Provides byte sources, VINT decoding, scalar body decoding and error types.

pub mod errors;
pub mod scalar;
pub mod source;
pub mod vint;

#[cfg(test)]
pub(crate) mod fixtures;
