//! Data structures for EBML documents.
//!
//! Element headers, schemas and their linked form, the parse trees produced by
//! a walk, and the bundled Matroska/WebM schema.

pub mod header;
pub mod matroska;
pub mod schema;
pub mod tree;
