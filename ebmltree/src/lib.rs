#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! EBML (Extensible Binary Meta Language) is a binary tree format. Every
//! element is a header followed by a body:
//!
//! - **Id**: a VINT whose marker bit is part of the value, 1 to 4 octets by default.
//! - **Size**: a VINT with the marker bit cleared, 1 to 8 octets by default. A
//!   size with all value bits set is *unknown*: the element runs until the end
//!   of its parent.
//! - **Body**: either a scalar (integers, floats, strings, dates, opaque bytes)
//!   or a sequence of child elements.
//!
//! Matroska and WebM are EBML documents with an `EBML` header followed by a
//! `Segment`.
//!
//! ### Parsing Model
//!
//! A schema ([`structs::schema::ElementDef`]) describes which ids may appear
//! under which container, and with which value type. It is linked once into a
//! [`structs::schema::Schema`] and then shared. A [`process::walk::Walker`] reads
//! elements from a [`utils::source::ByteSource`], consults a
//! [`process::listener::Listener`] for every element it recognizes, and builds a
//! [`structs::tree::ParseTree`] per container level. Unknown elements are
//! skipped and counted as padding.
//!
//! ## Quick Start
//!
//! ```rust
//! use ebmltree::process::EXAMPLE_DATA;
//! use ebmltree::structs::matroska::{self, MatroskaMetadata, ReadOptions};
//! use ebmltree::utils::source::SliceSource;
//!
//! let schema = matroska::schema()?;
//! let mut source = SliceSource::from_slice(EXAMPLE_DATA);
//!
//! let metadata = MatroskaMetadata::read(&mut source, &schema, &ReadOptions::default())?;
//!
//! assert_eq!(metadata.doc_type, "webm");
//! for track in &metadata.tracks {
//!     println!("{:?} {} {:?}", track.number, track.kind, track.codec);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Listener protocol and tree walking.
///
/// 1. **Listener** ([`process::listener`]): per-element decisions and value callbacks.
///
/// 2. **Walker** ([`process::walk`]): the parse session turning bytes into trees.
pub mod process;

/// Data structures representing EBML documents.
///
/// - **Headers** ([`structs::header`]): element id and size
/// - **Schemas** ([`structs::schema`]): element definitions and linking
/// - **Trees** ([`structs::tree`]): parse results and typed conversions
/// - **Matroska** ([`structs::matroska`]): Matroska/WebM schema and metadata
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Byte sources** ([`utils::source`]): forward-only input
/// - **VINT** ([`utils::vint`]): variable-length integers
/// - **Scalars** ([`utils::scalar`]): element body decoding
/// - **Error Handling** ([`utils::errors`]): error types
pub mod utils;
