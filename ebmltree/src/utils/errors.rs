use std::io;

/// Reports a tolerated fault, or returns it as an error once its severity
/// reaches the configured `fail_level`.
#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum VintError {
    #[error("VINT width marker not found within {max_octets} octets at offset {offset}")]
    MarkerNotFound { max_octets: u8, offset: u64 },

    #[error("VINT width must be between 1 and 8 octets. Got {0}")]
    InvalidMaxWidth(u8),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream truncated at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
    },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Duplicate element id {id:#X} under {parent}: {first} and {second}")]
    DuplicateSiblingId {
        id: u64,
        parent: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("Schema root must be a container, {0} is a scalar")]
    ScalarRoot(&'static str),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum WalkError {
    #[error(
        "{path} at offset {offset} declares {declared} bytes but only {available} remain in its parent"
    )]
    BoundViolation {
        path: String,
        offset: u64,
        declared: u64,
        available: u64,
    },

    #[error("Nesting deeper than {max_depth} containers at {path}")]
    MaxDepthExceeded { path: String, max_depth: usize },

    #[error("Cannot walk {0}: not a container")]
    NotAContainer(String),

    #[error("Element {id:#X} at offset {offset} has unknown size and no enclosing bound")]
    UnboundedElement { id: u64, offset: u64 },

    #[error("Unsigned integer {path} is {length} bytes wide, at most 8 are supported")]
    UintTooWide { path: String, length: u64 },

    #[error("Signed integer {path} is {length} bytes wide, at most 8 are supported")]
    IntTooWide { path: String, length: u64 },

    #[error("Float {path} has unsupported width {length}")]
    FloatWidth { path: String, length: u64 },

    #[error("Date {path} has unsupported width {length}")]
    DateWidth { path: String, length: u64 },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MatroskaError {
    #[error("Not an EBML document: missing EBML header")]
    MissingEbmlHeader,

    #[error("Unsupported document type {0:?}, expected matroska or webm")]
    UnsupportedDocType(String),
}

/// Turns an `UnexpectedEof` from the byte source into [`StreamError::Truncated`].
pub(crate) fn truncated(err: io::Error, offset: u64, needed: u64, available: u64) -> anyhow::Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        anyhow::Error::new(StreamError::Truncated {
            offset,
            needed,
            available,
        })
    } else {
        anyhow::Error::new(err)
    }
}
