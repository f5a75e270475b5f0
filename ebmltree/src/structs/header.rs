//! Element headers: one id VINT followed by one size VINT.

use std::fmt::{Display, Formatter};

use anyhow::{Result, bail};
use log::trace;

use crate::utils::errors::StreamError;
use crate::utils::source::ByteSource;
use crate::utils::vint::Vint;

/// Default maximum id width in octets (`EBMLMaxIDLength`).
pub const DEFAULT_MAX_ID_WIDTH: u8 = 4;

/// Default maximum size width in octets (`EBMLMaxSizeLength`).
pub const DEFAULT_MAX_SIZE_WIDTH: u8 = 8;

/// Id of the EBML `Void` element, used for padding.
pub const VOID_ID: u64 = 0xEC;

/// Declared body length of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementSize {
    Known(u64),
    /// Extends until the end of the enclosing container.
    Unknown,
}

impl ElementSize {
    pub fn known(&self) -> Option<u64> {
        match self {
            Self::Known(len) => Some(*len),
            Self::Unknown => None,
        }
    }
}

impl Display for ElementSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(len) => write!(f, "{len}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    /// Element id with its marker bit.
    pub id: u64,
    pub size: ElementSize,
    /// Offset of the first id octet.
    pub offset: u64,
    /// Octets taken by the id and size fields together.
    pub header_len: u8,
}

impl ElementHeader {
    /// Reads one header from the current position.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly before the id. A stream
    /// that ends between the id and the size is truncated.
    pub fn read<S: ByteSource>(
        source: &mut S,
        max_id_width: u8,
        max_size_width: u8,
    ) -> Result<Option<Self>> {
        let offset = source.position()?;

        let Some(id) = Vint::read(source, max_id_width)? else {
            return Ok(None);
        };

        let Some(size) = Vint::read(source, max_size_width)? else {
            bail!(StreamError::Truncated {
                offset: source.position()?,
                needed: 1,
                available: 0,
            });
        };

        let header = Self {
            id: id.as_id(),
            size: if size.is_all_ones() {
                ElementSize::Unknown
            } else {
                ElementSize::Known(size.magnitude())
            },
            offset,
            header_len: id.width + size.width,
        };

        trace!(
            "Element header: id={:#X} size={} at {}",
            header.id, header.size, header.offset
        );

        Ok(Some(header))
    }

    /// Offset of the first body octet.
    pub fn body_offset(&self) -> u64 {
        self.offset + self.header_len as u64
    }

    /// Offset just past the body, if the size is known.
    pub fn end(&self) -> Option<u64> {
        self.size.known().map(|len| self.body_offset() + len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::VintError;
    use crate::utils::fixtures::{element, element_unknown_size};
    use crate::utils::source::SliceSource;

    #[test]
    fn reads_id_and_size() -> Result<()> {
        let bytes = element(0x1A45_DFA3, &[0; 3]);
        let mut src = SliceSource::from_slice(&bytes);

        let header = ElementHeader::read(&mut src, 4, 8)?.unwrap();
        assert_eq!(header.id, 0x1A45_DFA3);
        assert_eq!(header.size, ElementSize::Known(3));
        assert_eq!(header.header_len, 5);
        assert_eq!(header.end(), Some(8));
        assert_eq!(src.position()?, 5);

        Ok(())
    }

    #[test]
    fn unknown_size_marker() -> Result<()> {
        let bytes = element_unknown_size(0x1853_8067, &[]);
        let mut src = SliceSource::from_slice(&bytes);

        let header = ElementHeader::read(&mut src, 4, 8)?.unwrap();
        assert_eq!(header.size, ElementSize::Unknown);
        assert_eq!(header.end(), None);

        Ok(())
    }

    #[test]
    fn widths_are_independent() {
        // 2-octet size against a 1-octet size limit
        let bytes = [0x81, 0x40, 0x02];
        let mut src = SliceSource::from_slice(&bytes);

        let err = ElementHeader::read(&mut src, 4, 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VintError>(),
            Some(VintError::MarkerNotFound { max_octets: 1, offset: 1 })
        ));
    }

    #[test]
    fn eof_between_id_and_size() {
        let mut src = SliceSource::from_slice(&[0xEC]);

        let err = ElementHeader::read(&mut src, 4, 8).unwrap_err();
        assert!(err.downcast_ref::<StreamError>().is_some());
    }

    #[test]
    fn clean_end() -> Result<()> {
        let mut src = SliceSource::default();
        assert_eq!(ElementHeader::read(&mut src, 4, 8)?, None);
        Ok(())
    }
}
