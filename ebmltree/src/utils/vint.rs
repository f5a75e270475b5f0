//! Variable-width integers (VINT).
//!
//! The number of leading zero bits in the first octet, plus one, gives the
//! total width. Element ids keep the marker bit as part of their value, sizes
//! clear it before reading the remaining bits as a big-endian magnitude.

use anyhow::{Result, bail};

use crate::utils::errors::{VintError, truncated};
use crate::utils::source::ByteSource;

pub const MAX_VINT_WIDTH: u8 = 8;

/// One raw VINT as it appeared in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vint {
    /// Big-endian value of all octets, marker bit included.
    pub raw: u64,
    /// Encoded width in octets (1..=8).
    pub width: u8,
}

impl Vint {
    /// Reads one VINT of at most `max_octets` octets.
    ///
    /// Returns `Ok(None)` when the stream ends before the first octet.
    pub fn read<S: ByteSource>(source: &mut S, max_octets: u8) -> Result<Option<Self>> {
        if max_octets == 0 || max_octets > MAX_VINT_WIDTH {
            bail!(VintError::InvalidMaxWidth(max_octets));
        }

        let Some(first) = source.peek_u8()? else {
            return Ok(None);
        };

        let offset = source.position()?;
        let width = first.leading_zeros() + 1;
        if width > max_octets as u32 {
            bail!(VintError::MarkerNotFound { max_octets, offset });
        }

        let mut buf = [0u8; MAX_VINT_WIDTH as usize];
        let buf = &mut buf[..width as usize];
        if let Err(e) = source.read_exact(buf) {
            let available = source.available()?;
            return Err(truncated(e, offset, width as u64, available));
        }

        let raw = buf.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);

        Ok(Some(Self {
            raw,
            width: width as u8,
        }))
    }

    #[inline]
    fn marker(&self) -> u64 {
        1u64 << (7 * self.width as u32)
    }

    /// Value as an element id: the marker bit is kept.
    #[inline]
    pub fn as_id(&self) -> u64 {
        self.raw
    }

    /// Value as an element size: the marker bit is cleared.
    #[inline]
    pub fn magnitude(&self) -> u64 {
        self.raw & !self.marker()
    }

    /// All magnitude bits set, the reserved "unknown size" pattern.
    #[inline]
    pub fn is_all_ones(&self) -> bool {
        self.magnitude() == self.marker() - 1
    }
}

/// Decodes one VINT, returning `(value, octet_count)`.
///
/// `as_size` selects whether the marker bit is cleared (sizes) or kept (ids).
pub fn decode<S: ByteSource>(
    source: &mut S,
    max_octets: u8,
    as_size: bool,
) -> Result<Option<(u64, u8)>> {
    Ok(Vint::read(source, max_octets)?.map(|vint| {
        let value = if as_size {
            vint.magnitude()
        } else {
            vint.as_id()
        };
        (value, vint.width)
    }))
}
