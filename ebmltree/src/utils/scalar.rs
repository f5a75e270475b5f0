//! Decoders for scalar element bodies.
//!
//! Each decoder consumes exactly `len` bytes. A body whose width the type
//! cannot represent is still consumed and reported as a [`Fault`], leaving the
//! policy (log or fail) to the caller.

use anyhow::Result;

use crate::structs::schema::ScalarType;
use crate::structs::tree::Value;
use crate::utils::errors::truncated;
use crate::utils::source::ByteSource;

/// Stored in place of an unsigned integer wider than 8 bytes.
pub const UINT_FAULT: i64 = -1;

/// A body that was consumed but could not be decoded as its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    /// Value to store anyway, if the type defines one.
    pub fallback: Option<Value>,
}

pub type Decoded = std::result::Result<Value, Fault>;

/// Reads a `len` byte body and decodes it as `ty`.
pub fn read_value<S: ByteSource>(source: &mut S, ty: ScalarType, len: u64) -> Result<Decoded> {
    Ok(match ty {
        ScalarType::Uint => match read_uint(source, len)? {
            Some(v) => Ok(Value::Uint(v)),
            None => Err(Fault {
                fallback: Some(Value::Int(UINT_FAULT)),
            }),
        },
        ScalarType::Bool => match read_uint(source, len)? {
            Some(v) => Ok(Value::Bool(v == 1)),
            None => Err(Fault {
                fallback: Some(Value::Bool(false)),
            }),
        },
        ScalarType::Int => read_int(source, len)?
            .map(Value::Int)
            .ok_or(Fault { fallback: None }),
        ScalarType::Float => read_float(source, len)?
            .map(Value::Float)
            .ok_or(Fault { fallback: None }),
        ScalarType::Date => read_date(source, len)?
            .map(Value::Date)
            .ok_or(Fault { fallback: None }),
        ScalarType::Str => Ok(Value::Str(read_string(source, len)?)),
        ScalarType::Binary => Ok(Value::Binary(read_body(source, len)?)),
        ScalarType::Uid => Ok(Value::Uid(read_body(source, len)?)),
    })
}

/// Reads `len` raw bytes, failing before allocating if the stream is shorter.
pub fn read_body<S: ByteSource>(source: &mut S, len: u64) -> Result<Vec<u8>> {
    let offset = source.position()?;
    let available = source.available()?;
    if len > available {
        return Err(truncated(
            std::io::ErrorKind::UnexpectedEof.into(),
            offset,
            len,
            available,
        ));
    }

    let mut buf = vec![0u8; len as usize];
    source
        .read_exact(&mut buf)
        .map_err(|e| truncated(e, offset, len, available))?;

    Ok(buf)
}

fn read_small<S: ByteSource>(source: &mut S, len: u64) -> Result<Option<[u8; 8]>> {
    if len > 8 {
        let offset = source.position()?;
        let available = source.available()?;
        if len > available {
            return Err(truncated(
                std::io::ErrorKind::UnexpectedEof.into(),
                offset,
                len,
                available,
            ));
        }
        source.skip(len)?;
        return Ok(None);
    }

    let body = read_body(source, len)?;
    let mut buf = [0u8; 8];
    buf[8 - body.len()..].copy_from_slice(&body);

    Ok(Some(buf))
}

/// Big-endian magnitude of 0 to 8 bytes. `None` when wider.
pub fn read_uint<S: ByteSource>(source: &mut S, len: u64) -> Result<Option<u64>> {
    Ok(read_small(source, len)?.map(u64::from_be_bytes))
}

/// Big-endian two's complement of 0 to 8 bytes, sign extended.
pub fn read_int<S: ByteSource>(source: &mut S, len: u64) -> Result<Option<i64>> {
    Ok(read_small(source, len)?.map(|buf| {
        if len == 0 {
            return 0;
        }
        let shift = 64 - 8 * len as u32;
        ((u64::from_be_bytes(buf) << shift) as i64) >> shift
    }))
}

/// IEEE-754 float of 0, 4, 8 or 10 bytes.
///
/// A 10 byte body is decoded from its first 8 bytes as a 64-bit float; the
/// value is not an 80-bit extended float conversion.
pub fn read_float<S: ByteSource>(source: &mut S, len: u64) -> Result<Option<f64>> {
    match len {
        0 => Ok(Some(0.0)),
        4 => {
            let body = read_body(source, 4)?;
            Ok(Some(f32::from_be_bytes([body[0], body[1], body[2], body[3]]) as f64))
        }
        8 | 10 => {
            let body = read_body(source, len)?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&body[..8]);
            Ok(Some(f64::from_be_bytes(buf)))
        }
        _ => {
            read_body(source, len)?;
            Ok(None)
        }
    }
}

/// Signed nanoseconds since 2001-01-01, 0 or 8 bytes.
pub fn read_date<S: ByteSource>(source: &mut S, len: u64) -> Result<Option<i64>> {
    match len {
        0 => Ok(Some(0)),
        8 => read_int(source, 8),
        _ => {
            read_body(source, len)?;
            Ok(None)
        }
    }
}

/// UTF-8 text, discarding everything from the first NUL on.
pub fn read_string<S: ByteSource>(source: &mut S, len: u64) -> Result<String> {
    let body = read_body(source, len)?;
    let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());

    Ok(String::from_utf8_lossy(&body[..end]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::StreamError;
    use crate::utils::source::SliceSource;

    fn decode(ty: ScalarType, body: &[u8]) -> Result<Decoded> {
        let mut src = SliceSource::from_slice(body);
        let decoded = read_value(&mut src, ty, body.len() as u64)?;
        assert_eq!(src.position()?, body.len() as u64);
        Ok(decoded)
    }

    #[test]
    fn uint_widths() -> Result<()> {
        assert_eq!(decode(ScalarType::Uint, &[])?, Ok(Value::Uint(0)));
        assert_eq!(decode(ScalarType::Uint, &[0x07])?, Ok(Value::Uint(7)));
        assert_eq!(
            decode(ScalarType::Uint, &[0x0F, 0x42, 0x40])?,
            Ok(Value::Uint(1_000_000))
        );
        assert_eq!(
            decode(ScalarType::Uint, &[0xFF; 8])?,
            Ok(Value::Uint(u64::MAX))
        );

        Ok(())
    }

    #[test]
    fn uint_too_wide_is_consumed() -> Result<()> {
        assert_eq!(
            decode(ScalarType::Uint, &[1; 9])?,
            Err(Fault {
                fallback: Some(Value::Int(UINT_FAULT))
            })
        );

        Ok(())
    }

    #[test]
    fn int_sign_extension() -> Result<()> {
        assert_eq!(decode(ScalarType::Int, &[0xFF])?, Ok(Value::Int(-1)));
        assert_eq!(decode(ScalarType::Int, &[0x7F])?, Ok(Value::Int(127)));
        assert_eq!(decode(ScalarType::Int, &[0xFE, 0x00])?, Ok(Value::Int(-512)));
        assert_eq!(decode(ScalarType::Int, &[])?, Ok(Value::Int(0)));

        Ok(())
    }

    #[test]
    fn bool_is_exactly_one() -> Result<()> {
        assert_eq!(decode(ScalarType::Bool, &[1])?, Ok(Value::Bool(true)));
        assert_eq!(decode(ScalarType::Bool, &[0, 1])?, Ok(Value::Bool(true)));
        assert_eq!(decode(ScalarType::Bool, &[2])?, Ok(Value::Bool(false)));
        assert_eq!(decode(ScalarType::Bool, &[])?, Ok(Value::Bool(false)));

        Ok(())
    }

    #[test]
    fn float_widths() -> Result<()> {
        assert_eq!(
            decode(ScalarType::Float, &1.5f32.to_be_bytes())?,
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            decode(ScalarType::Float, &48000.0f64.to_be_bytes())?,
            Ok(Value::Float(48000.0))
        );

        let mut ten = 2.25f64.to_be_bytes().to_vec();
        ten.extend([0xAA, 0xBB]);
        assert_eq!(decode(ScalarType::Float, &ten)?, Ok(Value::Float(2.25)));

        assert_eq!(
            decode(ScalarType::Float, &[0; 3])?,
            Err(Fault { fallback: None })
        );

        Ok(())
    }

    #[test]
    fn float_zero_length_reads_nothing() -> Result<()> {
        let mut src = SliceSource::from_slice(&[0x42]);
        assert_eq!(read_float(&mut src, 0)?, Some(0.0));
        assert_eq!(src.position()?, 0);

        Ok(())
    }

    #[test]
    fn string_cut_at_first_nul() -> Result<()> {
        assert_eq!(
            decode(ScalarType::Str, b"webm\0\0\0")?,
            Ok(Value::Str("webm".into()))
        );
        assert_eq!(
            decode(ScalarType::Str, b"ab\0cd")?,
            Ok(Value::Str("ab".into()))
        );
        assert_eq!(
            decode(ScalarType::Str, "título".as_bytes())?,
            Ok(Value::Str("título".into()))
        );

        Ok(())
    }

    #[test]
    fn opaque_bytes_untouched() -> Result<()> {
        let raw = [0x00, 0xFF, 0x10];
        assert_eq!(decode(ScalarType::Binary, &raw)?, Ok(Value::Binary(raw.to_vec())));
        assert_eq!(decode(ScalarType::Uid, &raw)?, Ok(Value::Uid(raw.to_vec())));

        Ok(())
    }

    #[test]
    fn date_widths() -> Result<()> {
        let ns: i64 = -86_400_000_000_000;
        assert_eq!(
            decode(ScalarType::Date, &ns.to_be_bytes())?,
            Ok(Value::Date(ns))
        );
        assert_eq!(decode(ScalarType::Date, &[])?, Ok(Value::Date(0)));
        assert_eq!(
            decode(ScalarType::Date, &[0; 4])?,
            Err(Fault { fallback: None })
        );

        Ok(())
    }

    #[test]
    fn short_body_is_truncated() {
        let mut src = SliceSource::from_slice(b"abc");
        let err = read_value(&mut src, ScalarType::Str, 10).unwrap_err();

        assert_eq!(
            err.downcast_ref::<StreamError>(),
            Some(&StreamError::Truncated {
                offset: 0,
                needed: 10,
                available: 3
            })
        );
    }
}
