//! Pull-based byte sources for element parsing.
//!
//! The walker only ever moves forward: it peeks one byte to find VINT widths,
//! reads element headers and scalar bodies, and skips everything else.

use std::io;
use std::io::{Seek, SeekFrom};

use bitstream_io::{BigEndian, BitRead, BitReader};

/// Forward-only byte source consumed by the parser.
///
/// End of stream at an element boundary is reported by [`ByteSource::peek_u8`]
/// returning `None`. A short [`ByteSource::read_exact`] is an `UnexpectedEof`
/// error, while [`ByteSource::skip`] stops at the end and reports how far it got.
pub trait ByteSource {
    /// Absolute byte offset of the next byte to be read.
    fn position(&mut self) -> io::Result<u64>;

    /// Bytes left before the end of the stream.
    fn available(&mut self) -> io::Result<u64>;

    /// Returns the next byte without consuming it, `None` at end of stream.
    fn peek_u8(&mut self) -> io::Result<Option<u8>>;

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Skips up to `n` bytes, returning the number actually skipped.
    fn skip(&mut self, n: u64) -> io::Result<u64>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn position(&mut self) -> io::Result<u64> {
        (**self).position()
    }

    fn available(&mut self) -> io::Result<u64> {
        (**self).available()
    }

    fn peek_u8(&mut self) -> io::Result<Option<u8>> {
        (**self).peek_u8()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_exact(buf)
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        (**self).skip(n)
    }
}

/// [`ByteSource`] over a `bitstream_io` reader.
///
/// The position is tracked here rather than asked of the reader, and a peeked
/// byte is held until consumed, so the only seeks issued are the relative
/// ones in [`ByteSource::skip`]. A `BufReader` underneath keeps its buffer
/// across those.
#[derive(Debug)]
pub struct BitstreamIoSource<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    pos: u64,
    end: u64,
    peeked: Option<u8>,
}

pub type SliceSource<'a> = BitstreamIoSource<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoSource<R>
where
    R: io::Read + io::Seek,
{
    /// Wraps `read` positioned at offset 0, treating absolute offset `end` as
    /// the end of the stream.
    pub fn new(read: R, end: u64) -> Self {
        Self::at(read, 0, end)
    }

    /// Wraps a seekable reader, measuring its length up front.
    pub fn from_seekable(mut read: R) -> io::Result<Self> {
        let start = read.stream_position()?;
        let end = read.seek(SeekFrom::End(0))?;
        read.seek(SeekFrom::Start(start))?;

        Ok(Self::at(read, start, end))
    }

    fn at(read: R, pos: u64, end: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            pos,
            end,
            peeked: None,
        }
    }
}

impl<R> ByteSource for BitstreamIoSource<R>
where
    R: io::Read + io::Seek,
{
    #[inline(always)]
    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }

    #[inline(always)]
    fn available(&mut self) -> io::Result<u64> {
        Ok(self.end.saturating_sub(self.pos))
    }

    #[inline(always)]
    fn peek_u8(&mut self) -> io::Result<Option<u8>> {
        if self.peeked.is_none() {
            if self.available()? == 0 {
                return Ok(None);
            }
            self.peeked = Some(self.bs.read_unsigned_var::<u8>(8)?);
        }

        Ok(self.peeked)
    }

    #[inline(always)]
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let avail = self.available()?;
        if buf.len() as u64 > avail {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read_exact({}): out of bounds bytes at {}", buf.len(), self.pos),
            ));
        }

        if buf.is_empty() {
            return Ok(());
        }

        let len = buf.len() as u64;
        let rest = match self.peeked.take() {
            Some(byte) => {
                buf[0] = byte;
                &mut buf[1..]
            }
            None => buf,
        };
        self.bs.read_bytes(rest)?;
        self.pos += len;

        Ok(())
    }

    #[inline(always)]
    fn skip(&mut self, n: u64) -> io::Result<u64> {
        let step = n.min(self.available()?);
        let mut rest = step;
        if rest > 0 && self.peeked.take().is_some() {
            rest -= 1;
        }
        if rest > 0 {
            let offset = i64::try_from(rest)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "skip too large"))?;
            self.bs.aligned_reader().seek_relative(offset)?;
        }
        self.pos += step;

        Ok(step)
    }
}

impl<'a> SliceSource<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

impl Default for SliceSource<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}
