use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

use anyhow::Result;
use ebmltree::utils::source::{BitstreamIoSource, ByteSource};

/// Unified input that handles both file and pipe input.
///
/// Files are read through a buffered seekable source. Pipes cannot be
/// measured or seeked, so stdin is read to the end up front.
pub struct InputReader {
    source: Box<dyn ByteSource>,
    is_pipe: bool,
    len: u64,
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let is_pipe = input_path.as_ref().to_string_lossy() == "-";

        if is_pipe {
            let data = read_all(io::stdin().lock())?;
            let len = data.len() as u64;
            log::debug!("Read {len} bytes from stdin");

            return Ok(Self {
                source: Box::new(BitstreamIoSource::new(Cursor::new(data), len)),
                is_pipe,
                len,
            });
        }

        let file = File::open(input_path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            source: Box::new(BitstreamIoSource::new(BufReader::new(file), len)),
            is_pipe,
            len,
        })
    }

    /// Check if this is pipe input
    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    /// Total input length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }
}

impl ByteSource for InputReader {
    fn position(&mut self) -> io::Result<u64> {
        self.source.position()
    }

    fn available(&mut self) -> io::Result<u64> {
        self.source.available()
    }

    fn peek_u8(&mut self) -> io::Result<Option<u8>> {
        self.source.peek_u8()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.source.read_exact(buf)
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        self.source.skip(n)
    }
}

/// Read all remaining data of a non-seekable reader
fn read_all<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(data)
}
