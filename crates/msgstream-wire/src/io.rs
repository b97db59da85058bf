use std::io::{ErrorKind, Read, Write};

use crate::error::WireError;

/// A sequential byte source.
///
/// The codec never seeks: it pulls bytes strictly in order and reports
/// positions only for diagnostics. Transports supply an implementation;
/// [`SliceSource`] covers in-memory buffers and [`IoSource`] adapts any
/// [`std::io::Read`].
pub trait ByteSource {
    /// Read a single byte.
    ///
    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] when the source is exhausted.
    fn read_byte(&mut self) -> Result<u8, WireError>;

    /// Fill `buf` completely.
    ///
    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] when fewer than `buf.len()` bytes remain.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), WireError>;

    /// Number of bytes consumed so far.
    fn position(&self) -> usize;

    /// Bytes left, when the source knows it.
    fn remaining(&self) -> Option<usize> {
        None
    }

    /// Read exactly `len` bytes into a fresh vector.
    ///
    /// Sources that know their remaining length fail before allocating.
    ///
    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] when fewer than `len` bytes remain.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, WireError> {
        if let Some(remaining) = self.remaining() {
            if len > remaining {
                return Err(WireError::UnexpectedEof {
                    offset: self.position() + remaining,
                });
            }
        }
        let mut out = vec![0u8; len];
        self.read_exact(&mut out)?;
        Ok(out)
    }
}

/// A sequential byte sink.
pub trait ByteSink {
    /// Append `bytes`.
    ///
    /// # Errors
    ///
    /// [`WireError::Io`] when the underlying writer fails.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), WireError>;

    /// Append one byte.
    ///
    /// # Errors
    ///
    /// [`WireError::Io`] when the underlying writer fails.
    fn write_byte(&mut self, byte: u8) -> Result<(), WireError> {
        self.write_all(&[byte])
    }
}

impl ByteSink for Vec<u8> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), WireError> {
        self.push(byte);
        Ok(())
    }
}

impl<T: ByteSink + ?Sized> ByteSink for &mut T {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        (**self).write_all(bytes)
    }
}

/// Cursor over an in-memory buffer.
#[derive(Clone, Debug)]
pub struct SliceSource<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// The unread tail of the buffer.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Borrow the next `len` bytes without copying.
    ///
    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] when fewer than `len` bytes remain.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(WireError::UnexpectedEof {
                offset: self.buf.len(),
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_byte(&mut self) -> Result<u8, WireError> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or(WireError::UnexpectedEof { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        let src = self.take(buf.len())?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.buf.len() - self.pos)
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, WireError> {
        Ok(self.take(len)?.to_vec())
    }
}

/// Adapter from any [`std::io::Read`].
///
/// Wrap the reader in a `BufReader` first; the decoder reads a byte at a
/// time while parsing control codes.
pub struct IoSource<R> {
    inner: R,
    pos: usize,
}

impl<R: Read> IoSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn map_err(&self, err: std::io::Error) -> WireError {
        if err.kind() == ErrorKind::UnexpectedEof {
            WireError::UnexpectedEof { offset: self.pos }
        } else {
            WireError::Io(err)
        }
    }
}

impl<R: Read> ByteSource for IoSource<R> {
    fn read_byte(&mut self) -> Result<u8, WireError> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    /// On failure the position still covers the bytes that did arrive.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(WireError::UnexpectedEof { offset: self.pos }),
                Ok(n) => {
                    filled += n;
                    self.pos += n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(self.map_err(err)),
            }
        }
        Ok(())
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, WireError> {
        // Grow with the data actually received rather than trusting `len`.
        let mut out = Vec::new();
        let result = (&mut self.inner).take(len as u64).read_to_end(&mut out);
        let read = result.map_err(|e| self.map_err(e))?;
        self.pos += read;
        if read < len {
            return Err(WireError::UnexpectedEof { offset: self.pos });
        }
        Ok(out)
    }
}

/// Adapter onto any [`std::io::Write`].
pub struct IoSink<W> {
    inner: W,
}

impl<W: Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for IoSink<W> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        self.inner.write_all(bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_tracks_position() {
        let mut source = SliceSource::new(&[1, 2, 3, 4]);
        assert_eq!(source.read_byte().unwrap(), 1);
        assert_eq!(source.take(2).unwrap(), &[2, 3]);
        assert_eq!(source.position(), 3);
        assert_eq!(source.remaining(), Some(1));
        assert_eq!(source.rest(), &[4]);
    }

    #[test]
    fn slice_source_eof() {
        let mut source = SliceSource::new(&[1]);
        let result = source.read_vec(2);
        assert!(matches!(result, Err(WireError::UnexpectedEof { .. })));
    }

    #[test]
    fn io_source_maps_eof() {
        let mut source = IoSource::new(std::io::Cursor::new(vec![7u8]));
        assert_eq!(source.read_byte().unwrap(), 7);
        let result = source.read_byte();
        assert!(matches!(result, Err(WireError::UnexpectedEof { offset: 1 })));
    }

    #[test]
    fn io_source_eof_offset_counts_partial_read() {
        let mut source = IoSource::new(std::io::Cursor::new(vec![1u8, 2, 3]));
        let mut buf = [0u8; 8];
        let result = source.read_exact(&mut buf);
        assert!(matches!(result, Err(WireError::UnexpectedEof { offset: 3 })));
        assert_eq!(source.position(), 3);
    }

    #[test]
    fn io_source_read_vec_short_input() {
        let mut source = IoSource::new(std::io::Cursor::new(vec![1u8, 2, 3]));
        let result = source.read_vec(1_000_000);
        assert!(matches!(result, Err(WireError::UnexpectedEof { offset: 3 })));
    }

    #[test]
    fn io_sink_writes_through() {
        let mut sink = IoSink::new(Vec::new());
        sink.write_all(b"ab").unwrap();
        sink.write_byte(b'c').unwrap();
        assert_eq!(sink.into_inner(), b"abc");
    }
}
