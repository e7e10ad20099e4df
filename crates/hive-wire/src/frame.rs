use crate::error::{WireError, WireResult};

/// Width of every integer field on the wire.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// Bounds-checked cursor over a received frame.
///
/// Callers never see offsets: each read either yields the requested field or fails with [`WireError::Malformed`].
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Read one native word.
    pub fn read_len(&mut self) -> WireResult<usize> {
        let raw = self.read_bytes(WORD_SIZE)?;
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(raw);
        Ok(usize::from_ne_bytes(word))
    }

    /// Borrow the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> WireResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                WireError::Malformed(format!(
                    "need {n} bytes at offset {}, only {} left",
                    self.pos,
                    self.remaining()
                ))
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Read one `[len][bytes]` block.
    pub fn read_block(&mut self) -> WireResult<&'a [u8]> {
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

/// Append-only builder for outgoing frames.
#[derive(Debug, Default, Clone)]
pub struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_len(&mut self, len: usize) -> &mut Self {
        self.buf.extend_from_slice(&len.to_ne_bytes());
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append `[bytes.len()][bytes]`.
    pub fn write_block(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_len(bytes.len()).write_bytes(bytes)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_written_fields() {
        let mut w = FrameWriter::new();
        w.write_len(3).write_bytes(b"abc").write_block(b"xy");
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 2 * WORD_SIZE + 5);

        let mut r = FrameReader::new(&bytes);
        assert_eq!(r.read_len().unwrap(), 3);
        assert_eq!(r.read_bytes(3).unwrap(), b"abc");
        assert_eq!(r.read_block().unwrap(), b"xy");
        assert!(r.is_empty());
    }

    #[test]
    fn short_word_is_malformed() {
        let bytes = [0u8; WORD_SIZE - 1];
        let mut r = FrameReader::new(&bytes);
        assert!(matches!(r.read_len(), Err(WireError::Malformed(_))));
    }

    #[test]
    fn block_longer_than_buffer_is_malformed() {
        let mut w = FrameWriter::new();
        w.write_len(10).write_bytes(b"short");
        let bytes = w.into_inner();

        let mut r = FrameReader::new(&bytes);
        assert!(matches!(r.read_block(), Err(WireError::Malformed(_))));
    }

    #[test]
    fn huge_length_does_not_overflow() {
        let mut w = FrameWriter::new();
        w.write_len(usize::MAX);
        let bytes = w.into_inner();

        let mut r = FrameReader::new(&bytes);
        assert!(matches!(r.read_block(), Err(WireError::Malformed(_))));
    }

    #[test]
    fn words_are_native_endian() {
        let mut w = FrameWriter::new();
        w.write_len(0x0102);
        assert_eq!(w.into_inner(), 0x0102usize.to_ne_bytes().to_vec());
    }
}
