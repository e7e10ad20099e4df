use crate::{
    batch::split_blocks,
    error::WireResult,
    frame::{FrameWriter, WORD_SIZE},
};

/// Starting capacity of a worker's per-round answer buffer.
pub const INIT_ANSWER_CAPACITY: usize = 1024;

/// Frame a single result payload as `[len][bytes]`.
pub fn encode_answer(payload: &[u8]) -> Vec<u8> {
    let mut w = FrameWriter::with_capacity(WORD_SIZE + payload.len());
    w.write_block(payload);
    w.into_inner()
}

/// Split an unframed concatenation of exactly `count` answer blocks.
pub fn decode_answers(bytes: &[u8], count: usize) -> WireResult<Vec<&[u8]>> {
    split_blocks(bytes, count)
}

/// Growable concatenation of answer blocks produced during one round.
///
/// Capacity starts at [`INIT_ANSWER_CAPACITY`]; when an append does not fit,
/// the buffer grows to twice its capacity or to the exact size needed, whichever is larger.
#[derive(Debug, Clone)]
pub struct AnswerBuffer {
    buf: Vec<u8>,
    count: usize,
}

impl AnswerBuffer {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(INIT_ANSWER_CAPACITY),
            count: 0,
        }
    }

    pub fn push(&mut self, payload: &[u8]) {
        let needed = self.buf.len() + WORD_SIZE + payload.len();
        let capacity = self.buf.capacity();
        if needed > capacity {
            let target = needed.max(capacity.saturating_mul(2));
            self.buf.reserve_exact(target - self.buf.len());
        }
        self.buf.extend_from_slice(&payload.len().to_ne_bytes());
        self.buf.extend_from_slice(payload);
        self.count += 1;
    }

    /// Number of answer blocks appended so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Total encoded length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for AnswerBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_initial_capacity() {
        let buf = AnswerBuffer::new();
        assert!(buf.capacity() >= INIT_ANSWER_CAPACITY);
        assert!(buf.is_empty());
    }

    #[test]
    fn doubles_when_doubling_is_enough() {
        let mut buf = AnswerBuffer::new();
        let start = buf.capacity();
        buf.push(&vec![1u8; start - WORD_SIZE]);
        assert_eq!(buf.len(), start);

        buf.push(b"x");
        assert!(buf.capacity() >= start * 2);
        assert_eq!(buf.count(), 2);
    }

    #[test]
    fn grows_to_exact_fit_for_large_answers() {
        let mut buf = AnswerBuffer::new();
        let big = vec![7u8; INIT_ANSWER_CAPACITY * 5];
        buf.push(&big);
        assert!(buf.capacity() >= big.len() + WORD_SIZE);
        assert_eq!(buf.len(), big.len() + WORD_SIZE);
    }

    #[test]
    fn blocks_are_recoverable_in_push_order() {
        let mut buf = AnswerBuffer::new();
        buf.push(b"alpha");
        buf.push(b"");
        buf.push(b"gamma");

        let bytes = buf.into_bytes();
        let blocks = decode_answers(&bytes, 3).unwrap();
        assert_eq!(blocks, vec![b"alpha".as_slice(), b"".as_slice(), b"gamma".as_slice()]);
    }

    #[test]
    fn single_answer_matches_buffer_encoding() {
        let mut buf = AnswerBuffer::new();
        buf.push(b"42");
        assert_eq!(buf.as_bytes(), encode_answer(b"42").as_slice());
    }
}
