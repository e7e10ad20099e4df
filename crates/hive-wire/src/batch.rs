use std::ops::Range;

use crate::{
    MAX_FRAME_BYTES,
    error::{WireError, WireResult},
    frame::{FrameReader, FrameWriter, WORD_SIZE},
};

/// One manager → worker shipment as seen by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    /// A non-empty set of opaque task payloads.
    Tasks(Vec<Vec<u8>>),
    /// The zero-count sentinel: no more work will follow.
    Terminate,
}

impl Batch {
    /// Number of task blocks carried (zero for the sentinel).
    pub fn len(&self) -> usize {
        match self {
            Batch::Tasks(blocks) => blocks.len(),
            Batch::Terminate => 0,
        }
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self, Batch::Terminate)
    }
}

/// Concatenate `blocks` as `[len][bytes]` records without any outer header.
///
/// This is the caller-facing encoding of a whole task list, see [`TaskList::decode`].
pub fn encode_blocks<B: AsRef<[u8]>>(blocks: &[B]) -> Vec<u8> {
    let mut w = FrameWriter::with_capacity(blocks_len(blocks));
    for block in blocks {
        w.write_block(block.as_ref());
    }
    w.into_inner()
}

/// Frame `blocks` as a task batch: `[count][totalBytes]` followed by the blocks.
///
/// An empty slice encodes to the termination sentinel, since a zero count never carries further fields.
pub fn encode_batch<B: AsRef<[u8]>>(blocks: &[B]) -> Vec<u8> {
    if blocks.is_empty() {
        return encode_termination();
    }
    let total = blocks_len(blocks);
    let mut w = FrameWriter::with_capacity(2 * WORD_SIZE + total);
    w.write_len(blocks.len()).write_len(total);
    for block in blocks {
        w.write_block(block.as_ref());
    }
    w.into_inner()
}

pub fn encode_termination() -> Vec<u8> {
    let mut w = FrameWriter::with_capacity(WORD_SIZE);
    w.write_len(0);
    w.into_inner()
}

/// Decode one complete batch frame held in memory.
///
/// The buffer must contain exactly one frame; trailing bytes are reported as malformed.
pub fn decode_batch(bytes: &[u8]) -> WireResult<Batch> {
    let mut r = FrameReader::new(bytes);
    let count = r.read_len()?;
    if count == 0 {
        if !r.is_empty() {
            return Err(WireError::Malformed(format!(
                "{} trailing bytes after termination sentinel",
                r.remaining()
            )));
        }
        return Ok(Batch::Terminate);
    }
    let total = r.read_len()?;
    check_frame_size(total)?;
    let payload = r.read_bytes(total)?;
    if !r.is_empty() {
        return Err(WireError::Malformed(format!(
            "{} trailing bytes after batch payload",
            r.remaining()
        )));
    }
    let blocks = split_blocks(payload, count)?;
    Ok(Batch::Tasks(blocks.into_iter().map(<[u8]>::to_vec).collect()))
}

/// Interpret `payload` as exactly `count` concatenated `[len][bytes]` blocks.
pub(crate) fn split_blocks(payload: &[u8], count: usize) -> WireResult<Vec<&[u8]>> {
    let mut r = FrameReader::new(payload);
    // every block carries at least its length word
    if count > payload.len() / WORD_SIZE {
        return Err(WireError::Malformed(format!(
            "{count} blocks cannot fit in {} bytes",
            payload.len()
        )));
    }
    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        blocks.push(r.read_block()?);
    }
    if !r.is_empty() {
        return Err(WireError::Malformed(format!(
            "{} bytes left over after {count} blocks",
            r.remaining()
        )));
    }
    Ok(blocks)
}

pub(crate) fn check_frame_size(size: usize) -> WireResult<()> {
    if size > MAX_FRAME_BYTES {
        return Err(WireError::FrameTooLarge {
            size,
            limit: MAX_FRAME_BYTES,
        });
    }
    Ok(())
}

fn blocks_len<B: AsRef<[u8]>>(blocks: &[B]) -> usize {
    blocks.iter().map(|b| WORD_SIZE + b.as_ref().len()).sum()
}

/// The full, ordered list of task payloads a manager run distributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    blocks: Vec<Vec<u8>>,
}

impl TaskList {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    pub fn from_blocks<I, B>(blocks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self {
            blocks: blocks.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a caller-supplied `[len][bytes]*` encoding that must hold exactly `count` blocks.
    pub fn decode(count: usize, bytes: &[u8]) -> WireResult<Self> {
        let blocks = split_blocks(bytes, count)?;
        Ok(Self::from_blocks(blocks.into_iter().map(<[u8]>::to_vec)))
    }

    pub fn push(&mut self, block: impl Into<Vec<u8>>) {
        self.blocks.push(block.into());
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Borrow a contiguous slice of tasks; `None` when the range runs past the end.
    pub fn slice(&self, range: Range<usize>) -> Option<&[Vec<u8>]> {
        self.blocks.get(range)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.blocks.iter().map(Vec::as_slice)
    }

    /// Inverse of [`TaskList::decode`].
    pub fn encode(&self) -> Vec<u8> {
        encode_blocks(&self.blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_round_trip_preserves_order_and_bytes() {
        let blocks: Vec<Vec<u8>> = vec![b"first".to_vec(), Vec::new(), vec![0xff; 300]];
        let frame = encode_batch(&blocks);
        assert_eq!(decode_batch(&frame).unwrap(), Batch::Tasks(blocks));
    }

    #[test]
    fn header_carries_count_and_payload_size() {
        let frame = encode_batch(&[b"ab".as_slice(), b"cde".as_slice()]);
        let mut r = FrameReader::new(&frame);
        assert_eq!(r.read_len().unwrap(), 2);
        assert_eq!(r.read_len().unwrap(), 2 * WORD_SIZE + 5);
        assert_eq!(r.remaining(), 2 * WORD_SIZE + 5);
    }

    #[test]
    fn empty_batch_is_termination_sentinel() {
        let frame = encode_batch::<Vec<u8>>(&[]);
        assert_eq!(frame, 0usize.to_ne_bytes().to_vec());
        assert_eq!(decode_batch(&frame).unwrap(), Batch::Terminate);
        assert_eq!(encode_termination(), frame);
    }

    #[test]
    fn count_mismatch_is_malformed() {
        let mut frame = FrameWriter::new();
        let payload = encode_blocks(&[b"one".as_slice()]);
        frame.write_len(2).write_len(payload.len()).write_bytes(&payload);
        assert!(matches!(
            decode_batch(&frame.into_inner()),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn leftover_payload_is_malformed() {
        let mut frame = FrameWriter::new();
        let payload = encode_blocks(&[b"one".as_slice(), b"two".as_slice()]);
        frame.write_len(1).write_len(payload.len()).write_bytes(&payload);
        assert!(matches!(
            decode_batch(&frame.into_inner()),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn oversized_header_is_rejected() {
        let mut frame = FrameWriter::new();
        frame.write_len(1).write_len(MAX_FRAME_BYTES + 1);
        assert!(matches!(
            decode_batch(&frame.into_inner()),
            Err(WireError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn task_list_decodes_caller_encoding() {
        let list = TaskList::from_blocks([1u64.to_ne_bytes(), 2u64.to_ne_bytes()]);
        let decoded = TaskList::decode(2, &list.encode()).unwrap();
        assert_eq!(decoded, list);
        assert_eq!(decoded.slice(1..2).unwrap()[0], 2u64.to_ne_bytes());
        assert!(decoded.slice(1..3).is_none());
    }

    #[test]
    fn task_list_rejects_wrong_count() {
        let bytes = encode_blocks(&[b"a".as_slice()]);
        assert!(TaskList::decode(2, &bytes).is_err());
        assert!(TaskList::decode(0, &bytes).is_err());
        assert!(TaskList::decode(0, &[]).unwrap().is_empty());
    }
}
