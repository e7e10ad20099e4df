use hive_wire::encode_blocks;

/// Answer blocks collected by a run, in arrival order.
///
/// Arrival order is neither task order nor stable between runs; a caller needing correlation must embed an index in the task payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers {
    blocks: Vec<Vec<u8>>,
}

impl Answers {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            blocks: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, block: Vec<u8>) {
        self.blocks.push(block);
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.blocks.iter().map(Vec::as_slice)
    }

    pub fn into_blocks(self) -> Vec<Vec<u8>> {
        self.blocks
    }

    /// Payloads concatenated back to back, without length prefixes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.blocks.concat()
    }

    /// Payloads re-framed as `[len][bytes]` blocks.
    pub fn encode(&self) -> Vec<u8> {
        encode_blocks(&self.blocks)
    }
}
