//! Length-prefixed framing shared by the manager and the workers.
//!
//! Every integer on the wire is a native machine word (`usize`) written in host byte order.
//! Both ends must therefore run on architecturally compatible hosts; no byte-order normalisation happens here.
//!
//! | Direction        | Message     | Layout                                                 |
//! |------------------|-------------|--------------------------------------------------------|
//! | worker → manager | handshake   | `[cores]`                                              |
//! | manager → worker | task batch  | `[count][totalBytes]` then `count × [len][bytes]`      |
//! | manager → worker | termination | `[0]`                                                  |
//! | worker → manager | result      | `count × [len][bytes]`, no outer header                |
mod error;
pub use error::{WireError, WireResult};

mod frame;
pub use frame::{FrameReader, FrameWriter, WORD_SIZE};

mod batch;
pub use batch::{Batch, TaskList, decode_batch, encode_batch, encode_blocks, encode_termination};

mod answer;
pub use answer::{AnswerBuffer, INIT_ANSWER_CAPACITY, decode_answers, encode_answer};

pub mod io;

/// Upper bound for a single batch payload; larger headers are treated as corrupt.
pub const MAX_FRAME_BYTES: usize = 1 << 30;

pub mod prelude {
    pub use crate::io::{read_answer, read_batch, read_word, write_batch, write_termination, write_word};
    pub use crate::{AnswerBuffer, Batch, TaskList, WireError, WireResult};
}
