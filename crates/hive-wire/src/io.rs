//! Async stream helpers: each call reads or writes exactly one protocol element.
//!
//! Reads are all-or-nothing (`read_exact`), so a peer that hangs up mid-frame surfaces as
//! [`WireError::Io`] with `UnexpectedEof` (see [`WireError::is_eof`]).
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::{
    batch::{Batch, check_frame_size, encode_batch, encode_termination, split_blocks},
    error::WireResult,
    frame::WORD_SIZE,
};

pub async fn read_word<R>(r: &mut R) -> WireResult<usize>
where
    R: AsyncRead + Unpin,
{
    let mut word = [0u8; WORD_SIZE];
    r.read_exact(&mut word).await?;
    Ok(usize::from_ne_bytes(word))
}

pub async fn write_word<W>(w: &mut W, value: usize) -> WireResult<()>
where
    W: AsyncWrite + Unpin,
{
    w.write_all(&value.to_ne_bytes()).await?;
    w.flush().await?;
    Ok(())
}

/// Receive one batch; the zero-count sentinel is returned as [`Batch::Terminate`].
pub async fn read_batch<R>(r: &mut R) -> WireResult<Batch>
where
    R: AsyncRead + Unpin,
{
    let count = read_word(r).await?;
    if count == 0 {
        trace!(target: "hive.wire", "termination sentinel received");
        return Ok(Batch::Terminate);
    }
    let total = read_word(r).await?;
    check_frame_size(total)?;

    let mut payload = vec![0u8; total];
    r.read_exact(&mut payload).await?;
    let blocks = split_blocks(&payload, count)?;
    trace!(target: "hive.wire", count, total, "batch received");

    Ok(Batch::Tasks(blocks.into_iter().map(<[u8]>::to_vec).collect()))
}

/// Send `blocks` as one batch frame and return the number of bytes written.
pub async fn write_batch<W, B>(w: &mut W, blocks: &[B]) -> WireResult<usize>
where
    W: AsyncWrite + Unpin,
    B: AsRef<[u8]>,
{
    let frame = encode_batch(blocks);
    w.write_all(&frame).await?;
    w.flush().await?;
    trace!(target: "hive.wire", count = blocks.len(), bytes = frame.len(), "batch sent");
    Ok(frame.len())
}

pub async fn write_termination<W>(w: &mut W) -> WireResult<()>
where
    W: AsyncWrite + Unpin,
{
    w.write_all(&encode_termination()).await?;
    w.flush().await?;
    Ok(())
}

/// Receive one `[len][bytes]` answer block.
pub async fn read_answer<R>(r: &mut R) -> WireResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = read_word(r).await?;
    check_frame_size(len)?;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).await?;
    Ok(payload)
}
