use std::{
    io,
    net::SocketAddr,
    task::{Context, Poll},
    time::Duration,
};

use hive_wire::io::{read_answer, read_word, write_batch, write_termination};
use tokio::{
    io::{AsyncWriteExt, ReadBuf},
    net::TcpStream,
};
use tracing::{debug, trace, warn};

use crate::{
    answers::Answers,
    error::{ManagerError, ManagerResult},
};

/// Upper bound for each step of [`Connection::abort`].
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Protocol progress of one worker slot.
///
/// `Empty → GetInfo → WaitTask → WaitAns → WaitTask → … → WorkFinished`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Slot not yet filled by an accepted socket.
    Empty,
    /// Accepted; waiting for the core-count handshake.
    GetInfo,
    /// Idle; the next batch (or the sentinel) is ours to send.
    WaitTask,
    /// A batch is out; waiting for its answers.
    WaitAns,
    /// Sentinel sent or connection torn down.
    WorkFinished,
}

impl ConnState {
    /// `true` while the slot holds a live socket that must be watched.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, ConnState::GetInfo | ConnState::WaitTask | ConnState::WaitAns)
    }
}

/// The manager's view of one worker.
#[derive(Debug)]
pub struct Connection {
    id: usize,
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    cores: usize,
    state: ConnState,
    /// Tasks of the most recent batch that are not answered yet.
    in_flight: usize,
    batches: usize,
}

impl Connection {
    pub fn empty(id: usize) -> Self {
        Self {
            id,
            stream: None,
            peer: None,
            cores: 0,
            state: ConnState::Empty,
            in_flight: 0,
            batches: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Core count declared in the handshake (zero before it).
    #[inline]
    pub fn cores(&self) -> usize {
        self.cores
    }

    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Batches sent over this connection so far.
    #[inline]
    pub fn batches(&self) -> usize {
        self.batches
    }

    #[inline]
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// `Empty → GetInfo`: take ownership of an accepted socket and tune it for small, latency-bound messages.
    pub fn attach(&mut self, stream: TcpStream, peer: SocketAddr) -> ManagerResult<()> {
        self.ensure_state(ConnState::Empty)?;
        let id = self.id;
        stream
            .set_nodelay(true)
            .map_err(|e| ManagerError::wire(id, e.into()))?;
        disable_cork(&stream).map_err(|e| ManagerError::wire(id, e.into()))?;

        debug!(target: "hive.manager.conn", conn = id, %peer, "worker connected");
        self.stream = Some(stream);
        self.peer = Some(peer);
        self.state = ConnState::GetInfo;
        Ok(())
    }

    /// `GetInfo → WaitTask`: read the worker's core count.
    pub async fn read_info(&mut self) -> ManagerResult<usize> {
        self.ensure_state(ConnState::GetInfo)?;
        let id = self.id;
        let cores = read_word(self.stream_mut()?)
            .await
            .map_err(|e| ManagerError::wire(id, e))?;
        if cores == 0 {
            return Err(self.violation("worker announced zero cores"));
        }

        debug!(target: "hive.manager.conn", conn = id, cores, "worker handshake complete");
        self.cores = cores;
        self.state = ConnState::WaitTask;
        Ok(cores)
    }

    /// `WaitTask → WaitAns`: ship a non-empty batch and remember how many answers it owes.
    pub async fn send_batch(&mut self, tasks: &[Vec<u8>]) -> ManagerResult<usize> {
        self.ensure_state(ConnState::WaitTask)?;
        if tasks.is_empty() {
            return Err(self.violation("refusing to send an empty batch"));
        }
        let id = self.id;
        let bytes = write_batch(self.stream_mut()?, tasks)
            .await
            .map_err(|e| ManagerError::wire(id, e))?;

        debug!(target: "hive.manager.conn", conn = id, count = tasks.len(), bytes, "batch sent");
        self.in_flight = tasks.len();
        self.batches += 1;
        self.state = ConnState::WaitAns;
        Ok(bytes)
    }

    /// `WaitAns → WaitTask`: read every answer block the last batch owes.
    pub async fn recv_answers(&mut self, answers: &mut Answers) -> ManagerResult<usize> {
        self.ensure_state(ConnState::WaitAns)?;
        let id = self.id;
        let expected = self.in_flight;
        let stream = self.stream_mut()?;

        for _ in 0..expected {
            let block = read_answer(stream)
                .await
                .map_err(|e| ManagerError::wire(id, e))?;
            trace!(target: "hive.manager.conn", conn = id, bytes = block.len(), "answer received");
            answers.push(block);
        }

        debug!(target: "hive.manager.conn", conn = id, count = expected, "answers received");
        self.in_flight = 0;
        self.state = ConnState::WaitTask;
        Ok(expected)
    }

    /// `WaitTask → WorkFinished`: send the termination sentinel and close the socket.
    pub async fn finish(&mut self) -> ManagerResult<()> {
        self.ensure_state(ConnState::WaitTask)?;
        let id = self.id;
        if let Some(mut stream) = self.stream.take() {
            write_termination(&mut stream)
                .await
                .map_err(|e| ManagerError::wire(id, e))?;
            let _ = stream.shutdown().await;
        }

        debug!(target: "hive.manager.conn", conn = id, batches = self.batches, "worker finished");
        self.state = ConnState::WorkFinished;
        Ok(())
    }

    /// Best-effort teardown after a failed run: tell the worker to stop, then close the socket.
    ///
    /// The sentinel write is bounded by [`TEARDOWN_TIMEOUT`] so a worker that stopped reading cannot hold up the abort.
    pub async fn abort(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            match tokio::time::timeout(TEARDOWN_TIMEOUT, write_termination(&mut stream)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(target: "hive.manager.conn", conn = self.id, error = %e, "sentinel not delivered during teardown");
                }
                Err(_) => {
                    warn!(target: "hive.manager.conn", conn = self.id, "sentinel write timed out during teardown");
                }
            }
            let _ = tokio::time::timeout(TEARDOWN_TIMEOUT, stream.shutdown()).await;
            debug!(target: "hive.manager.conn", conn = self.id, state = ?self.state, "connection torn down");
        }
        self.state = ConnState::WorkFinished;
    }

    /// Readiness probe used by the event loop.
    ///
    /// Resolves with the number of bytes peeked: `0` means the peer hung up.
    pub(crate) fn poll_peer(&self, cx: &mut Context<'_>) -> Poll<io::Result<usize>> {
        let Some(stream) = &self.stream else {
            return Poll::Pending;
        };
        let mut byte = [0u8; 1];
        let mut buf = ReadBuf::new(&mut byte);
        stream.poll_peek(cx, &mut buf)
    }

    /// Build the error for inbound data this state does not expect.
    pub(crate) fn violation(&self, reason: impl Into<String>) -> ManagerError {
        ManagerError::Protocol {
            conn: self.id,
            state: self.state,
            reason: reason.into(),
        }
    }

    fn ensure_state(&self, expected: ConnState) -> ManagerResult<()> {
        if self.state != expected {
            return Err(self.violation(format!("expected state {expected:?}")));
        }
        Ok(())
    }

    fn stream_mut(&mut self) -> ManagerResult<&mut TcpStream> {
        match self.stream.as_mut() {
            Some(stream) => Ok(stream),
            None => Err(ManagerError::Protocol {
                conn: self.id,
                state: self.state,
                reason: "no socket attached".into(),
            }),
        }
    }
}

#[cfg(target_os = "linux")]
fn disable_cork(stream: &TcpStream) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let off: libc::c_int = 0;
    // SAFETY: valid socket fd owned by `stream`, option value points to a live c_int of the declared size.
    let rc = unsafe {
        libc::setsockopt(
            stream.as_raw_fd(),
            libc::IPPROTO_TCP,
            libc::TCP_CORK,
            &off as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
fn disable_cork(_stream: &TcpStream) -> io::Result<()> {
    Ok(())
}
