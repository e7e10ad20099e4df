use std::time::Duration;

use hive_wire::WireError;
use thiserror::Error;

use crate::connection::ConnState;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("invalid manager config: {0}")]
    Config(String),
    #[error("invalid task list: {0}")]
    TaskList(#[source] WireError),
    #[error("unable to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),
    #[error("worker {conn} hung up")]
    HangUp { conn: usize },
    #[error("transport error on worker {conn}: {source}")]
    Transport {
        conn: usize,
        #[source]
        source: WireError,
    },
    #[error("protocol violation on worker {conn} in state {state:?}: {reason}")]
    Protocol {
        conn: usize,
        state: ConnState,
        reason: String,
    },
    #[error("deadline exceeded after {elapsed:?}: {received}/{total} answers received")]
    DeadlineExceeded {
        elapsed: Duration,
        received: usize,
        total: usize,
    },
    #[error("no worker is processing tasks: {received}/{total} answers received")]
    Stalled { received: usize, total: usize },
}

impl ManagerError {
    /// Classify a wire failure on connection `conn`; an early EOF means the worker went away.
    pub(crate) fn wire(conn: usize, source: WireError) -> Self {
        if source.is_eof() {
            ManagerError::HangUp { conn }
        } else {
            ManagerError::Transport { conn, source }
        }
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;
