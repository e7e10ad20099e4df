use std::time::Duration;

use hive_wire::WireError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("invalid worker config: {0}")]
    Config(String),
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
    #[error("failed to spawn execution unit {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("execution unit {index} failed: {reason}")]
    UnitFailed { index: usize, reason: String },
    #[error("execution unit {index} still running after {extensions} deadline extensions ({waited:?})")]
    Stalled {
        index: usize,
        extensions: u32,
        waited: Duration,
    },
}

impl From<std::io::Error> for WorkerError {
    fn from(e: std::io::Error) -> Self {
        WorkerError::Wire(WireError::Io(e))
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;
