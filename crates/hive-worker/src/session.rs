use std::{net::SocketAddr, sync::Arc};

use hive_wire::{
    Batch,
    io::{read_batch, write_word},
};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tracing::{debug, error, info, instrument};

use crate::{
    budget::DeadlineBudget,
    compute::Compute,
    config::WorkerConfig,
    engine::Engine,
    error::{WorkerError, WorkerResult},
};

/// Where a worker session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    AwaitingBatch,
    Executing,
    SendingResult,
    Closed,
}

/// Totals of a session that ended with the termination sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Batches executed and answered.
    pub rounds: usize,
    /// Tasks executed across all rounds.
    pub tasks: usize,
    /// Deadline extensions granted across all rounds.
    pub extensions: u32,
}

/// One worker node: connects to the manager and answers batches until told to stop.
pub struct Worker {
    config: WorkerConfig,
    engine: Engine,
    budget: DeadlineBudget,
    state: SessionState,
}

impl Worker {
    pub fn new(config: WorkerConfig, compute: Arc<dyn Compute>) -> WorkerResult<Self> {
        config.validate()?;
        let engine = Engine::new(config.cores, compute)
            .with_policy(config.join)
            .with_pinning(config.pin_threads);
        let budget = DeadlineBudget::new(config.max_time(), config.join.extension());

        Ok(Self {
            config,
            engine,
            budget,
            state: SessionState::Connecting,
        })
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn budget(&self) -> &DeadlineBudget {
        &self.budget
    }

    /// Connect (retrying until the manager listens), then serve batches until the sentinel arrives.
    ///
    /// The socket is shut down on every exit path.
    #[instrument(level = "debug", skip_all, fields(endpoint = %self.config.endpoint(), cores = self.config.cores))]
    pub async fn run(&mut self) -> WorkerResult<SessionSummary> {
        let mut stream = self.connect().await?;
        let result = self.serve(&mut stream).await;
        self.state = SessionState::Closed;
        let _ = stream.shutdown().await;

        match &result {
            Ok(summary) => info!(
                target: "hive.worker.session",
                rounds = summary.rounds,
                tasks = summary.tasks,
                "manager finished the run; session closed"
            ),
            Err(e) => error!(target: "hive.worker.session", error = %e, "session aborted"),
        }
        result
    }

    async fn connect(&mut self) -> WorkerResult<TcpStream> {
        self.state = SessionState::Connecting;
        let endpoint = self.config.endpoint();
        let addr = resolve(&endpoint).await?;
        let retry = self.config.connect_retry();

        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!(target: "hive.worker.session", %addr, "connected to manager");
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(
                        target: "hive.worker.session",
                        %addr,
                        error = %e,
                        retry_ms = retry.as_millis() as u64,
                        "manager not reachable yet"
                    );
                    tokio::time::sleep(retry).await;
                }
            }
        }
    }

    /// Handshake and batch loop over an already connected stream.
    pub(crate) async fn serve<S>(&mut self, stream: &mut S) -> WorkerResult<SessionSummary>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.state = SessionState::Handshaking;
        write_word(stream, self.config.cores).await?;

        let extensions_before = self.budget.extensions();
        let mut summary = SessionSummary::default();
        loop {
            self.state = SessionState::AwaitingBatch;
            let tasks = match read_batch(stream).await? {
                Batch::Terminate => {
                    summary.extensions = self.budget.extensions() - extensions_before;
                    return Ok(summary);
                }
                Batch::Tasks(tasks) => tasks,
            };

            let count = tasks.len();
            debug!(target: "hive.worker.session", round = summary.rounds, count, "batch received");

            self.state = SessionState::Executing;
            let answers = self.engine.execute(tasks, &mut self.budget).await?;

            self.state = SessionState::SendingResult;
            stream.write_all(answers.as_bytes()).await?;
            stream.flush().await?;

            summary.rounds += 1;
            summary.tasks += count;
        }
    }
}

async fn resolve(endpoint: &str) -> WorkerResult<SocketAddr> {
    let connect_err = |source| WorkerError::Connect {
        addr: endpoint.to_string(),
        source,
    };
    tokio::net::lookup_host(endpoint)
        .await
        .map_err(connect_err)?
        .next()
        .ok_or_else(|| {
            connect_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "address resolved to nothing",
            ))
        })
}
