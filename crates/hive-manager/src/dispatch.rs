use std::{
    future::poll_fn,
    io,
    net::SocketAddr,
    task::Poll,
};

use hive_wire::TaskList;
use tokio::{
    net::{TcpListener, TcpSocket},
    time::Instant,
};
use tracing::{debug, error, info, instrument};

use crate::{
    answers::Answers,
    config::ManagerConfig,
    connection::{ConnState, Connection},
    cursor::TaskCursor,
    error::{ManagerError, ManagerResult},
};

/// Coordinator of one distributed run.
///
/// A manager is bound once and runs once: [`Manager::run`] consumes it and closes the listening socket
/// as soon as every worker has connected.
pub struct Manager {
    config: ManagerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Manager {
    /// Validate `config` and open the listening socket (`SO_REUSEADDR`, backlog = `num_nodes`).
    pub async fn bind(config: ManagerConfig) -> ManagerResult<Self> {
        config.validate()?;
        let endpoint = config.endpoint();
        let bind_err = |source| ManagerError::Bind {
            addr: endpoint.clone(),
            source,
        };

        let addr = tokio::net::lookup_host(&endpoint)
            .await
            .map_err(bind_err)?
            .next()
            .ok_or_else(|| bind_err(io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing")))?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;

        let backlog = u32::try_from(config.num_nodes).unwrap_or(u32::MAX);
        let listener = socket.listen(backlog).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        info!(
            target: "hive.manager.dispatch",
            %local_addr,
            num_nodes = config.num_nodes,
            "listening for workers"
        );
        Ok(Self {
            config,
            listener,
            local_addr,
        })
    }

    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[inline]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Run with a caller-encoded task list (`count` blocks of `[len][bytes]`).
    pub async fn run_encoded(self, count: usize, task_bytes: &[u8]) -> ManagerResult<Answers> {
        let tasks = TaskList::decode(count, task_bytes).map_err(ManagerError::TaskList)?;
        self.run(tasks).await
    }

    /// Distribute `tasks` over exactly `num_nodes` workers and collect one answer per task.
    ///
    /// Any failure tears down every connection and aborts the whole run; there is no partial result.
    #[instrument(level = "debug", skip_all, fields(num_nodes = self.config.num_nodes, tasks = tasks.len()))]
    pub async fn run(self, tasks: TaskList) -> ManagerResult<Answers> {
        let Manager {
            config, listener, ..
        } = self;

        if tasks.is_empty() {
            info!(target: "hive.manager.dispatch", "empty task list; nothing to dispatch");
            return Ok(Answers::default());
        }

        let mut conns: Vec<Connection> = (0..config.num_nodes).map(Connection::empty).collect();
        let result = drive(&config, listener, &mut conns, tasks).await;

        if let Err(e) = &result {
            error!(target: "hive.manager.dispatch", error = %e, "run aborted; tearing down workers");
            for conn in conns.iter_mut() {
                conn.abort().await;
            }
        }
        result
    }
}

/// Run a whole job: validate, decode the task list, bind, dispatch, collect.
///
/// An empty task list returns at once without opening a socket.
pub async fn execute(
    config: ManagerConfig,
    count: usize,
    task_bytes: &[u8],
) -> ManagerResult<Answers> {
    config.validate()?;
    let tasks = TaskList::decode(count, task_bytes).map_err(ManagerError::TaskList)?;
    if tasks.is_empty() {
        return Ok(Answers::default());
    }
    Manager::bind(config).await?.run(tasks).await
}

async fn drive(
    config: &ManagerConfig,
    listener: TcpListener,
    conns: &mut [Connection],
    tasks: TaskList,
) -> ManagerResult<Answers> {
    rendezvous(listener, conns).await?;
    info!(target: "hive.manager.dispatch", workers = conns.len(), "all workers connected");

    let started = Instant::now();
    let mut cursor = TaskCursor::new(tasks);
    let mut answers = Answers::with_capacity(cursor.total());

    let outcome = tokio::time::timeout(config.max_time(), dispatch(conns, &mut cursor, &mut answers)).await;
    match outcome {
        Ok(result) => result?,
        Err(_) => {
            return Err(ManagerError::DeadlineExceeded {
                elapsed: started.elapsed(),
                received: cursor.received(),
                total: cursor.total(),
            });
        }
    }

    info!(
        target: "hive.manager.dispatch",
        answers = answers.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "all answers received"
    );
    Ok(answers)
}

/// Accept exactly `conns.len()` workers and read every handshake.
///
/// The listener is closed when this returns.
async fn rendezvous(listener: TcpListener, conns: &mut [Connection]) -> ManagerResult<()> {
    let expected = conns.len();
    let mut connected = 0usize;
    let mut ready = 0usize;

    while ready < expected {
        tokio::select! {
            accepted = listener.accept(), if connected < expected => {
                let (stream, peer) = accepted.map_err(ManagerError::Accept)?;
                conns[connected].attach(stream, peer)?;
                connected += 1;
            }
            event = next_event(conns) => {
                let conn = &mut conns[event?];
                match conn.state() {
                    ConnState::GetInfo => {
                        conn.read_info().await?;
                        ready += 1;
                    }
                    _ => return Err(conn.violation("unexpected inbound data")),
                }
            }
        }
    }
    Ok(())
}

/// Initial dispatch in connection order, then answer-driven re-dispatch until every task is answered.
async fn dispatch(
    conns: &mut [Connection],
    cursor: &mut TaskCursor,
    answers: &mut Answers,
) -> ManagerResult<()> {
    for conn in conns.iter_mut() {
        assign(conn, cursor).await?;
    }

    while !cursor.is_complete() {
        if !conns.iter().any(|c| c.state() == ConnState::WaitAns) {
            return Err(ManagerError::Stalled {
                received: cursor.received(),
                total: cursor.total(),
            });
        }

        let id = next_event(conns).await?;
        let conn = &mut conns[id];
        if conn.state() != ConnState::WaitAns {
            return Err(conn.violation("unexpected inbound data"));
        }
        let n = conn.recv_answers(answers).await?;
        cursor.record_answers(n);
        assign(conn, cursor).await?;

        debug!(
            target: "hive.manager.dispatch",
            received = cursor.received(),
            outstanding = cursor.outstanding(),
            total = cursor.total(),
            "progress"
        );
    }
    Ok(())
}

/// Give `conn` its next slice, or the sentinel when nothing is left.
async fn assign(conn: &mut Connection, cursor: &mut TaskCursor) -> ManagerResult<()> {
    let batch = cursor.take(conn.cores());
    if batch.is_empty() {
        conn.finish().await
    } else {
        conn.send_batch(batch).await.map(|_| ())
    }
}

/// Wait until some live connection has inbound data and return its index.
///
/// A peer that closed its end is reported as [`ManagerError::HangUp`].
async fn next_event(conns: &[Connection]) -> ManagerResult<usize> {
    poll_fn(|cx| {
        for conn in conns.iter().filter(|c| c.state().is_active()) {
            match conn.poll_peer(cx) {
                Poll::Pending => continue,
                Poll::Ready(Ok(0)) => return Poll::Ready(Err(ManagerError::HangUp { conn: conn.id() })),
                Poll::Ready(Ok(_)) => return Poll::Ready(Ok(conn.id())),
                Poll::Ready(Err(e)) => return Poll::Ready(Err(ManagerError::wire(conn.id(), e.into()))),
            }
        }
        Poll::Pending
    })
    .await
}
