use std::sync::Arc;

use anyhow::{Context, bail};
use hive_observe::{LoggerConfig, init_logger};
use hive_worker::{Compute, Worker, WorkerConfig};
use integral::compute;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        bail!("usage: {} <node> <service> <cores>", args[0]);
    }
    let port: u16 = args[2].parse().context("unable to parse port")?;
    let cores: usize = args[3].parse().context("unable to parse cores")?;

    init_logger(&LoggerConfig::default())?;

    let compute: Arc<dyn Compute> = Arc::new(compute);
    let mut worker = Worker::new(WorkerConfig::new(&args[1], port, cores), compute)?;
    let summary = worker.run().await?;

    info!(rounds = summary.rounds, tasks = summary.tasks, extensions = summary.extensions, "worker finished");
    Ok(())
}
