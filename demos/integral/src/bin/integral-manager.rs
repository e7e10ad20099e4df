use anyhow::{Context, bail};
use hive_manager::{ManagerConfig, TaskList, execute};
use hive_observe::{LoggerConfig, init_logger};
use integral::{split, total};
use tracing::info;

const NUM_TASKS: usize = 8;
const LEFT: f64 = -10_000.0;
const RIGHT: f64 = 20.0;
const PRECISION: f64 = 1e-9;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if !(5..=6).contains(&args.len()) {
        bail!("usage: {} <address> <port> <max_time> <num_nodes> [precision]", args[0]);
    }
    let port: u16 = args[2].parse().context("unable to parse port")?;
    let max_time: u64 = args[3].parse().context("unable to parse time")?;
    let num_nodes: usize = args[4].parse().context("unable to parse number of workers")?;
    let precision: f64 = match args.get(5) {
        Some(p) => p.parse().context("unable to parse precision")?,
        None => PRECISION,
    };

    init_logger(&LoggerConfig::default())?;

    let tasks = TaskList::from_blocks(split(LEFT, RIGHT, precision, NUM_TASKS).iter().map(|t| t.encode()));
    info!(tasks = tasks.len(), num_nodes, max_time, "integrating exp(x) over [{LEFT}, {RIGHT}]");

    let config = ManagerConfig::new(&args[1], port, max_time, num_nodes);
    let answers = execute(config, tasks.len(), &tasks.encode()).await?;

    let answer = total(answers.iter());
    println!("ANSWER: {answer:.6}");
    println!("EXACT:  {:.6}", RIGHT.exp() - LEFT.exp());
    Ok(())
}
