mod error;
pub use error::{WorkerError, WorkerResult};

pub mod affinity;
pub use affinity::Affinity;

mod budget;
pub use budget::{DeadlineBudget, JoinPolicy};

mod compute;
pub use compute::Compute;

mod engine;
pub use engine::Engine;

mod config;
pub use config::WorkerConfig;

mod session;
pub use session::{SessionState, SessionSummary, Worker};

pub mod prelude {
    pub use crate::{Compute, Worker, WorkerConfig, WorkerError, WorkerResult};
}
