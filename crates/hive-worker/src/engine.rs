use std::{
    any::Any,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Instant,
};

use hive_wire::AnswerBuffer;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::{
    affinity::{Affinity, available_cores},
    budget::{DeadlineBudget, JoinPolicy},
    compute::Compute,
    error::{WorkerError, WorkerResult},
};

/// Executes task batches, one pinned thread per task.
pub struct Engine {
    cores: usize,
    compute: Arc<dyn Compute>,
    policy: JoinPolicy,
    pin: bool,
}

struct Unit {
    index: usize,
    handle: JoinHandle<()>,
    rx: oneshot::Receiver<Vec<u8>>,
}

impl Engine {
    pub fn new(cores: usize, compute: Arc<dyn Compute>) -> Self {
        Self {
            cores,
            compute,
            policy: JoinPolicy::default(),
            pin: true,
        }
    }

    pub fn with_policy(mut self, policy: JoinPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Disable CPU pinning; units still run one thread per task.
    pub fn with_pinning(mut self, pin: bool) -> Self {
        self.pin = pin;
        self
    }

    #[inline]
    pub fn cores(&self) -> usize {
        self.cores
    }

    /// Run every task of a batch and collect the framed answers.
    ///
    /// Units are joined in submission order against `budget`. A join that times out extends the budget
    /// by one increment and waits on the same unit again; any other failure aborts the round without partial results.
    pub async fn execute(
        &self,
        tasks: Vec<Vec<u8>>,
        budget: &mut DeadlineBudget,
    ) -> WorkerResult<AnswerBuffer> {
        let count = tasks.len();
        let hw = available_cores();
        if count > self.cores || count > hw {
            warn!(
                target: "hive.worker.engine",
                count,
                declared = self.cores,
                available = hw,
                "more execution units requested than cores available; continuing"
            );
        }

        let mut units = Vec::with_capacity(count);
        for (index, payload) in tasks.into_iter().enumerate() {
            units.push(self.spawn_unit(index, payload)?);
        }
        debug!(target: "hive.worker.engine", count, "execution units started");

        let mut answers = AnswerBuffer::new();
        for unit in units {
            let payload = self.join_unit(unit, budget).await?;
            answers.push(&payload);
        }
        debug!(
            target: "hive.worker.engine",
            count,
            bytes = answers.len(),
            remaining_ms = budget.remaining().as_millis() as u64,
            "batch complete"
        );
        Ok(answers)
    }

    fn spawn_unit(&self, index: usize, payload: Vec<u8>) -> WorkerResult<Unit> {
        let (tx, rx) = oneshot::channel();
        let compute = Arc::clone(&self.compute);
        let affinity = Affinity::for_unit(index, self.pin);

        let handle = thread::Builder::new()
            .name(format!("hive-unit-{index}"))
            .spawn(move || {
                affinity.apply();
                let out = compute.compute(&payload);
                // receiver is gone only if the round was already aborted
                let _ = tx.send(out);
            })
            .map_err(|source| WorkerError::Spawn { index, source })?;

        Ok(Unit { index, handle, rx })
    }

    async fn join_unit(&self, unit: Unit, budget: &mut DeadlineBudget) -> WorkerResult<Vec<u8>> {
        let Unit {
            index,
            handle,
            mut rx,
        } = unit;
        let first_wait = Instant::now();
        let mut granted = 0u32;

        loop {
            let started = Instant::now();

            match tokio::time::timeout(budget.remaining(), &mut rx).await {
                Ok(Ok(payload)) => {
                    budget.consume(started.elapsed());
                    trace!(target: "hive.worker.engine", index, bytes = payload.len(), "unit joined");
                    return Ok(payload);
                }
                Ok(Err(_)) => {
                    let reason = match handle.join() {
                        Err(panic) => panic_reason(panic),
                        Ok(()) => "unit exited without a result".to_string(),
                    };
                    return Err(WorkerError::UnitFailed { index, reason });
                }
                Err(_) => {
                    if self.policy.exhausted(granted) {
                        return Err(WorkerError::Stalled {
                            index,
                            extensions: granted,
                            waited: first_wait.elapsed(),
                        });
                    }
                    let remaining = budget.extend();
                    granted += 1;
                    warn!(
                        target: "hive.worker.engine",
                        index,
                        extension_ms = budget.extension().as_millis() as u64,
                        remaining_ms = remaining.as_millis() as u64,
                        "join timed out; extending deadline"
                    );
                }
            }
        }
    }
}

fn panic_reason(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hive_wire::decode_answers;

    use super::*;

    fn doubler() -> Arc<dyn Compute> {
        Arc::new(|task: &[u8]| {
            let mut word = [0u8; 8];
            word.copy_from_slice(task);
            (u64::from_ne_bytes(word) * 2).to_ne_bytes().to_vec()
        })
    }

    fn budget(ms: u64, extension_ms: u64) -> DeadlineBudget {
        DeadlineBudget::new(Duration::from_millis(ms), Duration::from_millis(extension_ms))
    }

    fn decode_u64s(answers: &AnswerBuffer) -> Vec<u64> {
        decode_answers(answers.as_bytes(), answers.count())
            .unwrap()
            .into_iter()
            .map(|b| u64::from_ne_bytes(b.try_into().unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn doubles_every_task() {
        let engine = Engine::new(4, doubler());
        let tasks = (0u64..4).map(|i| i.to_ne_bytes().to_vec()).collect();
        let mut budget = budget(5_000, 10_000);

        let answers = engine.execute(tasks, &mut budget).await.unwrap();
        assert_eq!(answers.count(), 4);

        let mut values = decode_u64s(&answers);
        values.sort_unstable();
        assert_eq!(values, vec![0, 2, 4, 6]);
    }

    #[tokio::test]
    async fn budget_only_shrinks_without_timeouts() {
        let engine = Engine::new(2, doubler());
        let mut budget = budget(5_000, 10_000);
        let before = budget.remaining();

        for round in 0u64..3 {
            let tasks = vec![round.to_ne_bytes().to_vec(), (round + 1).to_ne_bytes().to_vec()];
            engine.execute(tasks, &mut budget).await.unwrap();
        }
        assert!(budget.remaining() <= before);
        assert_eq!(budget.extensions(), 0);
    }

    #[tokio::test]
    async fn timed_out_join_is_retried_with_one_extension() {
        let slow: Arc<dyn Compute> = Arc::new(|task: &[u8]| {
            thread::sleep(Duration::from_millis(300));
            task.to_vec()
        });
        let engine = Engine::new(1, slow).with_policy(JoinPolicy {
            extension_ms: 2_000,
            max_extensions: None,
        });
        let mut budget = budget(100, 2_000);

        let answers = engine
            .execute(vec![b"late".to_vec()], &mut budget)
            .await
            .unwrap();

        assert_eq!(decode_answers(answers.as_bytes(), 1).unwrap(), vec![b"late".as_slice()]);
        assert_eq!(budget.extensions(), 1);
        // 100ms initial + one 2s grant, minus the ~200ms spent after the grant
        assert!(budget.remaining() < Duration::from_millis(2_100));
        assert!(budget.remaining() > Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn bounded_policy_reports_stalled_unit() {
        let stuck: Arc<dyn Compute> = Arc::new(|task: &[u8]| {
            thread::sleep(Duration::from_secs(2));
            task.to_vec()
        });
        let engine = Engine::new(1, stuck).with_policy(JoinPolicy {
            extension_ms: 50,
            max_extensions: Some(1),
        });
        let mut budget = budget(20, 50);

        let err = engine
            .execute(vec![b"x".to_vec()], &mut budget)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Stalled { index: 0, extensions: 1, .. }));
    }

    #[tokio::test]
    async fn panicking_unit_fails_the_round() {
        let broken: Arc<dyn Compute> = Arc::new(|task: &[u8]| {
            if task == b"boom" {
                panic!("bad task");
            }
            task.to_vec()
        });
        let engine = Engine::new(2, broken).with_pinning(false);
        let mut budget = budget(5_000, 10_000);

        let err = engine
            .execute(vec![b"ok".to_vec(), b"boom".to_vec()], &mut budget)
            .await
            .unwrap_err();
        match err {
            WorkerError::UnitFailed { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("bad task"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn oversubscribed_batch_still_runs() {
        let engine = Engine::new(1, doubler());
        let tasks = (0u64..3).map(|i| i.to_ne_bytes().to_vec()).collect();
        let mut budget = budget(5_000, 10_000);

        let answers = engine.execute(tasks, &mut budget).await.unwrap();
        assert_eq!(answers.count(), 3);
    }
}
