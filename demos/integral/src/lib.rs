//! Numerical integration of `exp(x)` spread over a hive cluster.
//!
//! The manager splits `[left, right]` into equal slices of midpoint-rule steps; each worker task
//! integrates one slice and answers with its partial sum.

use tracing::warn;

/// Encoded size of an [`IntegralTask`].
pub const TASK_BYTES: usize = 24;

/// One slice of the integration domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegralTask {
    pub left: f64,
    pub step: f64,
    pub num_steps: u64,
}

impl IntegralTask {
    /// Native-endian `[left][step][num_steps]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TASK_BYTES);
        out.extend_from_slice(&self.left.to_ne_bytes());
        out.extend_from_slice(&self.step.to_ne_bytes());
        out.extend_from_slice(&self.num_steps.to_ne_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != TASK_BYTES {
            return None;
        }
        let word = |i: usize| -> Option<[u8; 8]> { bytes.get(i * 8..(i + 1) * 8)?.try_into().ok() };
        Some(Self {
            left: f64::from_ne_bytes(word(0)?),
            step: f64::from_ne_bytes(word(1)?),
            num_steps: u64::from_ne_bytes(word(2)?),
        })
    }

    /// Midpoint-rule sum of `exp(x)` over this slice.
    pub fn integrate(&self) -> f64 {
        (0..self.num_steps)
            .map(|i| (self.left + self.step * (i as f64 + 0.5)).exp())
            .sum::<f64>()
            * self.step
    }
}

/// Largest midpoint step whose error term stays under `precision` for `exp(x)` on `(.., right]`.
pub fn step_for(right: f64, precision: f64) -> f64 {
    let max_second_derivative = right.exp();
    if max_second_derivative == 0.0 {
        return 1.0;
    }
    (24.0 * precision / max_second_derivative).cbrt()
}

/// Cut `[left, right]` into `parts` tasks of whole steps; the last task absorbs the remainder.
pub fn split(left: f64, right: f64, precision: f64, parts: usize) -> Vec<IntegralTask> {
    let parts = parts.max(1);
    let width = (right - left).abs();
    let steps = (width / step_for(right, precision)).ceil() as u64 + 2;
    let step = (right - left) / steps as f64;
    let per_part = steps / parts as u64;

    let mut tasks: Vec<IntegralTask> = (0..parts as u64)
        .map(|i| IntegralTask {
            left: left + step * (per_part * i) as f64,
            step,
            num_steps: per_part,
        })
        .collect();
    if let Some(last) = tasks.last_mut() {
        last.num_steps += steps % parts as u64;
    }
    tasks
}

/// Worker-side compute: decode one task, integrate it, answer with the partial sum.
///
/// An undecodable task answers `NaN` so the manager still receives one answer per task.
pub fn compute(task: &[u8]) -> Vec<u8> {
    let sum = match IntegralTask::decode(task) {
        Some(task) => task.integrate(),
        None => {
            warn!(target: "hive.demo.integral", bytes = task.len(), "malformed integral task");
            f64::NAN
        }
    };
    sum.to_ne_bytes().to_vec()
}

/// Sum the partial results of a run.
pub fn total<'a>(answers: impl IntoIterator<Item = &'a [u8]>) -> f64 {
    answers
        .into_iter()
        .map(|a| <[u8; 8]>::try_from(a).map(f64::from_ne_bytes).unwrap_or(f64::NAN))
        .sum()
}
