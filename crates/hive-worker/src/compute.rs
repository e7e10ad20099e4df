/// Task-compute capability: turns one opaque task payload into one result payload.
///
/// Implementations run on execution-unit threads, one call per task, so they must be `Send + Sync`.
/// A panic inside `compute` fails the whole round.
pub trait Compute: Send + Sync + 'static {
    fn compute(&self, task: &[u8]) -> Vec<u8>;
}

impl<F> Compute for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
{
    #[inline]
    fn compute(&self, task: &[u8]) -> Vec<u8> {
        self(task)
    }
}
