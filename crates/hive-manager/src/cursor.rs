use hive_wire::TaskList;

/// Global task accounting for one run.
///
/// Tasks are handed out strictly in list order; `sent - received` is the number of tasks currently out on workers.
#[derive(Debug, Clone)]
pub struct TaskCursor {
    tasks: TaskList,
    sent: usize,
    received: usize,
}

impl TaskCursor {
    pub fn new(tasks: TaskList) -> Self {
        Self {
            tasks,
            sent: 0,
            received: 0,
        }
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    /// Tasks not yet assigned to any worker.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.total() - self.sent
    }

    /// Tasks assigned but not yet answered.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.sent - self.received
    }

    #[inline]
    pub fn received(&self) -> usize {
        self.received
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.received == self.total()
    }

    /// Assign the next `min(cores, remaining)` tasks.
    pub fn take(&mut self, cores: usize) -> &[Vec<u8>] {
        let n = cores.min(self.remaining());
        let start = self.sent;
        self.sent += n;
        self.tasks.slice(start..start + n).unwrap_or_default()
    }

    /// Account for `n` answers that arrived.
    pub fn record_answers(&mut self, n: usize) {
        self.received = (self.received + n).min(self.sent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(n: u8) -> TaskCursor {
        TaskCursor::new(TaskList::from_blocks((0..n).map(|i| vec![i])))
    }

    #[test]
    fn batches_are_bounded_by_cores_and_remaining() {
        let mut c = cursor(5);
        let sizes: Vec<usize> = (0..4).map(|_| c.take(2).len()).collect();
        assert_eq!(sizes, vec![2, 2, 1, 0]);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn tasks_are_assigned_in_list_order() {
        let mut c = cursor(4);
        assert_eq!(c.take(3), &[vec![0u8], vec![1u8], vec![2u8]]);
        assert_eq!(c.take(3), &[vec![3u8]]);
    }

    #[test]
    fn completion_tracks_answers() {
        let mut c = cursor(3);
        c.take(3);
        assert_eq!(c.outstanding(), 3);
        c.record_answers(2);
        assert!(!c.is_complete());
        c.record_answers(1);
        assert!(c.is_complete());
        assert_eq!(c.outstanding(), 0);
    }

    #[test]
    fn empty_list_is_complete_immediately() {
        let mut c = cursor(0);
        assert!(c.is_complete());
        assert!(c.take(8).is_empty());
    }
}
