//! CPU placement for execution units.
//!
//! Each unit of a batch asks for its own core (`0..count`). On Linux the request is applied with
//! `sched_setaffinity` from inside the unit's thread before any task code runs.
//! Elsewhere, or when the kernel refuses the mask, the unit keeps running unpinned and a warning is logged:
//! one unit per task is still guaranteed, only the placement is lost.
use std::num::NonZeroUsize;

use tracing::{trace, warn};

/// Placement request for one execution unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// Bind the unit to a single core index.
    Core(usize),
    /// Let the scheduler place the unit.
    Any,
}

impl Affinity {
    /// Placement for the `index`-th unit of a batch.
    #[inline]
    pub fn for_unit(index: usize, pin: bool) -> Self {
        if pin { Affinity::Core(index) } else { Affinity::Any }
    }

    /// Apply the request to the calling thread; returns `true` if the thread ended up pinned.
    pub fn apply(self) -> bool {
        let Affinity::Core(core) = self else {
            return false;
        };
        match pin_current_thread(core) {
            Ok(()) => {
                trace!(target: "hive.worker.affinity", core, "execution unit pinned");
                true
            }
            Err(e) => {
                warn!(
                    target: "hive.worker.affinity",
                    core,
                    error = %e,
                    "unable to pin execution unit; running unpinned"
                );
                false
            }
        }
    }
}

/// Number of cores the process may currently run on.
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(target_os = "linux")]
fn pin_current_thread(core: usize) -> std::io::Result<()> {
    linux_impl::pin_current_thread(core)
}

#[cfg(not(target_os = "linux"))]
fn pin_current_thread(_core: usize) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "per-thread CPU affinity is not supported on this platform",
    ))
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use std::io;

    pub fn pin_current_thread(core: usize) -> io::Result<()> {
        if core >= libc::CPU_SETSIZE as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("core index {core} exceeds CPU_SETSIZE"),
            ));
        }

        // SAFETY: cpu_set_t is plain data and all-zeroes is the empty set; pid 0 targets the calling thread.
        let rc = unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_SET(core, &mut set);
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if rc != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    pub fn current_cpu() -> i32 {
        // SAFETY: no arguments, returns -1 on failure.
        unsafe { libc::sched_getcpu() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_never_pins() {
        assert!(!Affinity::Any.apply());
        assert_eq!(Affinity::for_unit(3, false), Affinity::Any);
        assert_eq!(Affinity::for_unit(3, true), Affinity::Core(3));
    }

    #[test]
    fn at_least_one_core_is_reported() {
        assert!(available_cores() >= 1);
    }

    #[test]
    fn out_of_range_core_degrades_to_unpinned() {
        let pinned = std::thread::spawn(|| Affinity::Core(usize::MAX).apply())
            .join()
            .unwrap();
        assert!(!pinned);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn pinned_thread_runs_on_requested_core() {
        let (pinned, cpu) = std::thread::spawn(|| {
            let pinned = Affinity::Core(0).apply();
            (pinned, linux_impl::current_cpu())
        })
        .join()
        .unwrap();
        // core 0 may be outside the cgroup's cpuset; only check when pinning succeeded
        if pinned {
            assert_eq!(cpu, 0);
        }
    }
}
