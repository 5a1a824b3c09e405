//! Cooperative search control: stop flag, deadline and shared counters.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Externally visible stop switch shared between a searcher facade and
/// the searches it runs. Also backs the interruptible minimum-think-time
/// sleep.
#[derive(Default)]
pub struct StopHandle {
    flag: AtomicBool,
    gate: Mutex<()>,
    wakeup: Condvar,
}

impl StopHandle {
    pub fn new() -> Arc<StopHandle> {
        Arc::new(StopHandle::default())
    }

    /// Requests cooperative cancellation; the next abort poll trips.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Release);
        let _guard = self.gate.lock();
        self.wakeup.notify_all();
    }

    /// Clears the flag; called on entry to a new search.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleeps up to `duration`, waking early when a stop is requested.
    pub fn sleep_interruptibly(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut guard = self.gate.lock();
        while !self.is_set() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.wakeup.wait_for(&mut guard, deadline - now);
        }
    }
}

/// Per-search shared state: the sticky abort latch, the optional
/// monotonic deadline, and the atomic telemetry counters updated by
/// every worker.
pub struct SearchControl {
    stop: Arc<StopHandle>,
    deadline: Option<Instant>,
    aborted: AtomicBool,

    pub visited: AtomicU64,
    pub cutoffs: AtomicU64,
    pub tt_hits: AtomicU64,
    pub tt_stores: AtomicU64,
    pub pv_researches: AtomicU64,
    active_tasks: AtomicUsize,
    max_active_tasks: AtomicUsize,
}

impl SearchControl {
    /// `deadline` of `None` means no time bound.
    pub fn new(stop: Arc<StopHandle>, deadline: Option<Instant>) -> SearchControl {
        SearchControl {
            stop,
            deadline,
            aborted: AtomicBool::new(false),
            visited: AtomicU64::new(0),
            cutoffs: AtomicU64::new(0),
            tt_hits: AtomicU64::new(0),
            tt_stores: AtomicU64::new(0),
            pv_researches: AtomicU64::new(0),
            active_tasks: AtomicUsize::new(0),
            max_active_tasks: AtomicUsize::new(0),
        }
    }

    /// Polls the stop flag and the deadline. Once either trips, the
    /// abort latch stays set for the rest of the search.
    #[inline]
    pub fn should_abort(&self) -> bool {
        if self.aborted.load(Ordering::Relaxed) {
            return true;
        }
        if self.stop.is_set() {
            self.aborted.store(true, Ordering::Relaxed);
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.aborted.store(true, Ordering::Relaxed);
                return true;
            }
        }
        false
    }

    /// Whether the abort latch tripped at any point.
    #[inline]
    pub fn was_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Marks one more concurrently running task, tracking the high-water
    /// mark for telemetry.
    pub fn task_started(&self) {
        let active = self.active_tasks.fetch_add(1, Ordering::Relaxed) + 1;
        self.max_active_tasks.fetch_max(active, Ordering::Relaxed);
    }

    pub fn task_finished(&self) {
        self.active_tasks.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn max_active_tasks(&self) -> u64 {
        self.max_active_tasks.load(Ordering::Relaxed) as u64
    }

    /// Snapshot of the telemetry counters, used to compute per-iteration
    /// deltas between deepening steps.
    pub fn counters(&self) -> CounterSnapshot {
        CounterSnapshot {
            visited: self.visited.load(Ordering::Relaxed),
            cutoffs: self.cutoffs.load(Ordering::Relaxed),
            tt_hits: self.tt_hits.load(Ordering::Relaxed),
            tt_stores: self.tt_stores.load(Ordering::Relaxed),
            pv_researches: self.pv_researches.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one instant.
#[derive(Clone, Copy, Debug, Default)]
pub struct CounterSnapshot {
    pub visited: u64,
    pub cutoffs: u64,
    pub tt_hits: u64,
    pub tt_stores: u64,
    pub pv_researches: u64,
}

impl CounterSnapshot {
    /// Component-wise difference since `earlier`.
    pub fn since(&self, earlier: &CounterSnapshot) -> CounterSnapshot {
        CounterSnapshot {
            visited: self.visited - earlier.visited,
            cutoffs: self.cutoffs - earlier.cutoffs,
            tt_hits: self.tt_hits - earlier.tt_hits,
            tt_stores: self.tt_stores - earlier.tt_stores,
            pv_researches: self.pv_researches - earlier.pv_researches,
        }
    }
}
