use std::collections::BTreeMap;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::config::{nanos, MainThreadConfig};
use crate::executor::{Executor, ExecutorShared, ExecutorState, Inner};
use crate::metrics::MetricsObserver;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Executors waiting to run, keyed by virtual time and then creation order.
#[derive(Default)]
struct RunQueue {
    executors: BTreeMap<(i64, u64), Arc<ExecutorShared>>,
    /// Lowest virtual time seen at the head of the queue. Newly queued
    /// executors are raised to at least this.
    minimum_time: i64,
}

/// Runs computers' main-thread tasks within a per-tick time budget.
///
/// Call [`tick`](Self::tick) once per server tick from the thread which
/// should run tasks. Executors may queue work and report external work from
/// any thread.
///
/// Locking: an executor's own lock may be held while taking the queue lock,
/// never the other way round. Tasks run with no lock held.
pub struct MainThread {
    config: MainThreadConfig,
    queue: Mutex<RunQueue>,
    cooling: Mutex<Vec<Arc<ExecutorShared>>>,
    current_tick: AtomicU64,
    /// Remaining global budget in nanoseconds. May go negative when a tick
    /// overruns, which skips later ticks until it recovers.
    budget: AtomicI64,
    can_execute: AtomicBool,
    next_id: AtomicU64,
}

impl MainThread {
    pub fn new(config: MainThreadConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            queue: Mutex::new(RunQueue::default()),
            cooling: Mutex::new(Vec::new()),
            current_tick: AtomicU64::new(0),
            budget: AtomicI64::new(0),
            can_execute: AtomicBool::new(true),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &MainThreadConfig {
        &self.config
    }

    pub fn create_executor(self: &Arc<Self>, metrics: Arc<dyn MetricsObserver>) -> Executor {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Executor::new(self.clone(), Arc::new(ExecutorShared::new(id, metrics)))
    }

    /// Whether the current tick has any global budget.
    pub fn can_execute(&self) -> bool {
        self.can_execute.load(Ordering::Acquire)
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Acquire)
    }

    /// Number of executors waiting for a turn.
    pub fn queued_executors(&self) -> usize {
        lock(&self.queue).executors.len()
    }

    /// Add an executor to the run queue. The caller holds the executor's lock.
    pub(crate) fn queue(&self, executor: &Arc<ExecutorShared>, inner: &mut Inner) {
        debug_assert!(!inner.on_queue, "executor is already queued");
        inner.on_queue = true;
        inner.update_time();

        let mut queue = lock(&self.queue);
        let mut new_time = queue.minimum_time;
        // Executors which have never run start one slice behind.
        if inner.virtual_time == 0 {
            new_time += self.config.max_computer_nanos();
        }
        inner.virtual_time = inner.virtual_time.max(new_time);
        queue
            .executors
            .insert((inner.virtual_time, executor.id), executor.clone());
    }

    pub(crate) fn cooling(&self, executor: Arc<ExecutorShared>) {
        lock(&self.cooling).push(executor);
    }

    pub(crate) fn consume_time(&self, time: i64) {
        let _ = self
            .budget
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| Some(b.saturating_sub(time)));
    }

    /// Advance one tick: replenish budgets, cool down executors and run
    /// queued tasks until this tick's budget is spent.
    pub fn tick(&self) {
        let tick = self.current_tick.fetch_add(1, Ordering::AcqRel) + 1;

        // Unused budget does not carry over, but an overrun does.
        let max_global = self.config.max_global_nanos();
        let previous = match self.budget.fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| {
            Some(b.saturating_add(max_global).min(max_global))
        }) {
            Ok(previous) | Err(previous) => previous,
        };
        let budget = previous.saturating_add(max_global).min(max_global);
        let can_execute = budget > 0;
        self.can_execute.store(can_execute, Ordering::Release);

        let mut cooling = mem::take(&mut *lock(&self.cooling));
        cooling.retain(|executor| !self.tick_cooling(executor));
        lock(&self.cooling).extend(cooling);

        if !can_execute {
            tracing::trace!(tick, budget, "skipping overrun tick");
            return;
        }

        let start = Instant::now();
        let mut executed = 0usize;
        loop {
            let next = lock(&self.queue).executors.pop_first();
            let Some((_, executor)) = next else { break };

            let task_start = Instant::now();
            let task = {
                let mut inner = executor.lock();
                if inner.state == ExecutorState::Cool {
                    inner.tasks.pop_front()
                } else {
                    None
                }
            };
            if let Some(task) = task {
                task();
                executed += 1;
            }
            let task_stop = Instant::now();

            self.after_execute(&executor, nanos(task_stop - task_start));

            if nanos(task_stop - start) >= budget {
                break;
            }
        }

        let elapsed = nanos(start.elapsed());
        self.consume_time(elapsed);
        tracing::trace!(tick, executed, elapsed, budget, "main thread tick");
    }

    fn after_execute(&self, executor: &Arc<ExecutorShared>, time: i64) {
        let mut inner = executor.lock();
        executor.consume_time(&mut inner, self, time);

        inner.virtual_time = inner.virtual_time.saturating_add(time);
        inner.update_time();
        let requeue = inner.state == ExecutorState::Cool && !inner.tasks.is_empty();
        if !requeue {
            inner.on_queue = false;
        }

        let mut queue = lock(&self.queue);
        if requeue {
            queue
                .executors
                .insert((inner.virtual_time, executor.id), executor.clone());
        }

        let mut new_minimum = inner.virtual_time;
        if let Some((&(first, _), _)) = queue.executors.first_key_value() {
            new_minimum = new_minimum.min(first);
        }
        queue.minimum_time = queue.minimum_time.max(new_minimum);
    }

    /// Restore one tick of budget to a hot or cooling executor. Returns true
    /// once it is fully cooled.
    fn tick_cooling(&self, executor: &Arc<ExecutorShared>) -> bool {
        let mut inner = executor.lock();
        inner.state = ExecutorState::Cooling;
        inner.current_tick = Some(self.current_tick());
        let max_time = self.config.max_computer_nanos();
        inner.budget = inner.budget.saturating_add(max_time).min(max_time);
        if inner.budget < max_time {
            return false;
        }

        inner.state = ExecutorState::Cool;
        tracing::debug!(executor = executor.id, "executor cooled down");
        if !inner.tasks.is_empty() && !inner.on_queue {
            self.queue(executor, &mut inner);
        }
        true
    }
}
