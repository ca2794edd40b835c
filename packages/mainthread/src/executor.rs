use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::nanos;
use crate::metrics::{Metric, MetricsObserver};
use crate::monitor::WorkMonitor;
use crate::scheduler::MainThread;

/// Most tasks an executor will hold before [`Executor::enqueue`] refuses more.
pub const MAX_TASKS: usize = 5000;

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where an executor is in its budget cycle.
///
/// `Cool` executors run normally. Overrunning the per-computer budget makes
/// an executor `Hot`; at the next tick it starts `Cooling` and stays there
/// until a full tick's budget has been restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Cool,
    Hot,
    Cooling,
}

pub(crate) struct ExecutorShared {
    pub(crate) id: u64,
    metrics: Arc<dyn MetricsObserver>,
    inner: Mutex<Inner>,
}

pub(crate) struct Inner {
    pub(crate) tasks: VecDeque<Task>,
    /// Set while the executor is in the scheduler's queue or being run by it.
    pub(crate) on_queue: bool,
    /// Externally tracked time not yet folded into `virtual_time`.
    pending_time: i64,
    pub(crate) virtual_time: i64,
    pub(crate) budget: i64,
    /// The tick `budget` belongs to. `None` before any time is consumed.
    pub(crate) current_tick: Option<u64>,
    pub(crate) state: ExecutorState,
}

impl Inner {
    pub(crate) fn update_time(&mut self) {
        self.virtual_time = self.virtual_time.saturating_add(self.pending_time);
        self.pending_time = 0;
    }
}

impl ExecutorShared {
    pub(crate) fn new(id: u64, metrics: Arc<dyn MetricsObserver>) -> Self {
        Self {
            id,
            metrics,
            inner: Mutex::new(Inner {
                tasks: VecDeque::with_capacity(4),
                on_queue: false,
                pending_time: 0,
                virtual_time: 0,
                budget: 0,
                current_tick: None,
                state: ExecutorState::Cool,
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Charge `time` nanoseconds against this tick's budget, registering the
    /// executor for cooling if that overruns it.
    pub(crate) fn consume_time(self: &Arc<Self>, inner: &mut Inner, scheduler: &MainThread, time: i64) {
        self.metrics
            .observe(Metric::ServerTasks, u64::try_from(time).unwrap_or(0));

        // A new tick means the last one was not overrun, so the budget starts
        // afresh.
        let tick = scheduler.current_tick();
        if inner.current_tick != Some(tick) {
            inner.current_tick = Some(tick);
            inner.budget = scheduler.config().max_computer_nanos();
        }

        inner.budget = inner.budget.saturating_sub(time);
        if inner.budget < 0 && inner.state == ExecutorState::Cool {
            inner.state = ExecutorState::Hot;
            tracing::debug!(executor = self.id, budget = inner.budget, "executor is hot");
            scheduler.cooling(self.clone());
        }
    }
}

/// A computer's handle onto the main thread.
///
/// Tasks queued here run on whichever thread calls [`MainThread::tick`], at
/// most one per executor turn, in fair order with other computers' tasks.
#[derive(Clone)]
pub struct Executor {
    scheduler: Arc<MainThread>,
    pub(crate) shared: Arc<ExecutorShared>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("Executor")
            .field("id", &self.shared.id)
            .field("state", &inner.state)
            .field("tasks", &inner.tasks.len())
            .field("virtual_time", &inner.virtual_time)
            .finish()
    }
}

impl Executor {
    pub(crate) fn new(scheduler: Arc<MainThread>, shared: Arc<ExecutorShared>) -> Self {
        Self { scheduler, shared }
    }

    /// Queue a task. Returns `false` without queueing when the executor
    /// already holds [`MAX_TASKS`] tasks.
    ///
    /// Panics inside a task are not caught and unwind out of
    /// [`MainThread::tick`].
    pub fn enqueue(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let mut inner = self.shared.lock();
        if inner.tasks.len() >= MAX_TASKS {
            return false;
        }
        inner.tasks.push_back(Box::new(task));
        if !inner.on_queue && inner.state == ExecutorState::Cool {
            self.scheduler.queue(&self.shared, &mut inner);
        }
        true
    }

    pub fn has_work(&self) -> bool {
        !self.shared.lock().tasks.is_empty()
    }

    pub fn queued_tasks(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    pub fn state(&self) -> ExecutorState {
        self.shared.lock().state
    }

    /// Time this executor has been charged with so far, used to order
    /// executors fairly.
    pub fn virtual_time(&self) -> Duration {
        let inner = self.shared.lock();
        Duration::from_nanos(u64::try_from(inner.virtual_time).unwrap_or(0))
    }
}

impl WorkMonitor for Executor {
    fn can_work(&self) -> bool {
        self.shared.lock().state != ExecutorState::Cooling && self.scheduler.can_execute()
    }

    fn should_work(&self) -> bool {
        self.shared.lock().state == ExecutorState::Cool && self.scheduler.can_execute()
    }

    fn track_work(&self, time: Duration) {
        let time = nanos(time);
        {
            let mut inner = self.shared.lock();
            inner.pending_time = inner.pending_time.saturating_add(time);
            self.shared.consume_time(&mut inner, &self.scheduler, time);
        }
        self.scheduler.consume_time(time);
    }
}
