/// Measurements reported by executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Time spent running main-thread work on behalf of a computer, in
    /// nanoseconds. Covers both queued tasks and work reported through
    /// [`crate::WorkMonitor::track_work`].
    ServerTasks,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::ServerTasks => "server_tasks",
        }
    }
}

pub trait MetricsObserver: Send + Sync {
    fn observe(&self, metric: Metric, value: u64);
}

/// Discards every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsObserver for NoopMetrics {
    fn observe(&self, _metric: Metric, _value: u64) {}
}
