use std::time::Duration;

/// Time limits for a [`crate::MainThread`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainThreadConfig {
    /// Wall-clock time all executors may share in one tick.
    pub max_global_time: Duration,
    /// Wall-clock time a single executor may use in one tick before it has to
    /// cool down.
    pub max_computer_time: Duration,
}

impl Default for MainThreadConfig {
    fn default() -> Self {
        Self {
            max_global_time: Duration::from_millis(10),
            max_computer_time: Duration::from_millis(5),
        }
    }
}

impl MainThreadConfig {
    pub(crate) fn max_global_nanos(&self) -> i64 {
        nanos(self.max_global_time)
    }

    pub(crate) fn max_computer_nanos(&self) -> i64 {
        nanos(self.max_computer_time)
    }
}

pub(crate) fn nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}
