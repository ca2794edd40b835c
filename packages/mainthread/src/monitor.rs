use std::time::Duration;

/// Lets code which runs outside the scheduler (block ticks, peripherals
/// doing their own main-thread work) respect a computer's time budget.
pub trait WorkMonitor {
    /// Whether work may run at all. False while the computer is cooling down
    /// or the whole tick is over budget.
    fn can_work(&self) -> bool;

    /// Whether optional work should start. Stricter than
    /// [`can_work`](Self::can_work): the computer must not have overrun its
    /// budget this tick.
    fn should_work(&self) -> bool;

    /// Charge externally run work to this computer and to the tick.
    fn track_work(&self, time: Duration);
}
