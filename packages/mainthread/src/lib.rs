//! A fair, budgeted scheduler for work which has to run on the server's main
//! thread.
//!
//! Each computer owns an [`Executor`]. Tasks queued on it are run by
//! [`MainThread::tick`], which picks the executor with the least accumulated
//! virtual time, runs one of its tasks and repeats until the tick's global
//! budget is spent. A tick which overruns its budget is paid back by skipping
//! later ticks.
//!
//! A computer which overruns its own per-tick budget goes through
//! [`ExecutorState::Hot`] and [`ExecutorState::Cooling`] and sits out ticks
//! until a full tick's budget has been restored.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! use cubicle_mainthread::{MainThread, MainThreadConfig, NoopMetrics};
//!
//! let main = MainThread::new(MainThreadConfig::default());
//! let executor = main.create_executor(Arc::new(NoopMetrics));
//!
//! let ran = Arc::new(AtomicBool::new(false));
//! let flag = ran.clone();
//! assert!(executor.enqueue(move || flag.store(true, Ordering::SeqCst)));
//!
//! main.tick();
//! assert!(ran.load(Ordering::SeqCst));
//! ```

mod config;
mod executor;
mod metrics;
mod monitor;
mod scheduler;

pub use config::MainThreadConfig;
pub use executor::{Executor, ExecutorState, MAX_TASKS};
pub use metrics::{Metric, MetricsObserver, NoopMetrics};
pub use monitor::WorkMonitor;
pub use scheduler::MainThread;
