//! Virtual computers: terminals, filesystems, main-thread scheduling and
//! wired networks, plus the wire formats clients use to view them.
//!
//! Each subsystem lives in its own crate and is re-exported here as a
//! module. This crate adds the shared [`CubicleConfig`] and a
//! [`ComputerEnvironment`] tying one computer's pieces together.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use cubicle::mainthread::{MainThread, NoopMetrics};
//! use cubicle::{ComputerEnvironment, CubicleConfig};
//!
//! let config = CubicleConfig::load("cubicle.json")?;
//! let main_thread = MainThread::new(config.main_thread());
//! let computer = ComputerEnvironment::new(0, &config, Path::new("world"), &main_thread, Arc::new(NoopMetrics));
//! computer.terminal().write("Hello!");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod environment;

pub use cubicle_mainthread as mainthread;
pub use cubicle_protocol as protocol;
pub use cubicle_terminal as terminal;
pub use cubicle_vfs as vfs;
pub use cubicle_wired as wired;

pub use config::{ConfigError, CubicleConfig};
pub use environment::{ComputerEnvironment, EnvironmentError};
