//! gracestop - coordinated, deadline-bounded graceful shutdown
//!
//! Subsystems register cleanup tasks with a [`Coordinator`] without knowing
//! about each other. When the process has to stop, whether from a signal, an
//! uncaught fault, or because the work ran out, every task runs
//! concurrently, failures are collected instead of aborting the others, and
//! a watchdog kills the process if cleanup misses its deadline.
//!
//! ```no_run
//! use gracestop::config::ShutdownOptions;
//! use gracestop::shutdown::{Coordinator, cleanup_task};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let coordinator = Coordinator::new(ShutdownOptions::default())?;
//! coordinator.register(&cleanup_task(|| async {
//!     // flush buffers, close connections...
//!     Ok(())
//! }));
//! let installation = coordinator.install()?;
//! installation.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod hooks;
pub mod shutdown;
pub mod supervisor;
pub mod util;

pub use config::{Config, ShutdownOptions};
pub use shutdown::{CleanupTask, Coordinator, Outcome, cleanup_task};
