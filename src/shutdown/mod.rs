//! Graceful shutdown: task registry, coordinator and trigger listeners.

mod coordinator;
mod error;
mod exit;
mod listener;
mod registry;
mod sink;
mod trigger;
mod watchdog;

pub use coordinator::{Coordinator, Outcome, State};
pub use error::{InstallError, ShutdownError};
pub use exit::{ProcessExit, StdExit};
pub use listener::Installation;
pub use registry::{CleanupTask, TaskRegistry, cleanup_task};
pub use sink::{ErrorSink, TracingSink};
pub use trigger::{Trigger, TriggerKind, TriggerPolicy};
pub use watchdog::Watchdog;
