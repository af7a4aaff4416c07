//! Cleanup tasks backed by external commands.

mod command;

pub use command::{HookError, hook_task, run_hook};
