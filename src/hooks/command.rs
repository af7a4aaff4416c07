//! Run a configured command as a cleanup task.

use crate::config::HookConfig;
use crate::shutdown::{CleanupTask, cleanup_task};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

/// Hook execution error.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("hook '{name}' failed to start: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("hook '{name}' could not be awaited: {source}")]
    Wait {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("hook '{name}' exited with {status}")]
    Failed { name: String, status: ExitStatus },

    #[error("hook '{name}' timed out after {timeout:?}")]
    TimedOut { name: String, timeout: Duration },
}

/// Run a hook command to completion.
///
/// The command inherits stdout and stderr and gets no stdin. A non-zero exit
/// status or an elapsed timeout is an error; a timed out command is killed.
#[instrument(skip_all, fields(hook = %hook.name))]
pub async fn run_hook(hook: &HookConfig) -> Result<(), HookError> {
    let start = Instant::now();
    debug!(command = %hook.command, args = ?hook.args, "running hook");

    let mut child = Command::new(&hook.command)
        .args(&hook.args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| HookError::Spawn {
            name: hook.name.clone(),
            source,
        })?;

    let status = match hook.timeout {
        Some(limit) => match timeout(limit, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                let _ = child.kill().await;
                return Err(HookError::TimedOut {
                    name: hook.name.clone(),
                    timeout: limit,
                });
            }
        },
        None => child.wait().await,
    }
    .map_err(|source| HookError::Wait {
        name: hook.name.clone(),
        source,
    })?;

    if !status.success() {
        return Err(HookError::Failed {
            name: hook.name.clone(),
            status,
        });
    }

    info!(
        duration_ms = start.elapsed().as_millis() as u64,
        "hook completed"
    );
    Ok(())
}

/// Wrap a hook into a cleanup task.
pub fn hook_task(hook: HookConfig) -> CleanupTask {
    cleanup_task(move || {
        let hook = hook.clone();
        async move { run_hook(&hook).await.map_err(anyhow::Error::from) }
    })
}
