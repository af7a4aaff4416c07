//! Deadline timer that kills the process if shutdown takes too long.

use crate::shutdown::ProcessExit;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::error;

/// One-shot deadline armed when shutdown starts.
///
/// The timer runs as a detached tokio task and is never disarmed. It does
/// not keep the runtime alive: if the process finishes first, the task is
/// dropped along with the runtime.
#[derive(Debug)]
pub struct Watchdog {
    fired: oneshot::Receiver<i32>,
}

impl Watchdog {
    /// Arm the watchdog: after `deadline`, call `exit` with `code`.
    pub fn arm(deadline: Duration, code: i32, exit: Arc<dyn ProcessExit>) -> Self {
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            error!(
                max_shutdown_time = %humantime::format_duration(deadline),
                exit_code = code,
                "could not stop the process in time"
            );
            exit.exit(code);
            let _ = tx.send(code);
        });

        Self { fired: rx }
    }

    /// Resolves with the exit code once the deadline passed and the exit was
    /// requested. Never resolves if the timer task was dropped.
    pub async fn fired(self) -> i32 {
        match self.fired.await {
            Ok(code) => code,
            Err(_) => std::future::pending().await,
        }
    }
}
