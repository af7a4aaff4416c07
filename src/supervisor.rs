//! Supervised child process.
//!
//! The child's own exit is the natural end of work. When shutdown starts for
//! another reason, the registered stop task asks it to terminate, escalates to
//! a kill after the grace period and reaps it.

use crate::shutdown::{CleanupTask, cleanup_task};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// A running child command owned by a background task.
#[derive(Debug)]
pub struct ChildProcess {
    pid: Option<u32>,
    exited: oneshot::Receiver<io::Result<ExitStatus>>,
    stop: mpsc::Sender<oneshot::Sender<()>>,
}

impl ChildProcess {
    /// Spawn `program` with `args`, inheriting stdio.
    ///
    /// A stop gives the child `grace_period` to exit after SIGTERM before it
    /// is killed. Must be called from within a tokio runtime.
    pub fn spawn(program: &str, args: &[String], grace_period: Duration) -> io::Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();
        info!(program, pid, "child process started");

        let (exit_tx, exit_rx) = oneshot::channel();
        let (stop_tx, mut stop_rx) = mpsc::channel::<oneshot::Sender<()>>(1);

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Some(ack) = stop_rx.recv() => {
                    let status = terminate(&mut child, grace_period).await;
                    let _ = ack.send(());
                    status
                }
            };
            let _ = exit_tx.send(status);
        });

        Ok(Self {
            pid,
            exited: exit_rx,
            stop: stop_tx,
        })
    }

    /// OS process id, if the child was still running when spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the child to exit, on its own or through the stop task.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        match (&mut self.exited).await {
            Ok(status) => status,
            Err(_) => Err(io::Error::other("child supervisor task ended")),
        }
    }

    /// A cleanup task that stops the child and waits until it is reaped.
    /// Succeeds immediately if the child already exited.
    pub fn stop_task(&self) -> CleanupTask {
        let stop = self.stop.clone();
        cleanup_task(move || {
            let stop = stop.clone();
            async move {
                let (ack_tx, ack_rx) = oneshot::channel();
                if stop.send(ack_tx).await.is_err() {
                    return Ok(());
                }
                let _ = ack_rx.await;
                Ok(())
            }
        })
    }
}

/// Send SIGTERM, wait up to `grace_period`, then kill. Returns the reaped status.
async fn terminate(child: &mut Child, grace_period: Duration) -> io::Result<ExitStatus> {
    let pid = child.id();

    if request_exit(child) {
        info!(
            pid,
            grace_period = %humantime::format_duration(grace_period),
            "terminating child process"
        );
        if let Ok(status) = tokio::time::timeout(grace_period, child.wait()).await {
            return status;
        }
        warn!(pid, "child ignored SIGTERM, killing it");
    }

    if let Err(e) = child.start_kill() {
        warn!(pid, error = %e, "failed to kill child process");
    }
    child.wait().await
}

/// Ask the child to exit on its own. Returns false when that is not possible
/// and the caller should kill it right away.
#[cfg(unix)]
fn request_exit(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    // SAFETY: `pid` belongs to a child that has not been reaped yet, so it
    // cannot have been reused by another process.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        warn!(pid, error = %io::Error::last_os_error(), "failed to send SIGTERM");
    }
    rc == 0
}

#[cfg(not(unix))]
fn request_exit(_child: &Child) -> bool {
    false
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::time::Instant;

    const GRACE: Duration = Duration::from_secs(10);

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_child_exit_is_observed() {
        let mut child = ChildProcess::spawn("sh", &sh("exit 4"), GRACE).unwrap();
        assert!(child.pid().is_some());

        let status = child.wait().await.unwrap();
        assert_eq!(status.code(), Some(4));
    }

    #[tokio::test]
    async fn test_stop_task_sends_sigterm() {
        let mut child = ChildProcess::spawn("sleep", &["30".to_string()], GRACE).unwrap();
        let stop = child.stop_task();

        tokio::time::timeout(Duration::from_secs(5), stop())
            .await
            .expect("stop task hung")
            .unwrap();

        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }

    #[tokio::test]
    async fn test_child_can_clean_up_on_sigterm() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("flushed");
        let script = format!(
            "trap 'touch {}; kill $!; exit 0' TERM; sleep 30 & wait",
            marker.display()
        );
        let mut child = ChildProcess::spawn("sh", &sh(&script), GRACE).unwrap();
        let stop = child.stop_task();
        tokio::time::sleep(Duration::from_millis(200)).await;

        stop().await.unwrap();

        let status = child.wait().await.unwrap();
        assert!(status.success());
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_stop_escalates_to_kill_after_grace_period() {
        let grace = Duration::from_millis(200);
        let mut child = ChildProcess::spawn("sh", &sh("trap '' TERM; sleep 30"), grace).unwrap();
        let stop = child.stop_task();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        tokio::time::timeout(Duration::from_secs(5), stop())
            .await
            .expect("stop task hung")
            .unwrap();
        assert!(started.elapsed() >= grace);

        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
    }

    #[tokio::test]
    async fn test_stop_after_exit_is_ok() {
        let mut child = ChildProcess::spawn("true", &[], GRACE).unwrap();
        child.wait().await.unwrap();

        let stop = child.stop_task();
        assert!(stop().await.is_ok());
    }

    #[test]
    fn test_spawn_missing_program() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        assert!(ChildProcess::spawn("/nonexistent/gracestop-child", &[], GRACE).is_err());
    }
}
