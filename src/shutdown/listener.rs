//! Binding the coordinator to the process: signals, panics and async faults.

use crate::shutdown::coordinator::State;
use crate::shutdown::error::panic_message;
use crate::shutdown::{Coordinator, InstallError, Outcome, Trigger};
use std::panic::PanicHookInfo;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub(crate) type PanicHook = Arc<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

/// Handle to the installed listener task.
#[derive(Debug)]
pub struct Installation {
    handle: JoinHandle<Option<Outcome>>,
}

impl Installation {
    /// Wait for the listener to finish.
    ///
    /// Returns the outcome if the listener ran the shutdown itself, or `None`
    /// if it was disarmed by a trigger that came from somewhere else (for
    /// example [`Coordinator::drain`]).
    pub async fn wait(self) -> Option<Outcome> {
        self.handle.await.ok().flatten()
    }
}

impl Coordinator {
    /// Install the trigger listeners.
    ///
    /// Binds:
    /// - `SIGTERM` and `SIGINT` as termination signals
    /// - `SIGUSR1` and `SIGUSR2` as user signals
    /// - a panic hook reporting uncaught panics as sync faults
    /// - the fault channel used by [`Coordinator::report_fault`]
    ///
    /// Must be called from within a tokio runtime, at most once.
    pub fn install(&self) -> Result<Installation, InstallError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(InstallError::NoRuntime);
        }

        match self.state() {
            State::Idle => {}
            State::Installed => return Err(InstallError::AlreadyInstalled),
            State::Terminating | State::Exited => return Err(InstallError::AlreadyTerminating),
        }

        let signals = Signals::bind()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let disarm = self.inner.disarm.subscribe();

        {
            // Hook and fault channel go in before `Installed` is visible, so a
            // trigger that sees `Installed` always finds something to disarm.
            let mut state = self.inner.state.lock();
            match *state {
                State::Idle => {}
                State::Installed => return Err(InstallError::AlreadyInstalled),
                State::Terminating | State::Exited => {
                    return Err(InstallError::AlreadyTerminating);
                }
            }
            self.install_panic_hook(tx.clone());
            *self.inner.faults.lock() = Some(tx);
            *state = State::Installed;
        }

        info!(signals = ?Signals::NAMES, "shutdown listeners installed");

        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.listen(signals, rx, disarm).await });

        Ok(Installation { handle })
    }

    /// Stop listening for triggers: stop the listener task, close the fault
    /// channel and put back the previous panic hook.
    pub(super) fn disarm(&self) {
        self.inner.disarm.fire();
        self.inner.faults.lock().take();

        if let Some(previous) = self.inner.previous_hook.lock().take() {
            std::panic::set_hook(Box::new(move |info| previous(info)));
        }
    }

    fn install_panic_hook(&self, faults: mpsc::UnboundedSender<Trigger>) {
        let previous: PanicHook = Arc::from(std::panic::take_hook());
        *self.inner.previous_hook.lock() = Some(Arc::clone(&previous));

        std::panic::set_hook(Box::new(move |info| {
            previous(info);

            let message = panic_message(info.payload());
            let error = match info.location() {
                Some(location) => anyhow::anyhow!("{message} at {location}"),
                None => anyhow::anyhow!("{message}"),
            };
            let _ = faults.send(Trigger::sync_fault(error));
        }));
    }

    async fn listen(
        self,
        mut signals: Signals,
        mut faults: mpsc::UnboundedReceiver<Trigger>,
        mut disarm: broadcast::Receiver<()>,
    ) -> Option<Outcome> {
        let trigger = tokio::select! {
            trigger = signals.recv() => trigger,
            Some(trigger) = faults.recv() => trigger,
            _ = disarm.recv() => {
                debug!("shutdown listeners disarmed");
                return None;
            }
        };

        drop(signals);
        drop(faults);

        info!(
            trigger = %trigger.kind(),
            source = trigger.source(),
            "received shutdown trigger"
        );

        Some(self.trigger(trigger).await)
    }
}

#[cfg(unix)]
struct Signals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
    sigusr1: tokio::signal::unix::Signal,
    sigusr2: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    const NAMES: [&'static str; 4] = ["SIGTERM", "SIGINT", "SIGUSR1", "SIGUSR2"];

    fn bind() -> Result<Self, InstallError> {
        use tokio::signal::unix::{SignalKind, signal};

        let bind = |kind: SignalKind, name: &'static str| {
            signal(kind).map_err(|source| InstallError::Signal {
                signal: name,
                source,
            })
        };

        Ok(Self {
            sigterm: bind(SignalKind::terminate(), "SIGTERM")?,
            sigint: bind(SignalKind::interrupt(), "SIGINT")?,
            sigusr1: bind(SignalKind::user_defined1(), "SIGUSR1")?,
            sigusr2: bind(SignalKind::user_defined2(), "SIGUSR2")?,
        })
    }

    async fn recv(&mut self) -> Trigger {
        tokio::select! {
            _ = self.sigterm.recv() => Trigger::termination("SIGTERM"),
            _ = self.sigint.recv() => Trigger::termination("SIGINT"),
            _ = self.sigusr1.recv() => Trigger::user_signal("SIGUSR1"),
            _ = self.sigusr2.recv() => Trigger::user_signal("SIGUSR2"),
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    const NAMES: [&'static str; 1] = ["Ctrl-C"];

    fn bind() -> Result<Self, InstallError> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Trigger {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        Trigger::termination("Ctrl-C")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShutdownOptions;
    use crate::shutdown::{ProcessExit, TracingSink};
    use std::time::Duration;
    use tokio::sync::Barrier;

    struct NoExit;

    impl ProcessExit for NoExit {
        fn exit(&self, _code: i32) {}
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drain_racing_install_leaves_nothing_armed() {
        for _ in 0..50 {
            let coordinator = Coordinator::with_collaborators(
                ShutdownOptions::default(),
                Arc::new(TracingSink),
                Arc::new(NoExit),
            )
            .unwrap();
            let barrier = Arc::new(Barrier::new(2));

            let drain = tokio::spawn({
                let coordinator = coordinator.clone();
                let barrier = Arc::clone(&barrier);
                async move {
                    barrier.wait().await;
                    coordinator.drain().await
                }
            });

            barrier.wait().await;
            let installed = coordinator.install();
            drain.await.unwrap();

            match installed {
                Ok(installation) => {
                    tokio::time::timeout(Duration::from_secs(5), installation.wait())
                        .await
                        .expect("listener outlived the shutdown pass");
                }
                Err(e) => assert!(matches!(e, InstallError::AlreadyTerminating)),
            }

            assert_eq!(coordinator.state(), State::Exited);
            assert!(coordinator.inner.faults.lock().is_none());
            assert!(coordinator.inner.previous_hook.lock().is_none());
        }
    }
}
