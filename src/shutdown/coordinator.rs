//! Shutdown coordinator.
//!
//! Owns the termination protocol: on the first trigger it disarms every
//! listener, arms the watchdog, runs all registered cleanup tasks
//! concurrently, reports what failed and decides how the process exits.

use crate::config::{ConfigError, ShutdownOptions};
use crate::shutdown::error::panic_message;
use crate::shutdown::listener::PanicHook;
use crate::shutdown::{
    CleanupTask, ErrorSink, ProcessExit, ShutdownError, StdExit, TaskRegistry, TracingSink,
    Trigger, Watchdog,
};
use crate::util::StopSignal;
use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Lifecycle of the coordinator. A single pass: once terminating, it never
/// goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Installed,
    Terminating,
    Exited,
}

/// Result of a shutdown pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// All tasks succeeded and the trigger does not force an exit; the host
    /// decides how to stop.
    Completed { exit_code: i32 },
    /// The process exit was requested with `code`.
    Exited { code: i32 },
    /// The watchdog fired before all tasks settled.
    DeadlineExceeded { code: i32 },
    /// Another pass is already running or has finished.
    AlreadyTerminating,
}

pub(super) struct Inner {
    pub(super) options: ShutdownOptions,
    pub(super) registry: TaskRegistry,
    pub(super) state: Mutex<State>,
    pub(super) sink: Arc<dyn ErrorSink>,
    pub(super) exit: Arc<dyn ProcessExit>,
    /// Stops the installed listener task.
    pub(super) disarm: StopSignal,
    /// Fault channel of the installed listener.
    pub(super) faults: Mutex<Option<mpsc::UnboundedSender<Trigger>>>,
    /// Panic hook that was active before `install`.
    pub(super) previous_hook: Mutex<Option<PanicHook>>,
    /// Set once the shutdown pass settled.
    pub(super) outcome: watch::Sender<Option<Outcome>>,
}

/// Coordinates graceful shutdown. Cheap to clone; all clones share the same
/// task registry and state.
#[derive(Clone)]
pub struct Coordinator {
    pub(super) inner: Arc<Inner>,
}

impl Coordinator {
    /// Create a coordinator that logs failures and exits the real process.
    ///
    /// Fails if `options` do not validate.
    pub fn new(options: ShutdownOptions) -> Result<Self, ConfigError> {
        Self::with_collaborators(options, Arc::new(TracingSink), Arc::new(StdExit))
    }

    /// Create a coordinator with a custom error sink and exit primitive.
    pub fn with_collaborators(
        options: ShutdownOptions,
        sink: Arc<dyn ErrorSink>,
        exit: Arc<dyn ProcessExit>,
    ) -> Result<Self, ConfigError> {
        let errors = options.validate();
        if !errors.is_empty() {
            return Err(ConfigError::ValidationError(errors.join("; ")));
        }

        let (outcome, _) = watch::channel(None);

        Ok(Self {
            inner: Arc::new(Inner {
                options,
                registry: TaskRegistry::new(),
                state: Mutex::new(State::Idle),
                sink,
                exit,
                disarm: StopSignal::new(),
                faults: Mutex::new(None),
                previous_hook: Mutex::new(None),
                outcome,
            }),
        })
    }

    /// Configured options, before any trigger policy is applied.
    pub fn options(&self) -> &ShutdownOptions {
        &self.inner.options
    }

    /// Current state.
    pub fn state(&self) -> State {
        *self.inner.state.lock()
    }

    /// The task registry.
    pub fn registry(&self) -> &TaskRegistry {
        &self.inner.registry
    }

    /// Register a cleanup task. See [`TaskRegistry::register`].
    pub fn register(&self, task: &CleanupTask) {
        self.inner.registry.register(task);
    }

    /// Unregister a cleanup task. See [`TaskRegistry::unregister`].
    pub fn unregister(&self, task: &CleanupTask) {
        self.inner.registry.unregister(task);
    }

    /// Shut down because the work ran out.
    pub async fn drain(&self) -> Outcome {
        self.trigger(Trigger::natural_drain()).await
    }

    /// Wait until the shutdown pass has settled and return its outcome.
    ///
    /// Unlike a second [`trigger`](Self::trigger), this joins a pass that is
    /// already running instead of returning immediately.
    pub async fn finished(&self) -> Outcome {
        let mut rx = self.inner.outcome.subscribe();
        let settled = rx.wait_for(Option::is_some).await.ok().and_then(|o| *o);
        match settled {
            Some(outcome) => outcome,
            None => std::future::pending().await,
        }
    }

    /// Report an async fault.
    ///
    /// With listeners installed the fault is handed to the listener task.
    /// Otherwise a shutdown pass is spawned on the current runtime.
    pub fn report_fault(&self, error: anyhow::Error) {
        let trigger = Trigger::async_fault(error);
        let trigger = match self.inner.faults.lock().as_ref() {
            Some(tx) => match tx.send(trigger) {
                Ok(()) => return,
                Err(mpsc::error::SendError(trigger)) => trigger,
            },
            None => trigger,
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let coordinator = self.clone();
                handle.spawn(async move {
                    coordinator.trigger(trigger).await;
                });
            }
            Err(_) => {
                error!(
                    error = ?trigger.error(),
                    "async fault reported outside of a runtime, cannot shut down"
                );
            }
        }
    }

    /// Spawn a task whose error or panic is reported as an async fault.
    pub fn spawn_supervised<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let coordinator = self.clone();
        tokio::spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => coordinator.report_fault(e),
                Err(payload) => coordinator.report_fault(anyhow::anyhow!(
                    "task panicked: {}",
                    panic_message(payload.as_ref())
                )),
            }
        })
    }

    /// Run the shutdown protocol for `trigger`.
    ///
    /// Only the first trigger runs; later ones return
    /// [`Outcome::AlreadyTerminating`] immediately.
    pub async fn trigger(&self, trigger: Trigger) -> Outcome {
        {
            let mut state = self.inner.state.lock();
            if matches!(*state, State::Terminating | State::Exited) {
                debug!(
                    trigger = %trigger.kind(),
                    source = trigger.source(),
                    "shutdown already in progress, ignoring trigger"
                );
                return Outcome::AlreadyTerminating;
            }
            *state = State::Terminating;
        }

        self.disarm();

        let (kind, source, error) = trigger.into_parts();
        let options = self.inner.options.with_policy(kind.policy());

        info!(
            trigger = %kind,
            source,
            max_shutdown_time = %humantime::format_duration(options.max_shutdown_time),
            "graceful shutdown started"
        );

        let watchdog = Watchdog::arm(
            options.max_shutdown_time,
            options.watchdog_exit_code,
            Arc::clone(&self.inner.exit),
        );

        let mut failures = Vec::new();
        if let Some(error) = error {
            failures.push(ShutdownError::Trigger { kind, error });
        }

        let tasks = self.inner.registry.snapshot();
        info!(tasks = tasks.len(), "running shutdown tasks");

        tokio::select! {
            task_failures = run_tasks(tasks) => failures.extend(task_failures),
            code = watchdog.fired() => {
                return self.settle(Outcome::DeadlineExceeded { code });
            }
        }

        self.finish(failures, &options)
    }

    /// Report failures and pick the exit.
    fn finish(&self, failures: Vec<ShutdownError>, options: &ShutdownOptions) -> Outcome {
        if !failures.is_empty() {
            error!(failures = failures.len(), "errors happened during shutdown");
            for failure in &failures {
                self.inner.sink.report(failure);
            }
            let code = if options.exit_code != 0 {
                options.exit_code
            } else {
                1
            };
            return self.exit(code);
        }

        info!("all shutdown tasks completed");

        if options.auto_exit {
            return self.exit(options.exit_code);
        }

        self.settle(Outcome::Completed {
            exit_code: options.exit_code,
        })
    }

    fn exit(&self, code: i32) -> Outcome {
        *self.inner.state.lock() = State::Exited;
        info!(exit_code = code, "exiting");
        self.inner.exit.exit(code);
        self.settle(Outcome::Exited { code })
    }

    /// Enter `Exited` and publish the outcome to [`finished`](Self::finished).
    fn settle(&self, outcome: Outcome) -> Outcome {
        *self.inner.state.lock() = State::Exited;
        self.inner.outcome.send_replace(Some(outcome));
        outcome
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("options", &self.inner.options)
            .field("state", &self.state())
            .field("registry", &self.inner.registry)
            .finish()
    }
}

/// Run every task concurrently and wait for all of them. Failures are
/// returned in the order the tasks settled.
async fn run_tasks(tasks: Vec<CleanupTask>) -> Vec<ShutdownError> {
    let mut pending: FuturesUnordered<_> = tasks.iter().map(invoke).collect();
    let mut failures = Vec::new();

    while let Some(result) = pending.next().await {
        if let Err(failure) = result {
            warn!(error = %failure, "shutdown task failed");
            failures.push(failure);
        }
    }

    failures
}

/// Start one task, turning errors and panics into a [`ShutdownError`].
fn invoke(task: &CleanupTask) -> BoxFuture<'static, Result<(), ShutdownError>> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| (**task)())) {
        Ok(fut) => AssertUnwindSafe(fut)
            .catch_unwind()
            .map(|result| match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ShutdownError::Task(e)),
                Err(payload) => Err(ShutdownError::TaskPanicked(panic_message(payload.as_ref()))),
            })
            .boxed(),
        Err(payload) => future::ready(Err(ShutdownError::TaskPanicked(panic_message(
            payload.as_ref(),
        ))))
        .boxed(),
    }
}
