//! Shutdown triggers and the per-trigger exit policy.

use std::fmt;

/// The kind of event that started shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// The process ran out of work and would stop on its own.
    NaturalDrain,
    /// SIGTERM or SIGINT (Ctrl-C on non-unix targets).
    TerminationSignal,
    /// SIGUSR1 or SIGUSR2.
    UserSignal,
    /// A panic that nothing caught.
    SyncFault,
    /// A supervised async task failed or panicked.
    AsyncFault,
}

/// How a trigger overrides the configured [`ShutdownOptions`](crate::config::ShutdownOptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPolicy {
    /// Value forced onto `auto_exit`.
    pub force_exit_on_success: bool,
    /// Value forced onto `exit_code`, if any.
    pub default_exit_code_on_failure: Option<i32>,
}

impl TriggerKind {
    /// Policy table for each trigger kind.
    ///
    /// | kind              | auto_exit | exit_code  |
    /// |-------------------|-----------|------------|
    /// | NaturalDrain      | false     | configured |
    /// | TerminationSignal | true      | configured |
    /// | UserSignal        | true      | configured |
    /// | SyncFault         | true      | 1          |
    /// | AsyncFault        | true      | 1          |
    pub fn policy(self) -> TriggerPolicy {
        match self {
            TriggerKind::NaturalDrain => TriggerPolicy {
                force_exit_on_success: false,
                default_exit_code_on_failure: None,
            },
            TriggerKind::TerminationSignal | TriggerKind::UserSignal => TriggerPolicy {
                force_exit_on_success: true,
                default_exit_code_on_failure: None,
            },
            TriggerKind::SyncFault | TriggerKind::AsyncFault => TriggerPolicy {
                force_exit_on_success: true,
                default_exit_code_on_failure: Some(1),
            },
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerKind::NaturalDrain => "natural drain",
            TriggerKind::TerminationSignal => "termination signal",
            TriggerKind::UserSignal => "user signal",
            TriggerKind::SyncFault => "uncaught panic",
            TriggerKind::AsyncFault => "async task failure",
        };
        f.write_str(name)
    }
}

/// A trigger event delivered to the coordinator.
#[derive(Debug)]
pub struct Trigger {
    kind: TriggerKind,
    source: &'static str,
    error: Option<anyhow::Error>,
}

impl Trigger {
    /// Natural end of work, no error.
    pub fn natural_drain() -> Self {
        Self {
            kind: TriggerKind::NaturalDrain,
            source: "drain",
            error: None,
        }
    }

    /// A termination request such as `SIGTERM`.
    pub fn termination(signal: &'static str) -> Self {
        Self {
            kind: TriggerKind::TerminationSignal,
            source: signal,
            error: None,
        }
    }

    /// A user-defined signal such as `SIGUSR1`.
    pub fn user_signal(signal: &'static str) -> Self {
        Self {
            kind: TriggerKind::UserSignal,
            source: signal,
            error: None,
        }
    }

    /// An uncaught panic carrying `error`.
    pub fn sync_fault(error: anyhow::Error) -> Self {
        Self {
            kind: TriggerKind::SyncFault,
            source: "panic",
            error: Some(error),
        }
    }

    /// A failed or panicked async task carrying `error`.
    pub fn async_fault(error: anyhow::Error) -> Self {
        Self {
            kind: TriggerKind::AsyncFault,
            source: "task",
            error: Some(error),
        }
    }

    /// Trigger kind.
    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    /// Short name of what fired the trigger (signal name, "panic", ...).
    pub fn source(&self) -> &'static str {
        self.source
    }

    /// The fault payload, if any.
    pub fn error(&self) -> Option<&anyhow::Error> {
        self.error.as_ref()
    }

    pub(crate) fn into_parts(self) -> (TriggerKind, &'static str, Option<anyhow::Error>) {
        (self.kind, self.source, self.error)
    }
}
