//! Shutdown error types.

use crate::shutdown::TriggerKind;
use thiserror::Error;

/// One entry of the failure list collected during a shutdown pass.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("{kind}: {error:#}")]
    Trigger {
        kind: TriggerKind,
        error: anyhow::Error,
    },

    #[error("cleanup task failed: {0:#}")]
    Task(anyhow::Error),

    #[error("cleanup task panicked: {0}")]
    TaskPanicked(String),
}

/// Errors that can occur while installing trigger listeners.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to listen for {signal}: {source}")]
    Signal {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("shutdown listeners must be installed from within a tokio runtime")]
    NoRuntime,

    #[error("shutdown listeners already installed")]
    AlreadyInstalled,

    #[error("shutdown already in progress")]
    AlreadyTerminating,
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_error_display() {
        let err = ShutdownError::Trigger {
            kind: TriggerKind::SyncFault,
            error: anyhow::anyhow!("index out of bounds"),
        };
        assert_eq!(err.to_string(), "uncaught panic: index out of bounds");
    }

    #[test]
    fn test_task_error_display_includes_context() {
        let err = ShutdownError::Task(anyhow::anyhow!("connection reset").context("closing pool"));
        assert_eq!(
            err.to_string(),
            "cleanup task failed: closing pool: connection reset"
        );
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
