//! Where shutdown failures are reported.

use crate::shutdown::ShutdownError;
use tracing::error;

/// Receives each failure collected during a shutdown pass, in order.
///
/// Implementations must not fail; errors raised while reporting errors are
/// not handled further.
pub trait ErrorSink: Send + Sync {
    /// Report a single failure.
    fn report(&self, error: &ShutdownError);
}

/// Default sink: one `error!` event per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, failure: &ShutdownError) {
        error!(error = %failure, "shutdown failure");
    }
}

impl<F> ErrorSink for F
where
    F: Fn(&ShutdownError) + Send + Sync,
{
    fn report(&self, error: &ShutdownError) {
        self(error)
    }
}
