//! Process termination primitive.

/// Ends the process with an exit code.
///
/// The real implementation never returns. Replacements used in tests may
/// record the code and return, in which case the coordinator reports the
/// exit through its [`Outcome`](crate::shutdown::Outcome).
pub trait ProcessExit: Send + Sync {
    /// Terminate with `code`.
    fn exit(&self, code: i32);
}

/// Calls [`std::process::exit`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdExit;

impl ProcessExit for StdExit {
    fn exit(&self, code: i32) {
        std::process::exit(code)
    }
}
