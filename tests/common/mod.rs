//! Test doubles for the coordinator's collaborators.

use gracestop::config::ShutdownOptions;
use gracestop::shutdown::{Coordinator, ErrorSink, ProcessExit, ShutdownError};
use parking_lot::Mutex;
use std::sync::Arc;

/// Records every reported failure as its display string.
#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<String>>);

impl RecordingSink {
    pub fn reported(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: &ShutdownError) {
        self.0.lock().push(error.to_string());
    }
}

/// Records exit codes instead of exiting.
#[derive(Default)]
pub struct RecordingExit(Mutex<Vec<i32>>);

impl RecordingExit {
    pub fn codes(&self) -> Vec<i32> {
        self.0.lock().clone()
    }
}

impl ProcessExit for RecordingExit {
    fn exit(&self, code: i32) {
        self.0.lock().push(code);
    }
}

pub fn coordinator(
    options: ShutdownOptions,
) -> (Coordinator, Arc<RecordingSink>, Arc<RecordingExit>) {
    let sink = Arc::new(RecordingSink::default());
    let exit = Arc::new(RecordingExit::default());
    let coordinator = Coordinator::with_collaborators(options, sink.clone(), exit.clone())
        .expect("valid shutdown options");
    (coordinator, sink, exit)
}
