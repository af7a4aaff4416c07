//! One-shot stop notification shared between tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Fires once; every subscriber is woken.
#[derive(Clone, Debug)]
pub struct StopSignal {
    sender: broadcast::Sender<()>,
    fired: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a new, unfired stop signal.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the stop notification.
    ///
    /// Receivers created after the signal fired never see it.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Fire the signal. Only the first call notifies subscribers.
    pub fn fire(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            let _ = self.sender.send(());
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
