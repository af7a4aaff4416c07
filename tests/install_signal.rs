//! Signals delivered after `install` run the shutdown exactly once.
//!
//! Kept alone in its own test binary: signals target the whole process.

#![cfg(unix)]

mod common;

use gracestop::config::ShutdownOptions;
use gracestop::shutdown::{InstallError, Outcome, State, cleanup_task};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn send_signal(name: &str) {
    let status = std::process::Command::new("kill")
        .arg(format!("-{name}"))
        .arg(std::process::id().to_string())
        .status()
        .expect("failed to run kill");
    assert!(status.success());
}

#[tokio::test]
async fn test_signal_runs_single_shutdown() {
    let (coordinator, sink, exit) = common::coordinator(ShutdownOptions::default());

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    coordinator.register(&cleanup_task(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        }
    }));

    let installation = coordinator.install().unwrap();
    assert!(matches!(
        coordinator.install(),
        Err(InstallError::AlreadyInstalled)
    ));

    send_signal("USR1");

    let mut waited = 0;
    while coordinator.state() != State::Terminating && waited < 500 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
    }
    assert_eq!(coordinator.state(), State::Terminating);

    // A second signal during shutdown must not start another pass
    send_signal("INT");

    let outcome = tokio::time::timeout(Duration::from_secs(5), installation.wait())
        .await
        .expect("shutdown did not finish");

    assert_eq!(outcome, Some(Outcome::Exited { code: 0 }));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(exit.codes(), vec![0]);
    assert!(sink.reported().is_empty());
}
