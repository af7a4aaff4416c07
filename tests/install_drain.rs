//! A natural drain disarms the installed listeners.

mod common;

use gracestop::config::ShutdownOptions;
use gracestop::shutdown::{Outcome, State};
use std::time::Duration;

#[tokio::test]
async fn test_drain_disarms_listener() {
    let (coordinator, sink, exit) = common::coordinator(ShutdownOptions::default());
    let installation = coordinator.install().unwrap();

    let outcome = coordinator.drain().await;
    assert_eq!(outcome, Outcome::Completed { exit_code: 0 });

    let listener = tokio::time::timeout(Duration::from_secs(5), installation.wait())
        .await
        .expect("listener was not disarmed");
    assert_eq!(listener, None);

    // Faults after shutdown no longer trigger anything
    let result = std::thread::spawn(|| panic!("late panic")).join();
    assert!(result.is_err());
    coordinator.report_fault(anyhow::anyhow!("late fault"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(coordinator.state(), State::Exited);
    assert!(exit.codes().is_empty());
    assert!(sink.reported().is_empty());
}
