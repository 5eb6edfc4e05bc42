//! Integration tests for the tokio driver.

mod common;

use omni_types::RetentionPolicy;
use omni_window::{EngineConfig, Event, RetentionController, run_controller};
use tokio::sync::{mpsc, watch};

#[tokio::test(start_paused = true)]
async fn test_driver_publishes_status_and_stops() {
    let mut c = common::rounds(3);
    let ctl = RetentionController::new(EngineConfig::default(), RetentionPolicy::keeping(2));
    let (tx, rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(None);
    drop(tx);

    let ctl = run_controller(&mut c.doc, ctl, rx, status_tx, 1000).await;

    let status = (*status_rx.borrow()).unwrap();
    assert_eq!(status.total_rounds, 3);
    assert_eq!(status.visible_rounds, 2);
    assert!(ctl.is_quiescent());
    assert!(common::collapsed(&c.doc, c.turns[0]));
}

/// A policy change landing inside the suppression window is latched and
/// flushed by the driver's timers before it stops.
#[tokio::test(start_paused = true)]
async fn test_driver_drains_latched_policy_change() {
    let mut c = common::rounds(3);
    let ctl = RetentionController::new(EngineConfig::default(), RetentionPolicy::keeping(2));
    let (tx, rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(None);
    tx.send(Event::PolicyChanged(RetentionPolicy::keeping(5))).unwrap();
    drop(tx);

    let ctl = run_controller(&mut c.doc, ctl, rx, status_tx, 2000).await;

    let status = (*status_rx.borrow()).unwrap();
    assert_eq!(status.visible_rounds, 3);
    assert_eq!(ctl.policy().keep_rounds, 5);
    assert!(!ctl.has_pending());
    for &turn in &c.turns {
        assert!(!common::collapsed(&c.doc, turn));
    }
}
