//! Async driver: runs a [`RetentionController`] against a host on tokio time.
//!
//! One inbound event channel, one deadline sleep, one status watch. Hosts
//! that buffer observer records (such as [`crate::MemoryDocument`]) are
//! pumped after every step.

use std::time::Duration;

use omni_types::StatusSnapshot;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};

use crate::controller::{ControllerOutput, Event, RetentionController};
use crate::host::Host;

/// Drive `controller` until `events` closes and the controller is quiescent.
///
/// After the channel closes, timers keep running for at most `drain_ms`
/// (guards may hold a latched run indefinitely). Returns the controller.
pub async fn run_controller<H: Host>(
    host: &mut H,
    mut controller: RetentionController,
    mut events: mpsc::UnboundedReceiver<Event>,
    status: watch::Sender<Option<StatusSnapshot>>,
    drain_ms: u64,
) -> RetentionController {
    let started = Instant::now();
    let now_ms = || u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    controller.start(host, now_ms());
    controller.pump(host, now_ms());
    forward_outputs(&mut controller, &status);

    let mut open = true;
    let mut closed_at: Option<u64> = None;
    loop {
        if !open {
            let closed = *closed_at.get_or_insert_with(now_ms);
            if controller.is_quiescent() || now_ms().saturating_sub(closed) >= drain_ms {
                break;
            }
        }
        let deadline = controller
            .next_deadline()
            .map(|ms| started + Duration::from_millis(ms));
        if !open && deadline.is_none() {
            break;
        }

        tokio::select! {
            received = events.recv(), if open => match received {
                Some(event) => controller.handle(host, event, now_ms()),
                None => open = false,
            },
            () = sleep_until_deadline(deadline) => controller.advance(host, now_ms()),
        }
        controller.pump(host, now_ms());
        forward_outputs(&mut controller, &status);
    }

    tracing::debug!(
        event = "window.driver.stopped",
        quiescent = controller.is_quiescent(),
        evaluations = controller.evaluations(),
        "controller driver stopped"
    );
    controller
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn forward_outputs(controller: &mut RetentionController, status: &watch::Sender<Option<StatusSnapshot>>) {
    for output in controller.drain_outputs() {
        match output {
            ControllerOutput::Status(snapshot) => {
                status.send_replace(Some(snapshot));
            }
            other => tracing::debug!(event = "window.driver.output", output = ?other, "controller output"),
        }
    }
}
