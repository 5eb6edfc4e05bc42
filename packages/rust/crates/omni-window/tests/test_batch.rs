//! Integration tests for batch application: slicing, scroll, and cleanup sweeps.

mod common;

use common::{ASSISTANT_HEIGHT, collapsed, rounds, settle};
use omni_types::RetentionPolicy;
use omni_window::markers::{AUTHOR_ROLE_ATTR, CONTROL_ATTR, MESSAGE_ID_ATTR, SHELL_ATTR};
use omni_window::{BatchReport, ControllerOutput, EngineConfig, Host, RetentionController, TimerKind};

fn controller(keep_rounds: usize) -> RetentionController {
    RetentionController::new(EngineConfig::default(), RetentionPolicy::keeping(keep_rounds))
}

fn batch_reports(ctl: &mut RetentionController) -> Vec<BatchReport> {
    ctl.drain_outputs()
        .into_iter()
        .filter_map(|output| match output {
            ControllerOutput::BatchCompleted(report) => Some(report),
            _ => None,
        })
        .collect()
}

#[test]
fn test_pinned_reader_stays_at_bottom() {
    let mut c = rounds(5);
    let mut ctl = controller(2);
    ctl.start(&mut c.doc, 0);

    let container = c.doc.scroll_container().unwrap();
    let metrics = c.doc.scroll_metrics(container).unwrap();
    assert_eq!(metrics.scroll_height, 600.0);
    assert_eq!(c.doc.scroll_top(), metrics.max_scroll_top());
}

#[test]
fn test_unpinned_reader_keeps_position() {
    let mut c = rounds(5);
    c.doc.scroll_to(1000.0);
    let mut ctl = controller(2);
    ctl.start(&mut c.doc, 0);

    // Three rounds (900px) collapsed above the reader.
    assert!(collapsed(&c.doc, c.turns[5]));
    assert_eq!(c.doc.scroll_top(), 100.0);
}

#[test]
fn test_orphan_controls_follow_their_turn() {
    let mut c = rounds(3);
    let stale = c.doc.append_element(c.main, "button", &[("aria-label", "Regenerate"), ("data-turn-id", "a1")]);
    c.doc.set_text(stale, "Regenerate");
    let live = c.doc.append_element(c.main, "button", &[("aria-label", "Retry")]);
    c.doc.set_text(live, "Retry");
    let mut ctl = controller(2);
    ctl.start(&mut c.doc, 0);

    assert!(collapsed(&c.doc, c.turns[1]));
    assert!(c.doc.has_attribute(stale, CONTROL_ATTR));
    assert!(!c.doc.is_rendered(stale));
    assert!(c.doc.is_rendered(live));
    assert!(!c.doc.has_attribute(live, SHELL_ATTR));

    let report = batch_reports(&mut ctl)[0];
    assert_eq!(report.controls_hidden, 1);
    assert_eq!(report.shells_collapsed, 2);

    // Bringing the turn back brings its control back.
    ctl.set_policy(&mut c.doc, RetentionPolicy::keeping(3), 1000);
    assert!(c.doc.is_rendered(stale));
    assert!(!c.doc.has_attribute(stale, CONTROL_ATTR));
}

#[test]
fn test_slow_host_spreads_batch_over_slices() {
    let mut c = rounds(4);
    c.doc.set_write_cost(1);
    let mut ctl = controller(2);
    ctl.start(&mut c.doc, 0);

    assert!(collapsed(&c.doc, c.turns[0]));
    assert!(c.doc.is_rendered(c.turns[1]));
    assert!(ctl.timer_deadline(omni_window::TimerKind::BatchSlice).is_some());

    settle(&mut ctl, &mut c.doc, 100);
    for &turn in &c.turns[..4] {
        assert!(collapsed(&c.doc, turn));
    }
    let report = batch_reports(&mut ctl)[0];
    assert_eq!(report.applied, 4);
    assert_eq!(report.slices, 4);
}

#[test]
fn test_turn_removed_between_slices_is_skipped() {
    let mut c = rounds(4);
    c.doc.set_write_cost(1);
    let mut ctl = controller(2);
    ctl.start(&mut c.doc, 0);

    c.doc.remove(c.turns[1]);
    settle(&mut ctl, &mut c.doc, 100);

    let report = batch_reports(&mut ctl)[0];
    assert_eq!(report.skipped_stale, 1);
    assert_eq!(report.applied, 3);
    assert_eq!(report.failed, 0);
    assert!(collapsed(&c.doc, c.turns[3]));
}

#[test]
fn test_rejected_write_does_not_abort_batch() {
    let mut c = rounds(4);
    c.doc.reject_writes_on(c.turns[0]);
    let mut ctl = controller(2);
    ctl.start(&mut c.doc, 0);

    let report = batch_reports(&mut ctl)[0];
    assert_eq!(report.failed, 1);
    assert_eq!(report.applied, 3);
    assert!(collapsed(&c.doc, c.turns[3]));
}

#[test]
fn test_slicing_does_not_change_end_state() {
    let mut fast = rounds(4);
    let mut slow = rounds(4);
    slow.doc.set_write_cost(1);

    let mut fast_ctl = controller(2);
    let mut slow_ctl = controller(2);
    fast_ctl.start(&mut fast.doc, 0);
    slow_ctl.start(&mut slow.doc, 0);
    settle(&mut fast_ctl, &mut fast.doc, 1000);
    settle(&mut slow_ctl, &mut slow.doc, 1000);

    assert_eq!(fast.doc.to_fixture().body, slow.doc.to_fixture().body);
    assert_eq!(fast_ctl.status(), slow_ctl.status());
}

/// Turns the host adds while a sliced batch is still running are trimmed by
/// one catch-up pass once it finishes.
#[test]
fn test_turns_added_between_slices_are_caught_up() {
    let mut c = rounds(10);
    c.doc.set_write_cost(1);
    let mut ctl = controller(2);
    ctl.start(&mut c.doc, 0);
    assert!(ctl.timer_deadline(TimerKind::BatchSlice).is_some());

    c.push_turn("user");
    c.push_turn("assistant");
    settle(&mut ctl, &mut c.doc, 10_000);

    assert_eq!(ctl.evaluations(), 2);
    assert!(!ctl.has_pending());
    for &turn in &c.turns[..18] {
        assert!(collapsed(&c.doc, turn));
    }
    for &turn in &c.turns[18..] {
        assert!(c.doc.is_rendered(turn));
    }
    let status = ctl.status().unwrap();
    assert_eq!(status.total_rounds, 11);
    assert_eq!(status.visible_rounds, 2);
}

/// An empty reply shell inserted before its message streams in is part of
/// the live tail and must stay visible once the reply lands in it.
#[test]
fn test_reply_shell_stays_visible_while_its_message_arrives() {
    let mut c = rounds(3);
    let mut ctl = controller(2);
    ctl.start(&mut c.doc, 0);
    settle(&mut ctl, &mut c.doc, 1500);

    c.push_turn("user");
    let reply_shell = c.doc.append_element(c.main, "article", &[]);
    ctl.pump(&mut c.doc, 2000);
    settle(&mut ctl, &mut c.doc, 3000);
    assert!(collapsed(&c.doc, c.turns[2]));
    assert!(c.doc.is_rendered(reply_shell));
    assert!(!c.doc.has_attribute(reply_shell, SHELL_ATTR));

    let reply = c.doc.append_element(
        reply_shell,
        "div",
        &[(AUTHOR_ROLE_ATTR, "assistant"), (MESSAGE_ID_ATTR, "a7")],
    );
    c.doc.set_text(reply, "assistant message 7");
    c.doc.set_height(reply, ASSISTANT_HEIGHT);
    ctl.pump(&mut c.doc, 4000);
    settle(&mut ctl, &mut c.doc, 5000);

    assert!(c.doc.is_rendered(reply_shell));
    assert!(c.doc.is_rendered(reply));
    let status = ctl.status().unwrap();
    assert_eq!(status.total_rounds, 4);
    assert_eq!(status.visible_rounds, 2);
}
