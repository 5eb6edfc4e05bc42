//! Integration tests for turn location and layout fallback.

mod common;

use omni_types::{ConfidenceTier, RetentionPolicy, Role};
use omni_window::markers::TEST_ID_ATTR;
use omni_window::{
    ControllerOutput, EngineConfig, Host, LocateCost, MemoryDocument, MessageLocator, NodeRef, RetentionController,
    Thread,
};

/// `main > div > [div...]` with no role attributes. `markers` holds the
/// control each turn renders, if any.
fn unmarked_thread(markers: &[Option<&str>]) -> (MemoryDocument, NodeRef, Vec<NodeRef>) {
    let mut doc = MemoryDocument::new();
    let body = doc.root();
    let main = doc.append_element(body, "main", &[]);
    doc.set_scroll_container(main, 300.0);
    let list = doc.append_element(main, "div", &[]);
    let turns = markers
        .iter()
        .enumerate()
        .map(|(index, marker)| {
            let turn = doc.append_element(list, "div", &[]);
            doc.set_text(turn, &format!("message body {index}"));
            doc.set_height(turn, 100.0);
            if let Some(label) = marker {
                doc.append_element(turn, "button", &[("aria-label", label)]);
            }
            turn
        })
        .collect();
    doc.scroll_to_bottom();
    (doc, main, turns)
}

#[test]
fn test_structural_fallback_classifies_by_controls() {
    let (doc, main, turns) = unmarked_thread(&[Some("Edit message"), Some("Copy"), Some("Edit message"), None]);
    let located = MessageLocator::default().locate(&doc, main, 0, LocateCost::Full);

    assert_eq!(located.tier, ConfidenceTier::Structural);
    let elements: Vec<NodeRef> = located.turns.iter().map(|t| t.element).collect();
    assert_eq!(elements, turns);
    let roles: Vec<Role> = located.turns.iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Unknown]);

    let thread = Thread::build(located);
    assert_eq!(thread.round_count(), 2);
    assert_eq!(thread.round_of(3), Some(1));
}

/// Structural layout, keep one round: the first round goes, the unknown
/// trailing turn stays visible and is not an error.
#[test]
fn test_structural_layout_is_trimmed() {
    let (mut doc, _, turns) = unmarked_thread(&[Some("Edit message"), Some("Copy"), Some("Edit message"), None]);
    let mut ctl = RetentionController::new(EngineConfig::default(), RetentionPolicy::keeping(1));
    ctl.start(&mut doc, 0);

    assert!(common::collapsed(&doc, turns[0]));
    assert!(common::collapsed(&doc, turns[1]));
    assert!(doc.is_rendered(turns[2]));
    assert!(doc.is_rendered(turns[3]));
    let status = ctl.status().unwrap();
    assert_eq!(status.tier, ConfidenceTier::Structural);
    assert_eq!(status.total_rounds, 2);
    assert_eq!(status.visible_rounds, 1);
}

#[test]
fn test_hidden_turns_stay_located() {
    let (mut doc, main, turns) = unmarked_thread(&[Some("Edit message"), Some("Copy"), Some("Edit message"), None]);
    let mut ctl = RetentionController::new(EngineConfig::default(), RetentionPolicy::keeping(1));
    ctl.start(&mut doc, 0);

    let located = MessageLocator::default().locate(&doc, main, 1000, LocateCost::Full);
    assert_eq!(located.tier, ConfidenceTier::Structural);
    assert_eq!(located.turns.len(), turns.len());
    assert!(!located.turns[0].visible);
    assert!(located.turns[2].visible);
}

#[test]
fn test_unrecognized_layout_is_reported_once() {
    let (mut doc, main, turns) = unmarked_thread(&[None]);
    let mut ctl = RetentionController::new(EngineConfig::default(), RetentionPolicy::keeping(1));
    ctl.start(&mut doc, 0);

    let outputs = ctl.drain_outputs();
    assert_eq!(outputs[0], ControllerOutput::Bound { root: main });
    assert_eq!(outputs[1], ControllerOutput::LayoutNotRecognized);
    let status = ctl.status().unwrap();
    assert!(!status.layout_recognized);
    assert_eq!(status.tier, ConfidenceTier::None);
    assert!(doc.is_rendered(turns[0]));
    assert_eq!(doc.write_count(), 0);

    ctl.run_now(&mut doc, 1000);
    let outputs = ctl.drain_outputs();
    assert!(!outputs.contains(&ControllerOutput::LayoutNotRecognized));
    assert_eq!(ctl.evaluations(), 2);
}

#[test]
fn test_test_id_tier_without_message_attributes() {
    let mut doc = MemoryDocument::new();
    let body = doc.root();
    let main = doc.append_element(body, "main", &[]);
    for index in 0..4 {
        let id = format!("conversation-turn-{index}");
        let article = doc.append_element(main, "article", &[(TEST_ID_ATTR, &id)]);
        doc.set_text(article, "text");
    }
    let located = MessageLocator::default().locate(&doc, main, 0, LocateCost::Cheap);
    assert_eq!(located.tier, ConfidenceTier::TestIdAria);
    assert_eq!(located.turns.len(), 4);
    assert_eq!(located.turns[2].stable_id, "conversation-turn-2");
}
