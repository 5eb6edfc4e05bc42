//! Shared test helpers for omni-window.
//!
//! Builds host-like conversations in a `MemoryDocument`: a `main` scroll
//! container holding one `article` shell per turn, each wrapping a message
//! element with id and author-role attributes.

#![allow(dead_code)]

use omni_window::markers::{AUTHOR_ROLE_ATTR, MESSAGE_ID_ATTR, TEST_ID_ATTR};
use omni_window::{Host, MemoryDocument, NodeRef, RetentionController};

/// Height of a rendered user message.
pub const USER_HEIGHT: f64 = 100.0;
/// Height of a rendered assistant message.
pub const ASSISTANT_HEIGHT: f64 = 200.0;

/// A built conversation.
pub struct Conversation {
    pub doc: MemoryDocument,
    pub main: NodeRef,
    pub shells: Vec<NodeRef>,
    pub turns: Vec<NodeRef>,
}

impl Conversation {
    /// Append one more turn to the live document.
    pub fn push_turn(&mut self, role: &str) -> NodeRef {
        let index = self.turns.len();
        let (shell, turn) = append_turn(&mut self.doc, self.main, index, role);
        self.shells.push(shell);
        self.turns.push(turn);
        turn
    }
}

/// Conversation with one turn per role, inside `main` with a 300px viewport.
pub fn conversation(roles: &[&str]) -> Conversation {
    let mut doc = MemoryDocument::new();
    let body = doc.root();
    let main = doc.append_element(body, "main", &[]);
    doc.set_scroll_container(main, 300.0);
    let (shells, turns) = append_turns(&mut doc, main, roles);
    doc.scroll_to_bottom();
    Conversation {
        doc,
        main,
        shells,
        turns,
    }
}

/// Alternating user/assistant turns making `rounds` full rounds.
pub fn rounds(rounds: usize) -> Conversation {
    let roles: Vec<&str> = (0..rounds).flat_map(|_| ["user", "assistant"]).collect();
    conversation(&roles)
}

/// Append one shell and turn per role under `main`; returns `(shells, turns)`.
pub fn append_turns(doc: &mut MemoryDocument, main: NodeRef, roles: &[&str]) -> (Vec<NodeRef>, Vec<NodeRef>) {
    roles
        .iter()
        .enumerate()
        .map(|(index, role)| append_turn(doc, main, index, role))
        .unzip()
}

fn append_turn(doc: &mut MemoryDocument, main: NodeRef, index: usize, role: &str) -> (NodeRef, NodeRef) {
    let test_id = format!("conversation-turn-{index}");
    let shell = doc.append_element(main, "article", &[(TEST_ID_ATTR, &test_id)]);
    let id = format!("{}{index}", &role[..1]);
    let turn = doc.append_element(shell, "div", &[(AUTHOR_ROLE_ATTR, role), (MESSAGE_ID_ATTR, &id)]);
    doc.set_text(turn, &format!("{role} message {index}"));
    doc.set_height(
        turn,
        if role == "user" {
            USER_HEIGHT
        } else {
            ASSISTANT_HEIGHT
        },
    );
    (shell, turn)
}

/// Run timers (and pump records) up to and including `until`.
pub fn settle(controller: &mut RetentionController, doc: &mut MemoryDocument, until: u64) {
    while let Some(next) = controller.next_deadline() {
        if next > until {
            break;
        }
        controller.advance(doc, next);
        controller.pump(doc, next);
    }
}

/// True when the element takes no space and is not painted.
pub fn collapsed(doc: &MemoryDocument, node: NodeRef) -> bool {
    !doc.is_rendered(node) && doc.box_height(node).abs() < f64::EPSILON
}
