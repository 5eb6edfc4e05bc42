//! Integration tests for the conversation tree pruner.

use omni_prune::{ConversationGraph, ConversationNode, PruneOutcome, prune};

fn chain(roles: &[Option<&str>]) -> ConversationGraph {
    let nodes = roles
        .iter()
        .enumerate()
        .map(|(index, role)| {
            let id = format!("n{index}");
            let parent = index.checked_sub(1).map(|p| format!("n{p}"));
            ConversationNode::new(&id, parent.as_deref(), *role)
        })
        .collect();
    ConversationGraph::from_chain_nodes(nodes)
}

fn ids(graph: &ConversationGraph, root: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = Some(root.to_string());
    while let Some(id) = cursor {
        let node = graph.get(&id).unwrap();
        out.push(id);
        assert!(node.children.len() <= 1, "pruned graph must be a simple chain");
        cursor = node.children.first().cloned();
    }
    out
}

#[test]
fn keeps_last_round_and_anchor() {
    let graph = chain(&[
        None,
        Some("user"),
        Some("assistant"),
        Some("user"),
        Some("assistant"),
    ]);
    let PruneOutcome::Pruned(pruned) = prune(&graph, "n4", 1) else {
        panic!("expected pruned outcome");
    };
    assert_eq!(pruned.new_root, "n0");
    assert_eq!(pruned.new_current, "n4");
    assert_eq!(ids(&pruned.graph, "n0"), vec!["n0", "n3", "n4"]);
    assert_eq!(pruned.stats.rounds_kept, 1);
    assert_eq!(pruned.stats.rounds_total, 2);
    assert_eq!(pruned.stats.nodes_kept, 3);
    assert_eq!(pruned.stats.nodes_total, 5);
    assert_eq!(pruned.graph.get("n3").unwrap().parent.as_deref(), Some("n0"));
}

#[test]
fn drops_auxiliary_nodes_within_budget() {
    let graph = chain(&[
        Some("system"),
        Some("user"),
        Some("thinking"),
        Some("tool"),
        Some("assistant"),
    ]);
    let PruneOutcome::Pruned(pruned) = prune(&graph, "n4", 10) else {
        panic!("expected pruned outcome");
    };
    assert_eq!(ids(&pruned.graph, &pruned.new_root), vec!["n1", "n4"]);
    assert_eq!(pruned.stats.rounds_total, 1);
    assert_eq!(pruned.stats.rounds_kept, 1);
    assert!(pruned.graph.get("n1").unwrap().parent.is_none());
}

#[test]
fn short_plain_chain_is_unchanged() {
    let graph = chain(&[None, Some("user"), Some("assistant")]);
    let outcome = prune(&graph, "n2", 3);
    assert_eq!(
        outcome,
        PruneOutcome::Unchanged(omni_prune::PruneStats {
            rounds_kept: 1,
            rounds_total: 1,
            nodes_kept: 3,
            nodes_total: 3,
        })
    );
}

#[test]
fn missing_current_node_fails_closed() {
    let graph = chain(&[Some("user"), Some("assistant")]);
    assert!(prune(&graph, "nope", 1).is_unchanged());
}

#[test]
fn cyclic_parent_chain_fails_closed() {
    let mut a = ConversationNode::new("a", Some("c"), Some("user"));
    a.children.push("b".into());
    let b = ConversationNode::new("b", Some("a"), Some("assistant"));
    let c = ConversationNode::new("c", Some("b"), Some("user"));
    let graph = ConversationGraph::from_chain_nodes(vec![a, b, c]);
    assert!(prune(&graph, "c", 1).is_unchanged());
}

#[test]
fn dangling_parent_ends_the_chain() {
    let graph = ConversationGraph::from_chain_nodes(vec![
        ConversationNode::new("u1", Some("gone"), Some("user")),
        ConversationNode::new("a1", Some("u1"), Some("assistant")),
        ConversationNode::new("u2", Some("a1"), Some("user")),
        ConversationNode::new("a2", Some("u2"), Some("assistant")),
    ]);
    let PruneOutcome::Pruned(pruned) = prune(&graph, "a2", 1) else {
        panic!("expected pruned outcome");
    };
    assert_eq!(ids(&pruned.graph, &pruned.new_root), vec!["u2", "a2"]);
}

#[test]
fn pruning_is_idempotent() {
    let graph = chain(&[
        None,
        Some("user"),
        Some("tool"),
        Some("assistant"),
        Some("user"),
        Some("assistant"),
        Some("user"),
        Some("assistant"),
    ]);
    let PruneOutcome::Pruned(first) = prune(&graph, "n7", 2) else {
        panic!("expected pruned outcome");
    };
    assert!(prune(&first.graph, &first.new_current, 2).is_unchanged());
}

#[test]
fn keep_rounds_zero_is_clamped_to_one() {
    let graph = chain(&[Some("user"), Some("assistant"), Some("user"), Some("assistant")]);
    let PruneOutcome::Pruned(pruned) = prune(&graph, "n3", 0) else {
        panic!("expected pruned outcome");
    };
    assert_eq!(pruned.stats.rounds_kept, 1);
    assert_eq!(ids(&pruned.graph, &pruned.new_root), vec!["n2", "n3"]);
}

#[test]
fn no_users_counts_visible_nodes() {
    let graph = chain(&[None, Some("assistant"), Some("assistant"), Some("assistant")]);
    let PruneOutcome::Pruned(pruned) = prune(&graph, "n3", 2) else {
        panic!("expected pruned outcome");
    };
    assert_eq!(ids(&pruned.graph, "n0"), vec!["n0", "n2", "n3"]);
    assert_eq!(pruned.stats.rounds_total, 3);
}

#[test]
fn no_users_with_auxiliary_prefix_is_left_alone() {
    let graph = chain(&[Some("system"), Some("assistant"), Some("assistant"), Some("assistant")]);
    let outcome = prune(&graph, "n3", 1);
    assert!(outcome.is_unchanged());
    assert_eq!(outcome.stats().rounds_total, 3);
}

#[test]
fn reasoning_content_counts_as_thinking() {
    let mut graph = chain(&[Some("user"), Some("assistant"), Some("assistant")]);
    let mut thoughts = graph.get("n1").unwrap().clone();
    thoughts.message = Some(serde_json::json!({
        "author": { "role": "assistant" },
        "content": { "content_type": "thoughts", "thoughts": [] },
    }));
    graph.insert(thoughts);
    let PruneOutcome::Pruned(pruned) = prune(&graph, "n2", 5) else {
        panic!("expected pruned outcome");
    };
    assert_eq!(ids(&pruned.graph, &pruned.new_root), vec!["n0", "n2"]);
}
