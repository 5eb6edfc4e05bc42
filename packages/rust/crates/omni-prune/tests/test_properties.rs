//! Randomised checks of the pruning invariants over seeded chains.

use omni_prune::{ConversationGraph, ConversationNode, PruneOutcome, prune};
use omni_types::{Role, RoundLayout};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ROLES: [&str; 6] = ["user", "assistant", "system", "tool", "thinking", "critic"];

fn random_chain(rng: &mut StdRng) -> (ConversationGraph, String) {
    let len = rng.gen_range(1..40);
    let anchored = rng.gen_bool(0.5);
    let mut nodes = Vec::with_capacity(len);
    for index in 0..len {
        let id = format!("n{index}");
        let parent = index.checked_sub(1).map(|p| format!("n{p}"));
        let role = if index == 0 && anchored {
            None
        } else {
            Some(ROLES[rng.gen_range(0..ROLES.len())])
        };
        nodes.push(ConversationNode::new(&id, parent.as_deref(), role));
    }
    (ConversationGraph::from_chain_nodes(nodes), format!("n{}", len - 1))
}

fn chain_roles(graph: &ConversationGraph, current: &str) -> Vec<Option<Role>> {
    graph
        .active_chain(current)
        .unwrap()
        .iter()
        .map(|node| node.role())
        .collect()
}

fn layout_without_anchor(roles: &[Option<Role>]) -> RoundLayout {
    let skip = usize::from(roles.first().is_some_and(Option::is_none));
    RoundLayout::from_roles(roles[skip..].iter().map(|r| r.unwrap_or(Role::Unknown)))
}

#[test]
fn pruning_invariants_hold_for_random_chains() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0001);
    for _ in 0..500 {
        let (graph, current) = random_chain(&mut rng);
        let keep = rng.gen_range(0..8);
        let before = chain_roles(&graph, &current);
        let original = layout_without_anchor(&before);

        match prune(&graph, &current, keep) {
            PruneOutcome::Unchanged(stats) => {
                assert_eq!(stats.rounds_total, original.round_count());
            }
            PruneOutcome::Pruned(pruned) => {
                let after = chain_roles(&pruned.graph, &pruned.new_current);
                let layout = layout_without_anchor(&after);
                let expected = original.round_count().min(keep.max(1));

                assert!(layout.round_count() <= original.round_count());
                assert_eq!(layout.round_count(), expected);
                assert_eq!(pruned.stats.rounds_kept, expected);
                assert!(
                    after.iter().flatten().all(|role| !role.is_auxiliary()),
                    "auxiliary node survived pruning"
                );
                if before.first().is_some_and(Option::is_none) {
                    assert_eq!(pruned.new_root, "n0", "anchor must survive");
                    assert!(after.first().is_some_and(Option::is_none));
                }
                assert_eq!(pruned.graph.len(), after.len());
                assert!(prune(&pruned.graph, &pruned.new_current, keep).is_unchanged());
            }
        }
    }
}

#[test]
fn cyclic_graphs_terminate() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0002);
    for _ in 0..200 {
        let len = rng.gen_range(2..60);
        let nodes = (0..len)
            .map(|index| {
                let parent = format!("n{}", (index + 1) % len);
                ConversationNode::new(&format!("n{index}"), Some(&parent), Some("user"))
            })
            .collect();
        let graph = ConversationGraph::from_chain_nodes(nodes);
        let current = format!("n{}", rng.gen_range(0..len));
        assert!(prune(&graph, &current, 1).is_unchanged());
    }
}
