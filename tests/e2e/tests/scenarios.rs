//! End-to-end scenarios
//!
//! The concrete journeys: remember and recall on an empty store, resonance
//! over related memories, Hebbian reinforcement, triplet connection,
//! two-process convergence over a shared storage root, and wisdom
//! synthesis out of clustered episodes.

use std::collections::BTreeSet;

use samskara_core::{EdgeType, NodeType};
use samskara_e2e_tests::{open_mind, TestClock};

fn no_tags() -> BTreeSet<String> {
    BTreeSet::new()
}

#[test]
fn remember_then_recall_on_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::at(1_000);
    let mut mind = open_mind(dir.path(), &clock);

    let id = mind
        .remember(
            "The cache invalidates on write.",
            NodeType::Wisdom,
            Some(0.8),
            no_tags(),
        )
        .unwrap();

    let recalls = mind.recall("cache", 3).unwrap();
    assert_eq!(recalls.len(), 1);
    assert_eq!(recalls[0].id, id);
    assert!(recalls[0].similarity > 0.0);
}

#[test]
fn resonate_returns_both_related_memories() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::at(1_000);
    let mut mind = open_mind(dir.path(), &clock);

    let i = mind
        .remember(
            "The cache invalidates on write.",
            NodeType::Wisdom,
            Some(0.8),
            no_tags(),
        )
        .unwrap();
    let j = mind
        .remember(
            "Use write-through for critical data.",
            NodeType::Wisdom,
            Some(0.8),
            no_tags(),
        )
        .unwrap();

    let recalls = mind.resonate("caching strategy", 3, 0.5).unwrap();
    let ids: Vec<_> = recalls.iter().map(|r| r.id).collect();
    assert!(ids.contains(&i), "resonate must surface the first memory");
    assert!(ids.contains(&j), "resonate must surface the second memory");
    // Ordered by descending relevance
    for pair in recalls.windows(2) {
        assert!(pair[0].relevance >= pair[1].relevance);
    }
}

#[test]
fn hebbian_strengthening_accumulates_and_saturates() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::at(1_000);
    let mut mind = open_mind(dir.path(), &clock);

    let i = mind
        .remember(
            "The cache invalidates on write.",
            NodeType::Wisdom,
            Some(0.8),
            no_tags(),
        )
        .unwrap();
    let j = mind
        .remember(
            "Use write-through for critical data.",
            NodeType::Wisdom,
            Some(0.8),
            no_tags(),
        )
        .unwrap();

    mind.hebbian_strengthen(i, j, 0.3).unwrap();
    mind.hebbian_strengthen(i, j, 0.3).unwrap();

    let node_i = mind.get(i).unwrap().unwrap();
    let node_j = mind.get(j).unwrap().unwrap();
    assert!((node_i.edge_weight(j, EdgeType::Similar).unwrap() - 0.6).abs() <= 0.001);
    assert!((node_j.edge_weight(i, EdgeType::Similar).unwrap() - 0.6).abs() <= 0.001);

    // Further reinforcement saturates at exactly 1.0 and stays there
    mind.hebbian_strengthen(i, j, 0.3).unwrap();
    mind.hebbian_strengthen(i, j, 0.3).unwrap();
    mind.hebbian_strengthen(i, j, 0.3).unwrap();
    let node_i = mind.get(i).unwrap().unwrap();
    assert!((node_i.edge_weight(j, EdgeType::Similar).unwrap() - 1.0).abs() < 1e-6);
}

#[test]
fn connect_builds_triplet_and_entities() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::at(1_000);
    let mut mind = open_mind(dir.path(), &clock);

    mind.connect("jwt", "prevents", "session-state", 0.8).unwrap();

    let triplets = mind.query_graph("jwt", "", "").unwrap();
    assert_eq!(triplets.len(), 1);
    assert_eq!(triplets[0].subject, "jwt");
    assert_eq!(triplets[0].predicate, "prevents");
    assert_eq!(triplets[0].object, "session-state");
    assert!(triplets[0].weight >= 0.0);
    assert_eq!(mind.query_graph("", "", "session-state").unwrap().len(), 1);

    // Entity nodes exist (findable through the sparse channel despite
    // their zero embeddings) and mention each other
    assert_eq!(mind.state().unwrap().total_nodes, 2);
    let jwt = mind.recall("jwt", 5).unwrap();
    let jwt = jwt
        .iter()
        .find(|r| r.text == "jwt")
        .expect("jwt entity node");
    let session_state = mind.recall("session-state", 5).unwrap();
    let session_state = session_state
        .iter()
        .find(|r| r.text == "session-state")
        .expect("session-state entity node");

    let jwt_node = mind.get(jwt.id).unwrap().unwrap();
    let ss_node = mind.get(session_state.id).unwrap().unwrap();
    assert_eq!(jwt_node.node_type, NodeType::Entity);
    assert!(jwt_node.edge_weight(ss_node.id, EdgeType::Mentions).is_some());
    assert!(ss_node.edge_weight(jwt_node.id, EdgeType::Mentions).is_some());
}

#[test]
fn two_processes_converge_over_shared_root() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::at(1_000);
    let mut p1 = open_mind(dir.path(), &clock);
    let mut p2 = open_mind(dir.path(), &clock);

    let x = p1.remember("A", NodeType::Episode, None, no_tags()).unwrap();

    p2.sync_from_shared_field().unwrap();
    let seen = p2.get(x).unwrap().expect("p2 sees p1's write");
    assert_eq!(seen.text(), "A");
    let before = seen.effective();

    p2.weaken(x, 0.2).unwrap();
    p1.sync_from_shared_field().unwrap();
    let after = p1.get(x).unwrap().unwrap().effective();
    assert!(
        (before - after - 0.2).abs() < 0.05,
        "effective dropped {:.3} -> {:.3}",
        before,
        after
    );
}

#[test]
fn clustered_episodes_synthesize_one_wisdom() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::at(1_000);
    let mut mind = open_mind(dir.path(), &clock);

    let texts = [
        "deploy failed because the auth token expired",
        "the deploy failed again after the token expired",
        "release pipeline failed when the token expired",
    ];
    let mut mus = Vec::new();
    for text in texts {
        let id = mind
            .remember(text, NodeType::Episode, Some(0.6), no_tags())
            .unwrap();
        mus.push(mind.get(id).unwrap().unwrap().confidence.mu);
    }
    let avg: f32 = mus.iter().sum::<f32>() / mus.len() as f32;

    // The tick runs synthesis as its fourth step; a second explicit pass
    // finds nothing left because the episodes are tagged promoted
    mind.tick().unwrap();
    assert_eq!(mind.synthesize_wisdom().unwrap(), 0);

    let promoted = mind.recall_by_tag("promoted", 10).unwrap();
    assert_eq!(promoted.len(), 3);
    assert!(promoted.iter().all(|r| r.node_type == NodeType::Episode));

    // Exactly one wisdom node, embedded at the episode centroid, so the
    // same query surfaces it
    let wisdom_nodes: Vec<_> = mind
        .resonate("deploy token expired", 10, 0.3)
        .unwrap()
        .into_iter()
        .filter(|r| r.node_type == NodeType::Wisdom)
        .collect();
    assert_eq!(wisdom_nodes.len(), 1);
    let wisdom = &wisdom_nodes[0];
    assert!(wisdom.text.starts_with("Pattern observed (3 occurrences):"));

    // mu >= episode average + 0.2, clamped at 0.95
    let id = wisdom.id;
    let node = mind.get(id).unwrap().unwrap();
    let floor = (avg + 0.2 - 0.011).min(0.95);
    assert!(
        node.confidence.mu >= floor && node.confidence.mu <= 0.95,
        "wisdom mu {:.3} vs episode avg {:.3}",
        node.confidence.mu,
        avg
    );
}
