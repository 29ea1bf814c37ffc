#![allow(missing_docs)]

use cairn::{CommitGraph, CommitNodeInfo, GraphError, ABSOLUTE_PAST};
use tempfile::tempdir;

fn ids(infos: &[CommitNodeInfo]) -> Vec<&str> {
    infos.iter().map(|info| info.commit_id.as_str()).collect()
}

/// Runs the same assertions against the in-memory and the file-backed
/// backend; the facade contract is identical for both.
fn for_each_backend(test: impl Fn(&mut CommitGraph)) {
    let mut graph = CommitGraph::in_memory();
    test(&mut graph);

    let dir = tempdir().unwrap();
    let mut graph = CommitGraph::open(dir.path()).unwrap();
    test(&mut graph);
}

#[test]
fn empty_store_queries() {
    for_each_backend(|graph| {
        assert_eq!(graph.head().unwrap(), ABSOLUTE_PAST);
        assert!(graph.list_history().unwrap().is_empty());
        assert!(graph.list_history_from("anything").unwrap().is_empty());
        assert!(graph.list_all_history().unwrap().is_empty());
    });
}

#[test]
fn step_builds_reverse_chronological_chain() {
    for_each_backend(|graph| {
        graph.step("A").unwrap();
        graph.step("B").unwrap();
        graph.step("C").unwrap();

        assert_eq!(graph.head().unwrap(), "C");
        let history = graph.list_history().unwrap();
        assert_eq!(ids(&history), ["C", "B", "A"]);
        // Parent linkage, not just ordering.
        assert_eq!(history[0].parent_id, "B");
        assert_eq!(history[1].parent_id, "A");
        assert_eq!(history[2].parent_id, ABSOLUTE_PAST);
    });
}

#[test]
fn step_and_jump_scenario() {
    for_each_backend(|graph| {
        graph.step("A").unwrap();
        graph.step("B").unwrap();
        graph.step("C").unwrap();
        assert_eq!(ids(&graph.list_history().unwrap()), ["C", "B", "A"]);

        graph.jump("X").unwrap();
        assert_eq!(ids(&graph.list_history().unwrap()), ["X"]);
        // The old branch is untouched.
        assert_eq!(ids(&graph.list_history_from("C").unwrap()), ["C", "B", "A"]);

        graph.step("Y").unwrap();
        assert_eq!(ids(&graph.list_history().unwrap()), ["Y", "X"]);
    });
}

#[test]
fn jump_on_new_commit_attaches_to_absolute_past() {
    for_each_backend(|graph| {
        graph.jump("lone").unwrap();
        assert_eq!(graph.head().unwrap(), "lone");
        let history = graph.list_history_from("lone").unwrap();
        assert_eq!(ids(&history), ["lone"]);
        assert_eq!(history[0].parent_id, ABSOLUTE_PAST);
    });
}

#[test]
fn jump_is_idempotent_on_existing_commits() {
    for_each_backend(|graph| {
        graph.step("a").unwrap();
        graph.step("b").unwrap();

        graph.jump("b").unwrap();
        graph.jump("b").unwrap();
        // No duplicate entries, no altered chain; only the head moved.
        assert_eq!(graph.list_all_history().unwrap().len(), 2);
        assert_eq!(ids(&graph.list_history().unwrap()), ["b", "a"]);

        graph.jump("a").unwrap();
        assert_eq!(graph.head().unwrap(), "a");
        assert_eq!(ids(&graph.list_history().unwrap()), ["a"]);
        assert_eq!(graph.list_all_history().unwrap().len(), 2);
        // A commit reached via step keeps its original parent.
        assert_eq!(ids(&graph.list_history_from("b").unwrap()), ["b", "a"]);
    });
}

#[test]
fn step_onto_current_head_is_rejected() {
    for_each_backend(|graph| {
        graph.step("a").unwrap();
        let err = graph.step("a").unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument(_)));
        // The failed step must not have moved anything.
        assert_eq!(graph.head().unwrap(), "a");
        assert_eq!(graph.list_all_history().unwrap().len(), 1);
    });
}

#[test]
fn reserved_empty_id_is_rejected() {
    for_each_backend(|graph| {
        assert!(matches!(
            graph.step(""),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            graph.jump(""),
            Err(GraphError::InvalidArgument(_))
        ));
    });
}

#[test]
fn list_all_history_includes_unreachable_commits() {
    for_each_backend(|graph| {
        graph.step("a").unwrap();
        graph.jump("x").unwrap();
        graph.step("y").unwrap();

        assert_eq!(ids(&graph.list_history().unwrap()), ["y", "x"]);
        let mut all: Vec<String> = graph
            .list_all_history()
            .unwrap()
            .into_iter()
            .map(|info| info.commit_id)
            .collect();
        all.sort();
        assert_eq!(all, ["a", "x", "y"]);
    });
}

#[test]
fn iter_history_is_lazy_and_not_restartable() {
    for_each_backend(|graph| {
        for id in ["1", "2", "3", "4"] {
            graph.step(id).unwrap();
        }
        let mut iter = graph.iter_history().unwrap();
        assert_eq!(iter.next().unwrap().unwrap().commit_id, "4");
        assert_eq!(iter.next().unwrap().unwrap().commit_id, "3");
        // Draining the rest terminates at the root.
        assert_eq!(iter.count(), 2);

        // A fresh walker starts over.
        let again = graph.list_history().unwrap();
        assert_eq!(ids(&again), ["4", "3", "2", "1"]);
    });
}
