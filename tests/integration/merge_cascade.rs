#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use cairn::{CommitGraph, CommitNodeInfo, GraphConfig};
use tempfile::tempdir;

fn ids(infos: &[CommitNodeInfo]) -> Vec<String> {
    infos.iter().map(|info| info.commit_id.clone()).collect()
}

/// Tiny tiers so a handful of inserts forces multi-rank cascades.
fn small_config() -> GraphConfig {
    GraphConfig::default().max_base_size(4)
}

fn block_files(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .unwrap()
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("commit_block_") && name != "commit_block_tail")
        .collect();
    names.sort();
    names
}

#[test]
fn cascade_preserves_every_chain() {
    let dir = tempdir().unwrap();
    let mut graph = CommitGraph::open_with_config(dir.path(), small_config()).unwrap();

    // 12 inserts under max_base_size 4: three tail flushes, one of which
    // cascades into rank 1.
    let commits: Vec<String> = (1..=12).map(|i| format!("c{i:02}")).collect();
    for id in &commits {
        graph.step(id).unwrap();
    }

    for (index, id) in commits.iter().enumerate() {
        let mut expected: Vec<String> = commits[..=index].to_vec();
        expected.reverse();
        assert_eq!(
            ids(&graph.list_history_from(id).unwrap()),
            expected,
            "chain broken at {id}"
        );
    }
    assert_eq!(graph.head().unwrap(), "c12");
}

#[test]
fn merging_is_invisible_to_readers() {
    // The same insert sequence against tiny tiers (merges on every fourth
    // insert), huge tiers (never merges), and the in-memory model.
    let merged_dir = tempdir().unwrap();
    let flat_dir = tempdir().unwrap();
    let mut merged = CommitGraph::open_with_config(merged_dir.path(), small_config()).unwrap();
    let mut flat = CommitGraph::open_with_config(
        flat_dir.path(),
        GraphConfig::default().max_base_size(1024),
    )
    .unwrap();
    let mut memory = CommitGraph::in_memory();

    let commits: Vec<String> = (1..=20).map(|i| format!("n{i:02}")).collect();
    for (index, id) in commits.iter().enumerate() {
        if index % 5 == 4 {
            merged.jump(id).unwrap();
            flat.jump(id).unwrap();
            memory.jump(id).unwrap();
        } else {
            merged.step(id).unwrap();
            flat.step(id).unwrap();
            memory.step(id).unwrap();
        }
    }

    assert_eq!(merged.head().unwrap(), flat.head().unwrap());
    assert_eq!(merged.head().unwrap(), memory.head().unwrap());
    for id in &commits {
        let reference = ids(&flat.list_history_from(id).unwrap());
        assert_eq!(ids(&merged.list_history_from(id).unwrap()), reference);
        assert_eq!(ids(&memory.list_history_from(id).unwrap()), reference);
    }
}

#[test]
fn tail_is_cleared_by_each_flush() {
    let dir = tempdir().unwrap();
    let mut graph = CommitGraph::open_with_config(dir.path(), small_config()).unwrap();

    for i in 1..=4 {
        graph.step(&format!("t{i}")).unwrap();
    }
    // Exactly at the flush boundary the tail file is gone.
    assert!(!dir.path().join("commit_block_tail").exists());

    graph.step("t5").unwrap();
    assert!(dir.path().join("commit_block_tail").exists());
}

#[test]
fn only_latest_generation_per_rank_survives() {
    let dir = tempdir().unwrap();
    let mut graph = CommitGraph::open_with_config(dir.path(), small_config()).unwrap();

    for i in 1..=24 {
        graph.step(&format!("g{i:02}")).unwrap();
    }

    // Group surviving block files by rank; each rank may keep at most one
    // generation, and no temp files may linger.
    let mut by_rank: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for name in block_files(dir.path()) {
        assert!(!name.ends_with(".tmp"), "temp file survived: {name}");
        let rank = name
            .strip_prefix("commit_block_")
            .and_then(|rest| rest.split('_').next())
            .unwrap()
            .to_string();
        by_rank.entry(rank).or_default().push(name);
    }
    assert!(!by_rank.is_empty());
    for (rank, files) in by_rank {
        assert_eq!(files.len(), 1, "rank {rank} kept {files:?}");
    }
}

#[test]
fn list_all_history_is_exact_after_merges() {
    let dir = tempdir().unwrap();
    let mut graph = CommitGraph::open_with_config(dir.path(), small_config()).unwrap();

    let mut inserted: Vec<String> = Vec::new();
    for i in 1..=17 {
        let id = format!("a{i:02}");
        graph.step(&id).unwrap();
        inserted.push(id);
    }

    let mut all = ids(&graph.list_all_history().unwrap());
    all.sort();
    inserted.sort();
    assert_eq!(all, inserted);
}

#[test]
fn branches_survive_compaction() {
    let dir = tempdir().unwrap();
    let mut graph = CommitGraph::open_with_config(dir.path(), small_config()).unwrap();

    for i in 1..=6 {
        graph.step(&format!("main{i}")).unwrap();
    }
    graph.jump("side").unwrap();
    for i in 1..=6 {
        graph.step(&format!("side{i}")).unwrap();
    }

    assert_eq!(
        ids(&graph.list_history().unwrap()),
        ["side6", "side5", "side4", "side3", "side2", "side1", "side"]
    );
    assert_eq!(
        ids(&graph.list_history_from("main6").unwrap()),
        ["main6", "main5", "main4", "main3", "main2", "main1"]
    );
}
