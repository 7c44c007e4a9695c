use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use ppin_reweight::pipeline::cache_path;
use ppin_reweight::{
    ego_network, run_depths, Algorithm, EngineConfig, EvidenceTable, FnScorer, GraphRef,
    InteractionRecord, NodeSet, Ppin, ReweightConfig, ReweightPipeline, RunContext,
    ScoringEngine,
};
use proptest::prelude::*;

/// Depth-incremental recursion: `N(u, k) = N(u, k-1) ∪ ⋃_{w ∈ N(u, k-1)} N(w, 1)`.
fn ego_network_recursive<G: GraphRef>(graph: &G, u: usize, k: usize) -> NodeSet {
    if k == 0 {
        return NodeSet::from([u]);
    }
    let prev = ego_network_recursive(graph, u, k - 1);
    let mut out = prev.clone();
    for &w in &prev {
        out.extend(graph.neighbors_ref(w).iter().copied());
    }
    out
}

fn graph_from_pairs(n: usize, pairs: &[(usize, usize)]) -> Ppin {
    let triples: Vec<(String, String, f64)> = pairs
        .iter()
        .filter(|(u, v)| u < &n && v < &n)
        .map(|&(u, v)| (format!("P{u}"), format!("P{v}"), 1.0))
        .collect();
    Ppin::from_triples(triples)
}

/// Eight proteins, two loosely joined clusters, one duplicated edge.
fn fixture() -> (Arc<Ppin>, EvidenceTable) {
    let g = Ppin::from_triples([
        ("YAL001C", "YBR002W", 1.0),
        ("YBR002W", "YCR003X", 1.0),
        ("YAL001C", "YCR003X", 1.0),
        ("YCR003X", "YDR004Y", 1.0),
        ("YDR004Y", "YEL005Z", 1.0),
        ("YEL005Z", "YFL006A", 1.0),
        ("YDR004Y", "YFL006A", 1.0),
        ("YFL006A", "YGL007B", 1.0),
        ("YGL007B", "YHL008C", 1.0),
        ("YAL001C", "YBR002W", 0.5),
    ]);
    let mut records = Vec::new();
    let both = |a: &str, b: &str, t: &str, out: &mut Vec<InteractionRecord>| {
        out.push(InteractionRecord::new(a, b, t, "physical"));
        out.push(InteractionRecord::new(b, a, t, "physical"));
    };
    both("YAL001C", "YBR002W", "Two-hybrid", &mut records);
    both("YBR002W", "YCR003X", "Two-hybrid", &mut records);
    both("YAL001C", "YCR003X", "Affinity Capture-MS", &mut records);
    both("YCR003X", "YDR004Y", "Affinity Capture-MS", &mut records);
    both("YDR004Y", "YEL005Z", "Two-hybrid", &mut records);
    both("YEL005Z", "YFL006A", "Reconstituted Complex", &mut records);
    records.push(InteractionRecord::new("YDR004Y", "YFL006A", "Two-hybrid", "physical"));
    records.push(InteractionRecord::new("YGL007B", "YHL008C", "Synthetic Lethality", "genetic"));
    // outside the graph: counted in reliabilities, trimmed afterwards
    both("YZZ900W", "YZZ901W", "Two-hybrid", &mut records);
    (Arc::new(g), EvidenceTable::from_records(records))
}

const ALL: [Algorithm; 5] = [
    Algorithm::SimpleFs,
    Algorithm::DepthFs,
    Algorithm::Chua,
    Algorithm::ChuaTransitive,
    Algorithm::Dissimilarity,
];

proptest! {
    #[test]
    fn prop_adjacency_is_symmetric_and_radius_zero_is_self(
        n in 1usize..12,
        pairs in proptest::collection::vec((0usize..12, 0usize..12), 1..40),
    ) {
        let g = graph_from_pairs(n, &pairs);
        for u in 0..g.node_count() {
            for &v in g.neighbors_ref(u) {
                prop_assert!(g.neighbors_ref(v).contains(&u), "{u}->{v} not mirrored");
            }
            prop_assert_eq!(ego_network(&g, u, 0), NodeSet::from([u]));
        }
        for e in g.edges() {
            prop_assert!(e.source < g.node_count() && e.target < g.node_count());
        }
    }

    #[test]
    fn prop_neighbor_sets_are_monotone_and_strategy_independent(
        n in 1usize..12,
        pairs in proptest::collection::vec((0usize..12, 0usize..12), 1..40),
        k in 0usize..5,
    ) {
        let g = graph_from_pairs(n, &pairs);
        for u in 0..g.node_count() {
            let small = ego_network(&g, u, k);
            let big = ego_network(&g, u, k + 1);
            prop_assert!(small.is_subset(&big));
            prop_assert_eq!(&small, &ego_network_recursive(&g, u, k));
        }
    }
}

#[cfg(feature = "petgraph")]
mod petgraph_invariants {
    use super::*;
    use petgraph::algo::dijkstra;
    use petgraph::graph::NodeIndex;

    #[test]
    fn ego_network_matches_petgraph_shortest_paths() {
        let (g, _) = fixture();
        let pg = g.to_petgraph();
        for u in 0..g.node_count() {
            let dist = dijkstra(&pg, NodeIndex::new(u), None, |_| 1usize);
            for k in 0..6 {
                let expected: NodeSet = dist
                    .iter()
                    .filter(|(_, &d)| d <= k)
                    .map(|(n, _)| n.index())
                    .collect();
                assert_eq!(ego_network(&*g, u, k), expected, "u={u} k={k}");
            }
        }
    }
}

#[test]
fn triangle_simple_fs_matches_hand_computation() {
    // N(A) = N(B) = {A, B, C}; n_avg = 3/3 = 1
    // num = 2·3 = 6; lambda = max(0, 1 - (0 + 3)) = 0; S = (6/(0+6+0))·(6/(0+6+0)) = 1
    let g = Arc::new(Ppin::from_triples([
        ("A", "B", 1.0),
        ("B", "C", 1.0),
        ("A", "C", 1.0),
    ]));
    let mut engine =
        ScoringEngine::new(g, EvidenceTable::default(), EngineConfig::default()).unwrap();
    engine.set_depth_checked(1).unwrap();
    assert_eq!(
        engine.score_by_name(Algorithm::SimpleFs, "A", "B").unwrap(),
        1.0
    );
    assert_eq!(
        engine.score_by_name(Algorithm::DepthFs, "A", "B").unwrap(),
        1.0
    );
}

#[test]
fn toy_database_reliability_and_r_int() {
    // 3 x Two-hybrid, 1 x Affinity Capture-MS over 4 records.
    let g = Arc::new(Ppin::from_triples([
        ("A", "B", 1.0),
        ("B", "C", 1.0),
        ("A", "C", 1.0),
    ]));
    let db = EvidenceTable::from_records(vec![
        InteractionRecord::new("A", "B", "Two-hybrid", "physical"),
        InteractionRecord::new("B", "A", "Two-hybrid", "physical"),
        InteractionRecord::new("B", "C", "Two-hybrid", "physical"),
        InteractionRecord::new("C", "B", "Affinity Capture-MS", "physical"),
    ]);
    let engine = ScoringEngine::new(g, db, EngineConfig::default()).unwrap();
    let model = engine.reliability();
    assert_eq!(model.table().get("Two-hybrid"), 0.75);
    assert_eq!(model.table().get("Affinity Capture-MS"), 0.25);
    // only A-B shares a type in both directions: (1 + 1) / 3
    assert!((model.r_int() - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn reliability_counts_full_table_before_trimming() {
    let (g, db) = fixture();
    let total = db.len();
    let engine = ScoringEngine::new(g.clone(), db, EngineConfig::default()).unwrap();
    let nodes: HashSet<&str> = g.names().iter().map(String::as_str).collect();
    assert_eq!(engine.database().len(), total - 2);
    for r in ppin_reweight::InteractionDatabase::records(engine.database()) {
        assert!(nodes.contains(r.interactor_a.as_str()) || nodes.contains(r.interactor_b.as_str()));
    }
    // the two off-graph Two-hybrid rows still count: 9 of 16
    let two_hybrid = engine.reliability().table().get("Two-hybrid");
    assert!((two_hybrid - 9.0 / 16.0).abs() < 1e-12, "{two_hybrid}");
}

#[test]
fn resumed_run_is_byte_identical_and_only_scores_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let (g, db) = fixture();
    let mut engine = ScoringEngine::new(g.clone(), db, EngineConfig::default()).unwrap();
    engine.set_depth(2);
    let pipeline = ReweightPipeline::new(true, RunContext::quiet());

    let full = dir.path().join("full.txt");
    let report = pipeline
        .run(&g, &mut engine.scorer(Algorithm::Chua), &full, false)
        .unwrap();
    let n = report.total;
    assert_eq!(report.computed, n);
    let cache_text = fs::read_to_string(cache_path(&full)).unwrap();
    assert_eq!(cache_text.lines().count(), n);

    // simulate a crash after k edges
    let k = 4;
    let partial = dir.path().join("partial.txt");
    let prefix: String = cache_text.lines().take(k).map(|l| format!("{l}\n")).collect();
    fs::write(cache_path(&partial), prefix).unwrap();

    let mut calls = 0usize;
    let report = {
        let mut scorer = FnScorer(|u: &str, v: &str| {
            calls += 1;
            engine.score_by_name(Algorithm::Chua, u, v)
        });
        pipeline.run(&g, &mut scorer, &partial, true).unwrap()
    };
    assert_eq!(report.resumed, k);
    assert_eq!(report.computed, n - k);
    assert_eq!(calls, n - k);
    assert_eq!(fs::read(&full).unwrap(), fs::read(&partial).unwrap());
    assert_eq!(
        fs::read(cache_path(&full)).unwrap(),
        fs::read(cache_path(&partial)).unwrap()
    );
}

#[test]
fn every_algorithm_preserves_edge_count_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let (g, db) = fixture();
    let mut engine = ScoringEngine::new(g.clone(), db, EngineConfig::default()).unwrap();
    engine.set_depth(2);
    let expected: Vec<(String, String)> = g
        .edges()
        .iter()
        .map(|e| (g.name(e.source).to_string(), g.name(e.target).to_string()))
        .collect();

    for algorithm in ALL {
        let out = dir.path().join(format!("{algorithm}.txt"));
        ReweightPipeline::default()
            .run(&g, &mut engine.scorer(algorithm), &out, false)
            .unwrap();
        let text = fs::read_to_string(&out).unwrap();
        let got: Vec<(String, String)> = text
            .split('\n')
            .map(|l| {
                let f: Vec<&str> = l.split('\t').collect();
                assert_eq!(f.len(), 3, "{algorithm}: {l}");
                let (int, frac) = f[2].split_once('.').unwrap();
                assert!(!int.is_empty());
                assert_eq!(frac.len(), 16, "{algorithm}: {l}");
                let w: f64 = f[2].parse().unwrap();
                assert!(w.is_finite() && w >= 0.0, "{algorithm}: {l}");
                (f[0].to_string(), f[1].to_string())
            })
            .collect();
        assert_eq!(got, expected, "{algorithm}");
    }
}

#[test]
fn bounded_memo_gives_the_same_scores() {
    let (g, db) = fixture();
    let mut unbounded = ScoringEngine::new(g.clone(), db.clone(), EngineConfig::default()).unwrap();
    let config = EngineConfig {
        memo_capacity: Some(3),
        ..EngineConfig::default()
    };
    let mut bounded = ScoringEngine::new(g.clone(), db, config).unwrap();
    for depth in 0..4 {
        unbounded.set_depth(depth);
        bounded.set_depth(depth);
        for algorithm in ALL {
            for e in g.edges() {
                assert_eq!(
                    unbounded.score(algorithm, e.source, e.target).unwrap(),
                    bounded.score(algorithm, e.source, e.target).unwrap(),
                    "{algorithm} depth={depth}"
                );
            }
        }
    }
}

#[test]
fn switching_depth_matches_a_fresh_engine() {
    let (g, db) = fixture();
    let mut switched = ScoringEngine::new(g.clone(), db.clone(), EngineConfig::default()).unwrap();
    switched.set_depth(1);
    let shallow = switched.r1_bounds().unwrap();
    for e in g.edges() {
        switched.score(Algorithm::Dissimilarity, e.source, e.target).unwrap();
    }
    switched.set_depth(3);

    let mut fresh = ScoringEngine::new(g.clone(), db, EngineConfig::default()).unwrap();
    fresh.set_depth(3);
    assert_eq!(switched.r1_bounds().unwrap(), fresh.r1_bounds().unwrap());
    for e in g.edges() {
        for algorithm in ALL {
            assert_eq!(
                switched.score(algorithm, e.source, e.target).unwrap(),
                fresh.score(algorithm, e.source, e.target).unwrap(),
                "{algorithm} {}-{}",
                g.name(e.source),
                g.name(e.target)
            );
        }
    }
    switched.set_depth(1);
    assert_eq!(switched.r1_bounds().unwrap(), shallow);
}

#[test]
fn depth_sweep_writes_one_versioned_file_per_depth() {
    let dir = tempfile::tempdir().unwrap();
    let (g, db) = fixture();
    let mut engine = ScoringEngine::new(g, db, EngineConfig::default()).unwrap();
    let config = ReweightConfig {
        depth_from: 1,
        depth_to: 3,
        algorithm: Algorithm::DepthFs,
        cache: true,
        ..Default::default()
    };
    let input = dir.path().join("Collins.txt");
    let reports = run_depths(
        &mut engine,
        &config,
        &input,
        dir.path(),
        &RunContext::quiet(),
    )
    .unwrap();
    assert_eq!(reports.len(), 3);
    for (depth, r) in (1..=3).zip(&reports) {
        assert_eq!(r.output, dir.path().join(format!("Collinsv{depth}.txt")));
        assert!(r.output.exists());
        assert!(cache_path(&r.output).exists());
    }
    // wider neighbourhoods change at least one score
    let d1 = fs::read_to_string(&reports[0].output).unwrap();
    let d3 = fs::read_to_string(&reports[2].output).unwrap();
    assert_ne!(d1, d3);
    assert_eq!(engine.depth(), 3);
}

#[test]
fn negative_depth_sweep_is_rejected() {
    let (g, db) = fixture();
    let mut engine = ScoringEngine::new(g, db, EngineConfig::default()).unwrap();
    let config = ReweightConfig {
        depth_from: -1,
        ..Default::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let err = run_depths(
        &mut engine,
        &config,
        &dir.path().join("in.txt"),
        dir.path(),
        &RunContext::quiet(),
    )
    .unwrap_err();
    assert!(format!("{err}").contains("depth"));
    assert!(engine.set_depth_checked(-3).is_err());
}
