//! End-to-end inference on fixture graphs with both partition kinds.

use std::path::PathBuf;
use std::sync::Arc;

use hexgraph_core::{
    build_graph, infer, label_loss_and_gradient, load_label_graph, loss_and_gradient,
    EnumerationConfig, GraphSourceConfig, InferenceError, LabelGraph, LabelState, LossMode,
    PartitionStrategy, StateSpacePartition,
};

fn assert_close(lhs: f64, rhs: f64, eps: f64) {
    assert!((lhs - rhs).abs() <= eps, "lhs={lhs} rhs={rhs} eps={eps}");
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

fn animals() -> Arc<LabelGraph> {
    let config =
        GraphSourceConfig::new(fixture("animals.hex"), 8).with_label_names(fixture("animals.labels"));
    load_label_graph(&config).expect("graph")
}

fn partition(graph: &Arc<LabelGraph>, strategy: PartitionStrategy) -> StateSpacePartition {
    StateSpacePartition::enumerate(
        Arc::clone(graph),
        &EnumerationConfig::with_strategy(strategy),
    )
    .expect("partition")
}

const SCORES: [f64; 8] = [0.4, 1.1, -0.3, 0.8, -1.4, 0.2, 0.6, -0.9];

#[test]
fn three_label_scenario() {
    let graph = Arc::new(build_graph(&[(1, 0)], &[], &[], 3).expect("graph"));
    let p = partition(&graph, PartitionStrategy::Flat);
    let space = p.flat().expect("flat");
    for bits in ["000", "100", "110"] {
        let state = LabelState::from_bit_str(bits).expect("bits");
        assert!(space.state_index(&state).is_some(), "{bits} missing");
    }
    assert!(space
        .state_index(&LabelState::from_bit_str("010").expect("bits"))
        .is_none());

    let out = infer(&p, &[0.0, 2.0, -1.0]).expect("infer");
    assert!(out.log_partition >= 0.0);
    assert!(out.marginals[1] <= out.marginals[0]);

    // The canonical encoding of each label is accepted.
    for label in 0..3 {
        label_loss_and_gradient(&p, &[0.0, 2.0, -1.0], label, LossMode::Joint)
            .expect("consistent label");
    }
}

#[test]
fn animal_partitions_agree() {
    let graph = animals();
    let flat = partition(&graph, PartitionStrategy::Flat);
    let tree = partition(&graph, PartitionStrategy::JunctionTree);

    let a = infer(&flat, &SCORES).expect("flat");
    let b = infer(&tree, &SCORES).expect("tree");
    assert_close(a.log_partition, b.log_partition, 1e-9);
    for (x, y) in a.marginals.iter().zip(b.marginals.iter()) {
        assert_close(*x, *y, 1e-9);
    }

    for label in 0..8 {
        for mode in [LossMode::Joint, LossMode::Marginal] {
            let la = label_loss_and_gradient(&flat, &SCORES, label, mode).expect("flat loss");
            let lb = label_loss_and_gradient(&tree, &SCORES, label, mode).expect("tree loss");
            assert_close(la.loss, lb.loss, 1e-9);
            for (x, y) in la.gradient.iter().zip(lb.gradient.iter()) {
                assert_close(*x, *y, 1e-9);
            }
        }
    }
}

#[test]
fn animal_marginals_respect_the_hierarchy() {
    let graph = animals();
    let out = infer(&partition(&graph, PartitionStrategy::JunctionTree), &SCORES).expect("infer");
    for (child, parent) in graph.hierarchy_edges() {
        assert!(
            out.marginals[parent.index()] + 1e-12 >= out.marginals[child.index()],
            "{:?} -> {:?}",
            child,
            parent
        );
    }
    // Exclusive labels cannot jointly exceed probability one.
    for (a, b) in graph.exclusion_edges() {
        assert!(out.marginals[a.index()] + out.marginals[b.index()] <= 1.0 + 1e-12);
    }
    assert!(out.marginals.iter().all(|m| (0.0..=1.0).contains(m)));
}

#[test]
fn removing_an_exclusion_increases_z() {
    let with = Arc::new(build_graph(&[(1, 0), (2, 0)], &[(1, 2)], &[], 3).expect("graph"));
    let without = Arc::new(build_graph(&[(1, 0), (2, 0)], &[], &[], 3).expect("graph"));
    let scores = [0.1, -0.5, 0.3];
    let z_with = infer(&partition(&with, PartitionStrategy::Auto), &scores)
        .expect("with")
        .log_partition;
    let z_without = infer(&partition(&without, PartitionStrategy::Auto), &scores)
        .expect("without")
        .log_partition;
    assert!(z_without > z_with);
    assert!(z_with >= 0.0);
}

#[test]
fn inconsistent_ground_truth_fails_on_both_kinds() {
    let graph = animals();
    // puppy without dog.
    let bad = LabelState::from_true_labels(8, [0, 7]).expect("bits");
    for strategy in [PartitionStrategy::Flat, PartitionStrategy::JunctionTree] {
        let err = loss_and_gradient(&partition(&graph, strategy), &SCORES, &bad).unwrap_err();
        assert!(matches!(err, InferenceError::InconsistentLabel { .. }));
    }
}

#[test]
fn equal_scores_do_not_break_marginals() {
    let graph = animals();
    let out = infer(&partition(&graph, PartitionStrategy::Flat), &[0.0; 8]).expect("infer");
    let states = partition(&graph, PartitionStrategy::Flat)
        .flat()
        .expect("flat")
        .len();
    // Zero scores make every state weigh 1.
    assert_close(out.partition_function(), states as f64, 1e-9);
    assert!(out.marginals.iter().all(|m| m.is_finite()));
}
