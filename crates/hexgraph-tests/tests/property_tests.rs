//! Property tests for state-space and inference invariants on random graphs

use std::collections::BTreeSet;
use std::sync::Arc;

use hexgraph_core::{
    infer, label_loss_and_gradient, EnumerationConfig, LabelGraph, LabelState, LossMode,
    PartitionStrategy, StateSpacePartition,
};
use proptest::prelude::*;

const MAX_LABELS: usize = 7;

/// Random acyclic HEX graph: each label pair gets no edge, a hierarchy edge
/// oriented by a rotated rank, or an exclusion edge.
fn arb_graph() -> impl Strategy<Value = LabelGraph> {
    (1..=MAX_LABELS, 0..MAX_LABELS, prop::collection::vec(0u8..8, 21)).prop_map(
        |(n, shift, kinds)| {
            let rank = |i: usize| (i + shift) % n;
            let mut hierarchy = Vec::new();
            let mut exclusion = Vec::new();
            let mut k = 0;
            for a in 0..n {
                for b in (a + 1)..n {
                    match kinds[k] {
                        0 | 1 => {
                            let (child, parent) = if rank(a) > rank(b) { (a, b) } else { (b, a) };
                            hierarchy.push((child as u32, parent as u32));
                        }
                        2 => exclusion.push((a as u32, b as u32)),
                        _ => {}
                    }
                    k += 1;
                }
            }
            LabelGraph::build(&hierarchy, &exclusion, &[], n).expect("acyclic by rank")
        },
    )
}

fn arb_scores() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-3.0f64..3.0, MAX_LABELS)
}

fn partition(graph: &Arc<LabelGraph>, strategy: PartitionStrategy) -> StateSpacePartition {
    StateSpacePartition::enumerate(Arc::clone(graph), &EnumerationConfig::with_strategy(strategy))
        .expect("partition")
}

fn brute_force_states(graph: &LabelGraph) -> BTreeSet<String> {
    let n = graph.node_count();
    (0u32..(1 << n))
        .filter_map(|mask| {
            LabelState::from_true_labels(n, (0..n).filter(|i| mask & (1 << i) != 0))
        })
        .filter(|state| graph.is_consistent(state))
        .map(|state| state.to_string())
        .collect()
}

/// Central difference of the loss against the analytic gradient.
fn check_gradient(
    partition: &StateSpacePartition,
    scores: &[f64],
    label: i64,
    mode: LossMode,
) -> Result<(), TestCaseError> {
    let Ok(analytic) = label_loss_and_gradient(partition, scores, label, mode) else {
        // Dead label: no gradient to check.
        return Ok(());
    };
    let h = 1e-5;
    for i in 0..scores.len() {
        let mut up = scores.to_vec();
        let mut down = scores.to_vec();
        up[i] += h;
        down[i] -= h;
        let lu = label_loss_and_gradient(partition, &up, label, mode)
            .map_err(|e| TestCaseError::fail(e.to_string()))?
            .loss;
        let ld = label_loss_and_gradient(partition, &down, label, mode)
            .map_err(|e| TestCaseError::fail(e.to_string()))?
            .loss;
        let numeric = (lu - ld) / (2.0 * h);
        prop_assert!(
            (numeric - analytic.gradient[i]).abs() < 1e-5,
            "label {} coordinate {}: numeric {} analytic {}",
            label,
            i,
            numeric,
            analytic.gradient[i]
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn flat_states_match_brute_force(graph in arb_graph()) {
        let graph = Arc::new(graph);
        let flat = partition(&graph, PartitionStrategy::Flat);
        let space = flat.flat().expect("flat");
        let listed: BTreeSet<String> = space.states().iter().map(|s| s.to_string()).collect();
        prop_assert_eq!(listed.len(), space.len());
        prop_assert_eq!(listed, brute_force_states(&graph));
    }

    #[test]
    fn representations_agree(graph in arb_graph(), scores in arb_scores()) {
        let graph = Arc::new(graph);
        let scores = &scores[..graph.node_count()];
        let flat = infer(&partition(&graph, PartitionStrategy::Flat), scores).expect("flat");
        let tree = infer(&partition(&graph, PartitionStrategy::JunctionTree), scores)
            .expect("tree");
        prop_assert!((flat.log_partition - tree.log_partition).abs() < 1e-9);
        for (a, b) in flat.marginals.iter().zip(tree.marginals.iter()) {
            prop_assert!((a - b).abs() < 1e-9, "flat {} tree {}", a, b);
        }
    }

    #[test]
    fn marginals_respect_the_graph(graph in arb_graph(), scores in arb_scores()) {
        let graph = Arc::new(graph);
        let scores = &scores[..graph.node_count()];
        let out = infer(&partition(&graph, PartitionStrategy::JunctionTree), scores)
            .expect("infer");
        // The all-false state contributes 1.
        prop_assert!(out.log_partition >= 0.0);
        for &m in &out.marginals {
            prop_assert!((-1e-12..=1.0 + 1e-12).contains(&m));
        }
        for (child, parent) in graph.hierarchy_edges() {
            prop_assert!(out.marginals[parent.index()] + 1e-12 >= out.marginals[child.index()]);
        }
        for (a, b) in graph.exclusion_edges() {
            prop_assert!(out.marginals[a.index()] + out.marginals[b.index()] <= 1.0 + 1e-12);
        }
        for dead in graph.dead_labels() {
            prop_assert!(out.marginals[dead.index()].abs() < 1e-12);
        }
    }

    #[test]
    fn joint_gradient_matches_finite_difference(
        graph in arb_graph(),
        scores in arb_scores(),
        label in 0..MAX_LABELS,
    ) {
        let graph = Arc::new(graph);
        let scores = &scores[..graph.node_count()];
        let label = (label % graph.node_count()) as i64;
        check_gradient(&partition(&graph, PartitionStrategy::Flat), scores, label, LossMode::Joint)?;
    }

    #[test]
    fn marginal_gradient_matches_finite_difference(
        graph in arb_graph(),
        scores in arb_scores(),
        label in 0..MAX_LABELS,
    ) {
        let graph = Arc::new(graph);
        let scores = &scores[..graph.node_count()];
        let label = (label % graph.node_count()) as i64;
        let tree = partition(&graph, PartitionStrategy::JunctionTree);
        check_gradient(&tree, scores, label, LossMode::Marginal)?;
    }
}
