//! Graph construction from fixtures and edge lists.

use std::path::PathBuf;

use hexgraph_core::{
    build_graph, load_label_graph, GraphError, GraphSourceConfig, HexError, InferenceError,
    LabelState, NodeId,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

fn animals_config() -> GraphSourceConfig {
    GraphSourceConfig::new(fixture("animals.hex"), 8).with_label_names(fixture("animals.labels"))
}

#[test]
fn loads_named_animal_graph() {
    let graph = load_label_graph(&animals_config()).expect("graph");
    assert_eq!(graph.node_count(), 8);
    assert_eq!(graph.name(NodeId(7)), Some("puppy"));
    assert_eq!(graph.hierarchy_edge_count(), 8);
    assert_eq!(graph.exclusion_edge_count(), 3);
    assert_eq!(graph.dead_labels().count(), 0);

    // puppy -> dog -> {mammal, pet}, mammal -> animal
    let ancestors: Vec<usize> = graph.ancestors(NodeId(7)).iter_true().collect();
    assert_eq!(ancestors, vec![0, 1, 3, 6]);
    assert!(graph.excludes(NodeId(5), NodeId(6)));
    assert!(graph.excludes(NodeId(6), NodeId(5)));
}

#[test]
fn default_names_without_label_file() {
    let graph = load_label_graph(&GraphSourceConfig::new(fixture("animals.hex"), 8)).expect("graph");
    assert_eq!(graph.name(NodeId(3)), Some("label_3"));
}

#[test]
fn cyclic_fixture_is_rejected() {
    let err = load_label_graph(&GraphSourceConfig::new(fixture("cyclic.hex"), 3)).unwrap_err();
    assert!(matches!(err, HexError::Graph(GraphError::Cycle { .. })));
}

#[test]
fn node_count_mismatch_is_a_frontend_error() {
    let err = load_label_graph(&GraphSourceConfig::new(fixture("animals.hex"), 9)).unwrap_err();
    assert!(matches!(err, HexError::Frontend(_)));
}

#[test]
fn label_count_mismatch_is_rejected() {
    let err = build_graph(&[(1, 0)], &[], &["a".into(), "b".into()], 3).unwrap_err();
    assert_eq!(
        err,
        GraphError::LabelCount {
            expected: 3,
            found: 2
        }
    );
}

#[test]
fn structural_errors() {
    assert!(matches!(
        build_graph(&[(3, 0)], &[], &[], 3),
        Err(GraphError::OutOfRange { id: 3, .. })
    ));
    assert!(matches!(
        build_graph(&[(0, 0)], &[], &[], 1),
        Err(GraphError::Cycle { node: 0 })
    ));
    assert!(matches!(
        build_graph(&[], &[(1, 1)], &[], 2),
        Err(GraphError::SelfExclusion { node: 1 })
    ));
}

#[test]
fn duplicate_edges_collapse() {
    let graph = build_graph(&[(1, 0), (1, 0)], &[(1, 2), (2, 1)], &[], 3).expect("graph");
    assert_eq!(graph.hierarchy_edge_count(), 1);
    assert_eq!(graph.exclusion_edge_count(), 1);
}

#[test]
fn canonical_label_states() {
    let graph = load_label_graph(&animals_config()).expect("graph");
    let puppy = graph.label_state(7).expect("state");
    assert_eq!(puppy, LabelState::from_true_labels(8, [0, 1, 3, 6, 7]).expect("bits"));
    for label in 0..8 {
        let state = graph.label_state(label).expect("state");
        assert!(graph.is_consistent(&state), "label {label}");
    }
    assert!(matches!(
        graph.label_state(8),
        Err(InferenceError::LabelOutOfRange { label: 8, .. })
    ));
}

#[test]
fn dead_label_is_reported() {
    // 2 sits under two mutually exclusive parents.
    let graph = build_graph(&[(2, 0), (2, 1)], &[(0, 1)], &[], 3).expect("graph");
    assert_eq!(graph.dead_labels().collect::<Vec<_>>(), vec![NodeId(2)]);
    assert!(!graph.is_consistent(&graph.label_state(2).expect("state")));
}
