//! Graph source and label table loading from fixture files.

use std::path::PathBuf;

use hexgraph_frontend::{
    load_graph_source, load_label_table, parse_graph_source, validate_graph_source,
    validate_label_table, FrontendError,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

#[test]
fn animals_fixture_parses() {
    let source = load_graph_source(fixture("animals.hex")).expect("parse");
    assert_eq!(source.declared_nodes, Some(8));
    assert_eq!(source.hierarchy.len(), 8);
    assert_eq!(source.exclusion.len(), 3);
    assert_eq!(source.implied_node_count(), 8);
    validate_graph_source(&source, 8).expect("valid");

    let first = source.hierarchy[0];
    assert_eq!((first.child, first.parent), (1, 0));
    assert_eq!(first.position.line, 5);
}

#[test]
fn animals_labels_parse() {
    let table = load_label_table(fixture("animals.labels")).expect("labels");
    assert_eq!(table.len(), 8);
    assert_eq!(table.names[7], "puppy");
    validate_label_table(&table, 8).expect("valid");
    assert!(matches!(
        validate_label_table(&table, 9),
        Err(FrontendError::ValidationError(_))
    ));
}

#[test]
fn declared_count_must_match_configuration() {
    let source = load_graph_source(fixture("animals.hex")).expect("parse");
    let err = validate_graph_source(&source, 10).unwrap_err();
    assert!(err.to_string().contains("declares 8"));
}

#[test]
fn out_of_range_edge_reports_its_line() {
    let source = parse_graph_source("h 1 0\n\ne 0 9\n").expect("parse");
    let err = validate_graph_source(&source, 4).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("label 9"), "{message}");
    assert!(message.contains("3:"), "{message}");
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_graph_source(fixture("does-not-exist.hex")).unwrap_err();
    assert!(matches!(err, FrontendError::Io { .. }));
}

#[test]
fn malformed_source_is_a_parse_error() {
    assert!(matches!(
        parse_graph_source("h 1\n"),
        Err(FrontendError::ParseError(_))
    ));
    assert!(matches!(
        parse_graph_source("x 1 2\n"),
        Err(FrontendError::ParseError(_))
    ));
}
