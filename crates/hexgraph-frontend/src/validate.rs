//! Validation of parsed sources against an expected label count.

use crate::ast::{GraphSource, LabelTable};
use crate::errors::FrontendError;

/// Checks that every index in `source` addresses one of `node_count` labels
/// and that a `nodes` declaration, if present, agrees with `node_count`.
pub fn validate_graph_source(source: &GraphSource, node_count: u32) -> Result<(), FrontendError> {
    if let Some(declared) = source.declared_nodes {
        if declared != node_count {
            return Err(FrontendError::ValidationError(format!(
                "graph source declares {} labels but {} were configured",
                declared, node_count
            )));
        }
    }

    for edge in &source.hierarchy {
        for id in [edge.child, edge.parent] {
            if id >= node_count {
                return Err(FrontendError::at(
                    edge.position,
                    format!(
                        "hierarchy edge references label {} (node count {})",
                        id, node_count
                    ),
                ));
            }
        }
    }

    for edge in &source.exclusion {
        for id in [edge.a, edge.b] {
            if id >= node_count {
                return Err(FrontendError::at(
                    edge.position,
                    format!(
                        "exclusion edge references label {} (node count {})",
                        id, node_count
                    ),
                ));
            }
        }
    }

    Ok(())
}

/// Checks that a label table names exactly `node_count` labels.
pub fn validate_label_table(table: &LabelTable, node_count: u32) -> Result<(), FrontendError> {
    if table.len() != node_count as usize {
        return Err(FrontendError::ValidationError(format!(
            "label table has {} names but {} labels were configured",
            table.len(),
            node_count
        )));
    }
    Ok(())
}
