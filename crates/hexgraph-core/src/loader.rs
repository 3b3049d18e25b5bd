//! Builds a [`LabelGraph`] from graph and label-name files.

use std::sync::Arc;

use hexgraph_frontend::{
    load_graph_source, load_label_table, validate_graph_source, validate_label_table, LabelTable,
};

use crate::engine::errors::HexResult;
use crate::engine::graph::LabelGraph;
use crate::layers::config::GraphSourceConfig;

/// Reads, validates, and builds the graph described by `config`.
pub fn load_label_graph(config: &GraphSourceConfig) -> HexResult<Arc<LabelGraph>> {
    config.validate()?;
    let source = load_graph_source(&config.graph_file)?;
    validate_graph_source(&source, config.node_count)?;

    let labels = match &config.label_name_file {
        Some(path) => {
            let table = load_label_table(path)?;
            validate_label_table(&table, config.node_count)?;
            table
        }
        None => LabelTable::default(),
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        graph_file = %config.graph_file.display(),
        hierarchy_edges = source.hierarchy.len(),
        exclusion_edges = source.exclusion.len(),
        named = !labels.is_empty(),
        "graph source parsed"
    );

    let graph = LabelGraph::from_source(&source, &labels, config.node_count as usize)?;
    Ok(Arc::new(graph))
}
