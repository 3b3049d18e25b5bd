//! # HexGraph Core
//!
//! Exact inference over hierarchy-and-exclusion (HEX) label graphs: the
//! consistent state space of a graph, its partition function and marginals
//! for a score vector, and the loss and accuracy layers built on them.

pub mod engine;
pub mod layers;
pub mod loader;

// Re-export commonly used types
pub use engine::errors::{GraphError, HexError, HexResult, InferenceError};
pub use engine::graph::{LabelGraph, LabelNode, NodeId};
pub use engine::inference::{
    infer, infer_conditioned, label_loss_and_gradient, log_partition, loss_and_gradient,
    marginal_loss_and_gradient, Inference, LossAndGradient, LossMode,
};
pub use engine::label_state::LabelState;
pub use engine::partition::{
    EnumerationConfig, PartitionKind, PartitionStrategy, PartitionSummary, StateSpacePartition,
};
pub use layers::accuracy::{AccuracyOutput, HexAccuracyLayer};
pub use layers::blob::Blob;
pub use layers::config::{GraphSourceConfig, HexAccuracyConfig, HexLossConfig};
pub use layers::loss::HexLossLayer;
pub use loader::load_label_graph;

/// Builds a label graph from edge lists.
///
/// Shorthand for [`LabelGraph::build`].
pub fn build_graph(
    hierarchy: &[(u32, u32)],
    exclusion: &[(u32, u32)],
    label_names: &[String],
    node_count: usize,
) -> Result<LabelGraph, GraphError> {
    LabelGraph::build(hierarchy, exclusion, label_names, node_count)
}

/// Enumerates the consistent state space of `graph`.
///
/// Shorthand for [`StateSpacePartition::enumerate`].
pub fn enumerate(
    graph: std::sync::Arc<LabelGraph>,
    config: &EnumerationConfig,
) -> Result<StateSpacePartition, GraphError> {
    StateSpacePartition::enumerate(graph, config)
}
