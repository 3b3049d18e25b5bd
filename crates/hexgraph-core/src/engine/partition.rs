//! State-space partition: the structure inference sums over.
//!
//! A partition is built once per graph and shared by every example. Small
//! graphs are listed flat; larger ones are factorized into a junction tree.

use std::sync::Arc;

use crate::engine::errors::GraphError;
use crate::engine::graph::LabelGraph;
use crate::engine::junction_tree::{JunctionTree, JunctionTreeStats};
use crate::engine::label_state::LabelState;
use crate::engine::state_space::FlatStateSpace;

/// Default ceiling on flat-enumerated states.
pub const DEFAULT_MAX_STATES: usize = 1 << 20;

/// Default ceiling on local states in any one clique.
pub const DEFAULT_MAX_CLIQUE_STATES: usize = 1 << 16;

/// Default size up to which [`PartitionStrategy::Auto`] stays flat.
pub const DEFAULT_AUTO_FLAT_LIMIT: usize = 4096;

/// How the consistent state space is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PartitionStrategy {
    /// List every consistent state.
    Flat,
    /// Factorize into a clique forest.
    JunctionTree,
    /// Flat when the space has at most `auto_flat_limit` states, junction
    /// tree otherwise.
    #[default]
    Auto,
}

/// Enumeration settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnumerationConfig {
    pub strategy: PartitionStrategy,
    /// Ceiling for the flat strategy.
    pub max_states: usize,
    /// Ceiling for any one clique of the junction tree.
    pub max_clique_states: usize,
    /// Largest space `Auto` keeps flat.
    pub auto_flat_limit: usize,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            strategy: PartitionStrategy::Auto,
            max_states: DEFAULT_MAX_STATES,
            max_clique_states: DEFAULT_MAX_CLIQUE_STATES,
            auto_flat_limit: DEFAULT_AUTO_FLAT_LIMIT,
        }
    }
}

impl EnumerationConfig {
    pub fn with_strategy(strategy: PartitionStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn validate(self) -> Result<Self, GraphError> {
        if self.max_states == 0 {
            return Err(GraphError::Config(
                "enumeration: max_states must be > 0".into(),
            ));
        }
        if self.max_clique_states == 0 {
            return Err(GraphError::Config(
                "enumeration: max_clique_states must be > 0".into(),
            ));
        }
        if self.strategy == PartitionStrategy::Auto && self.auto_flat_limit > self.max_states {
            return Err(GraphError::Config(
                "enumeration: auto_flat_limit must not exceed max_states".into(),
            ));
        }
        Ok(self)
    }
}

/// Representation chosen for a built partition.
#[derive(Debug, Clone)]
pub enum PartitionKind {
    Flat(FlatStateSpace),
    JunctionTree(JunctionTree),
}

/// Summary of a built partition for logs and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PartitionSummary {
    pub labels: usize,
    pub strategy: &'static str,
    /// Consistent states, when listed flat.
    pub states: Option<usize>,
    pub junction_tree: Option<JunctionTreeStats>,
    pub dead_labels: Vec<u32>,
}

/// The consistent state space of a graph, built once and reused for every
/// example.
#[derive(Debug, Clone)]
pub struct StateSpacePartition {
    graph: Arc<LabelGraph>,
    kind: PartitionKind,
}

impl StateSpacePartition {
    /// Builds the partition for `graph` according to `config`.
    ///
    /// # Errors
    ///
    /// - [`GraphError::Config`] for invalid settings
    /// - [`GraphError::StateSpaceTooLarge`] when the chosen representation
    ///   exceeds its ceiling
    pub fn enumerate(
        graph: Arc<LabelGraph>,
        config: &EnumerationConfig,
    ) -> Result<Self, GraphError> {
        let config = config.validate()?;
        let kind = match config.strategy {
            PartitionStrategy::Flat => {
                PartitionKind::Flat(FlatStateSpace::enumerate(&graph, config.max_states)?)
            }
            PartitionStrategy::JunctionTree => {
                PartitionKind::JunctionTree(JunctionTree::build(&graph, config.max_clique_states)?)
            }
            PartitionStrategy::Auto => {
                match FlatStateSpace::enumerate(&graph, config.auto_flat_limit) {
                    Ok(space) => PartitionKind::Flat(space),
                    Err(GraphError::StateSpaceTooLarge { .. }) => PartitionKind::JunctionTree(
                        JunctionTree::build(&graph, config.max_clique_states)?,
                    ),
                    Err(other) => return Err(other),
                }
            }
        };

        let partition = Self { graph, kind };

        #[cfg(feature = "tracing")]
        {
            let summary = partition.summary();
            tracing::info!(
                labels = summary.labels,
                strategy = summary.strategy,
                states = ?summary.states,
                cliques = summary.junction_tree.map(|s| s.cliques),
                "state space partition built"
            );
        }

        Ok(partition)
    }

    pub fn graph(&self) -> &LabelGraph {
        &self.graph
    }

    pub fn shared_graph(&self) -> Arc<LabelGraph> {
        Arc::clone(&self.graph)
    }

    pub fn kind(&self) -> &PartitionKind {
        &self.kind
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.kind, PartitionKind::Flat(_))
    }

    /// The flat state list, if this partition is flat.
    pub fn flat(&self) -> Option<&FlatStateSpace> {
        match &self.kind {
            PartitionKind::Flat(space) => Some(space),
            PartitionKind::JunctionTree(_) => None,
        }
    }

    pub fn junction_tree(&self) -> Option<&JunctionTree> {
        match &self.kind {
            PartitionKind::Flat(_) => None,
            PartitionKind::JunctionTree(tree) => Some(tree),
        }
    }

    /// Whether `state` is one of the consistent states.
    pub fn contains(&self, state: &LabelState) -> bool {
        match &self.kind {
            PartitionKind::Flat(space) => space.state_index(state).is_some(),
            PartitionKind::JunctionTree(_) => self.graph.is_consistent(state),
        }
    }

    pub fn summary(&self) -> PartitionSummary {
        let (strategy, states, junction_tree) = match &self.kind {
            PartitionKind::Flat(space) => ("flat", Some(space.len()), None),
            PartitionKind::JunctionTree(tree) => ("junction_tree", None, Some(tree.stats())),
        };
        PartitionSummary {
            labels: self.graph.node_count(),
            strategy,
            states,
            junction_tree,
            dead_labels: self.graph.dead_labels().map(|id| id.0).collect(),
        }
    }
}
