//! # Label Graph
//!
//! Immutable HEX graph over `N` binary labels.
//!
//! ## Key Components
//!
//! - **LabelNode**: a label with its direct parents ("is-a" hierarchy edges)
//!   and direct exclusion peers
//! - **LabelGraph**: the ordered node collection plus cached transitive closure
//!   of the hierarchy (ancestor and descendant bitsets) and symmetric
//!   exclusion masks
//!
//! ## Design
//!
//! - Hierarchy edges must form a DAG; a Kahn topological pass both orders the
//!   nodes and detects cycles
//! - Ancestor sets are stored as [`LabelState`] bitsets so "is `a` an ancestor
//!   of `b`" is a single bit test
//! - The graph is built once and shared read-only (`Arc<LabelGraph>`) by the
//!   state-space partition and every inference call
//!
//! ## Example
//!
//! ```rust,ignore
//! use hexgraph_core::engine::graph::LabelGraph;
//!
//! // animal(0) <- dog(1), animal(0) <- cat(2), dog and cat exclusive
//! let graph = LabelGraph::build(&[(1, 0), (2, 0)], &[(1, 2)], &[], 3)?;
//! assert!(graph.is_ancestor(0.into(), 1.into()));
//! ```

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use hexgraph_frontend::{GraphSource, LabelTable};
use smallvec::SmallVec;

use crate::engine::errors::{GraphError, InferenceError};
use crate::engine::label_state::LabelState;

/// Inline capacity for per-node adjacency lists.
const INLINE_ADJACENCY: usize = 4;

/// Identifier of a label node; equal to its index in the graph.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        NodeId(value)
    }
}

/// A label with its direct hierarchy and exclusion relations.
#[derive(Debug, Clone)]
pub struct LabelNode {
    pub id: NodeId,
    pub name: Arc<str>,
    /// Direct parents, ascending.
    pub parents: SmallVec<[NodeId; INLINE_ADJACENCY]>,
    /// Direct exclusion peers, ascending.
    pub exclusions: SmallVec<[NodeId; INLINE_ADJACENCY]>,
}

/// Immutable hierarchy-and-exclusion graph with cached closures.
#[derive(Debug, Clone)]
pub struct LabelGraph {
    nodes: Vec<LabelNode>,
    children: Vec<SmallVec<[NodeId; INLINE_ADJACENCY]>>,
    /// Strict ancestors of each node.
    ancestors: Vec<LabelState>,
    /// Strict descendants of each node.
    descendants: Vec<LabelState>,
    /// Direct exclusion peers of each node as a mask.
    exclusion_masks: Vec<LabelState>,
    /// Parents-first topological order.
    topo_order: Vec<NodeId>,
    /// Labels that are false in every consistent state.
    dead: LabelState,
}

impl LabelGraph {
    /// Builds a label graph from `(child, parent)` hierarchy pairs and `(a, b)`
    /// exclusion pairs over `node_count` labels.
    ///
    /// `label_names` may be empty, in which case labels are named `label_<i>`.
    ///
    /// # Errors
    ///
    /// - [`GraphError::OutOfRange`] for an id `>= node_count`
    /// - [`GraphError::Cycle`] if the hierarchy is not a DAG
    /// - [`GraphError::SelfExclusion`] for an `(a, a)` exclusion pair
    /// - [`GraphError::LabelCount`] if names are given but their count differs
    pub fn build(
        hierarchy: &[(u32, u32)],
        exclusion: &[(u32, u32)],
        label_names: &[String],
        node_count: usize,
    ) -> Result<Self, GraphError> {
        if !label_names.is_empty() && label_names.len() != node_count {
            return Err(GraphError::LabelCount {
                expected: node_count,
                found: label_names.len(),
            });
        }

        let check = |id: u32| -> Result<usize, GraphError> {
            let idx = id as usize;
            if idx >= node_count {
                Err(GraphError::OutOfRange { id, node_count })
            } else {
                Ok(idx)
            }
        };

        let mut nodes: Vec<LabelNode> = (0..node_count)
            .map(|i| LabelNode {
                id: NodeId(i as u32),
                name: match label_names.get(i) {
                    Some(name) => Arc::from(name.as_str()),
                    None => Arc::from(format!("label_{}", i)),
                },
                parents: SmallVec::new(),
                exclusions: SmallVec::new(),
            })
            .collect();
        let mut children: Vec<SmallVec<[NodeId; INLINE_ADJACENCY]>> =
            vec![SmallVec::new(); node_count];

        for &(child, parent) in hierarchy {
            let c = check(child)?;
            let p = check(parent)?;
            if c == p {
                return Err(GraphError::Cycle { node: child });
            }
            nodes[c].parents.push(NodeId(parent));
            children[p].push(NodeId(child));
        }

        let mut exclusion_masks = vec![LabelState::all_false(node_count); node_count];
        for &(a, b) in exclusion {
            let ia = check(a)?;
            let ib = check(b)?;
            if ia == ib {
                return Err(GraphError::SelfExclusion { node: a });
            }
            nodes[ia].exclusions.push(NodeId(b));
            nodes[ib].exclusions.push(NodeId(a));
            exclusion_masks[ia].insert(ib);
            exclusion_masks[ib].insert(ia);
        }

        for node in &mut nodes {
            node.parents.sort_unstable();
            node.parents.dedup();
            node.exclusions.sort_unstable();
            node.exclusions.dedup();
        }
        for list in &mut children {
            list.sort_unstable();
            list.dedup();
        }

        let topo_order = topological_order(&nodes, &children)?;

        let mut ancestors = vec![LabelState::all_false(node_count); node_count];
        for &id in &topo_order {
            let mut closure = LabelState::all_false(node_count);
            for &parent in &nodes[id.index()].parents {
                closure.union_with(&ancestors[parent.index()]);
                closure.insert(parent.index());
            }
            ancestors[id.index()] = closure;
        }

        let mut descendants = vec![LabelState::all_false(node_count); node_count];
        for &id in topo_order.iter().rev() {
            let mut closure = LabelState::all_false(node_count);
            for &child in &children[id.index()] {
                closure.union_with(&descendants[child.index()]);
                closure.insert(child.index());
            }
            descendants[id.index()] = closure;
        }

        let mut dead = LabelState::all_false(node_count);
        for i in 0..node_count {
            let mut closed = ancestors[i].clone();
            closed.insert(i);
            if closed.iter_true().any(|u| exclusion_masks[u].intersects(&closed)) {
                dead.insert(i);
            }
        }

        let graph = Self {
            nodes,
            children,
            ancestors,
            descendants,
            exclusion_masks,
            topo_order,
            dead,
        };

        #[cfg(feature = "tracing")]
        {
            tracing::info!(
                labels = graph.node_count(),
                hierarchy_edges = graph.hierarchy_edge_count(),
                exclusion_edges = graph.exclusion_edge_count(),
                "label graph built"
            );
            for id in graph.dead_labels() {
                tracing::warn!(
                    label = id.0,
                    name = %graph.nodes[id.index()].name,
                    "label can never be asserted: its ancestors are mutually exclusive"
                );
            }
        }

        Ok(graph)
    }

    /// Builds a label graph from parsed frontend sources.
    pub fn from_source(
        source: &GraphSource,
        labels: &LabelTable,
        node_count: usize,
    ) -> Result<Self, GraphError> {
        Self::build(
            &source.hierarchy_pairs(),
            &source.exclusion_pairs(),
            &labels.names,
            node_count,
        )
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[LabelNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&LabelNode> {
        self.nodes.get(id.index())
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.name.as_ref())
    }

    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].parents
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.children[id.index()]
    }

    pub fn exclusions(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].exclusions
    }

    /// Strict ancestors of `id`.
    pub fn ancestors(&self, id: NodeId) -> &LabelState {
        &self.ancestors[id.index()]
    }

    /// Strict descendants of `id`.
    pub fn descendants(&self, id: NodeId) -> &LabelState {
        &self.descendants[id.index()]
    }

    /// Direct exclusion peers of `id` as a mask.
    pub fn exclusion_mask(&self, id: NodeId) -> &LabelState {
        &self.exclusion_masks[id.index()]
    }

    pub(crate) fn ancestor_masks(&self) -> &[LabelState] {
        &self.ancestors
    }

    pub(crate) fn exclusion_masks(&self) -> &[LabelState] {
        &self.exclusion_masks
    }

    /// Whether `ancestor` is a strict ancestor of `node`.
    #[inline]
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors[node.index()].contains(ancestor.index())
    }

    /// Whether `a` and `b` share a direct exclusion edge.
    #[inline]
    pub fn excludes(&self, a: NodeId, b: NodeId) -> bool {
        self.exclusion_masks[a.index()].contains(b.index())
    }

    /// Parents-first topological order of the hierarchy.
    pub fn topological_order(&self) -> &[NodeId] {
        &self.topo_order
    }

    /// Hierarchy edges as `(child, parent)` pairs, ordered by child then parent.
    pub fn hierarchy_edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes
            .iter()
            .flat_map(|n| n.parents.iter().map(move |&p| (n.id, p)))
    }

    /// Exclusion edges as `(a, b)` pairs with `a < b`.
    pub fn exclusion_edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes.iter().flat_map(|n| {
            n.exclusions
                .iter()
                .filter(move |&&peer| peer > n.id)
                .map(move |&peer| (n.id, peer))
        })
    }

    pub fn hierarchy_edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.parents.len()).sum()
    }

    pub fn exclusion_edge_count(&self) -> usize {
        self.exclusion_edges().count()
    }

    /// Labels that are false in every consistent state.
    pub fn dead_labels(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.dead.iter_true().map(|i| NodeId(i as u32))
    }

    pub fn is_dead(&self, id: NodeId) -> bool {
        self.dead.contains(id.index())
    }

    /// Whether `state` satisfies hierarchy implication and exclusion.
    pub fn is_consistent(&self, state: &LabelState) -> bool {
        if state.len() != self.node_count() {
            return false;
        }
        state.iter_true().all(|i| {
            self.ancestors[i].is_subset(state) && !self.exclusion_masks[i].intersects(state)
        })
    }

    /// Canonical state for an integer training label: the label and all of
    /// its ancestors true, everything else false.
    ///
    /// The result is not checked for consistency; a dead label yields an
    /// inconsistent state.
    pub fn label_state(&self, label: i64) -> Result<LabelState, InferenceError> {
        if label < 0 || label as u64 >= self.node_count() as u64 {
            return Err(InferenceError::LabelOutOfRange {
                label,
                node_count: self.node_count(),
            });
        }
        let idx = label as usize;
        let mut state = self.ancestors[idx].clone();
        state.insert(idx);
        Ok(state)
    }
}

/// Kahn's algorithm over child -> parent edges, smallest ready id first.
fn topological_order(
    nodes: &[LabelNode],
    children: &[SmallVec<[NodeId; INLINE_ADJACENCY]>],
) -> Result<Vec<NodeId>, GraphError> {
    let mut pending_parents: Vec<usize> = nodes.iter().map(|n| n.parents.len()).collect();
    let mut ready: BinaryHeap<Reverse<NodeId>> = nodes
        .iter()
        .filter(|n| n.parents.is_empty())
        .map(|n| Reverse(n.id))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for &child in &children[id.index()] {
            pending_parents[child.index()] -= 1;
            if pending_parents[child.index()] == 0 {
                ready.push(Reverse(child));
            }
        }
    }

    if order.len() == nodes.len() {
        return Ok(order);
    }

    // Every unplaced node keeps at least one unplaced parent, so walking
    // parents from any of them must revisit a node on a cycle.
    let mut visited = vec![false; nodes.len()];
    let mut current = pending_parents
        .iter()
        .position(|&p| p > 0)
        .ok_or_else(|| GraphError::Config("topological sort lost track of a cycle".into()))?;
    while !visited[current] {
        visited[current] = true;
        current = nodes[current]
            .parents
            .iter()
            .map(|p| p.index())
            .find(|&p| pending_parents[p] > 0)
            .ok_or_else(|| {
                GraphError::Config("topological sort lost track of a cycle".into())
            })?;
    }
    Err(GraphError::Cycle {
        node: current as u32,
    })
}
