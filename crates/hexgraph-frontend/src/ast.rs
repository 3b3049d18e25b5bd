//! Parsed representation of graph sources and label tables.
//!
//! These types carry raw label indices exactly as written in the source;
//! range checks against a node count happen in [`crate::validate`] and again
//! when the core builds its label graph.

use crate::errors::SourcePosition;

/// A directed "is-a" edge: asserting `child` asserts `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyEdge {
    pub child: u32,
    pub parent: u32,
    pub position: SourcePosition,
}

/// An undirected mutual-exclusion edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionEdge {
    pub a: u32,
    pub b: u32,
    pub position: SourcePosition,
}

/// Contents of a graph source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSource {
    /// Label count from a `nodes` statement, if the file declares one.
    pub declared_nodes: Option<u32>,
    pub hierarchy: Vec<HierarchyEdge>,
    pub exclusion: Vec<ExclusionEdge>,
}

impl GraphSource {
    /// Hierarchy edges as `(child, parent)` pairs.
    pub fn hierarchy_pairs(&self) -> Vec<(u32, u32)> {
        self.hierarchy.iter().map(|e| (e.child, e.parent)).collect()
    }

    /// Exclusion edges as `(a, b)` pairs.
    pub fn exclusion_pairs(&self) -> Vec<(u32, u32)> {
        self.exclusion.iter().map(|e| (e.a, e.b)).collect()
    }

    /// Smallest node count that covers every index mentioned in the source.
    pub fn implied_node_count(&self) -> u32 {
        let from_hierarchy = self
            .hierarchy
            .iter()
            .map(|e| e.child.max(e.parent).saturating_add(1));
        let from_exclusion = self
            .exclusion
            .iter()
            .map(|e| e.a.max(e.b).saturating_add(1));
        from_hierarchy
            .chain(from_exclusion)
            .chain(self.declared_nodes)
            .max()
            .unwrap_or(0)
    }
}

/// Label names in index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    pub names: Vec<String>,
}

impl LabelTable {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
