//! Branch-and-bound enumeration of consistent label states.
//!
//! The search walks labels in ascending index order, trying "false" before
//! "true". Asserting a label asserts its whole ancestor set at once; a branch
//! is pruned as soon as that expansion touches a label already decided false
//! or creates an exclusion violation. Any surviving partial assignment
//! extends to at least one full state (fill the rest with false), so the
//! search visits at most `N` nodes per emitted state.
//!
//! The same routine enumerates the full space for [`FlatStateSpace`] and the
//! clique-local spaces of the junction tree.

use rustc_hash::FxHashMap;

use crate::engine::errors::GraphError;
use crate::engine::graph::LabelGraph;
use crate::engine::label_state::LabelState;

/// Enumeration stopped because more than `limit` states exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EnumerationOverflow {
    pub limit: usize,
}

/// Enumerates every assignment over `ancestors.len()` variables that is closed
/// under `ancestors` (strict, transitively closed) and free of `exclusions`
/// pairs. States come out in stable order with the all-false state first.
pub(crate) fn enumerate_consistent(
    ancestors: &[LabelState],
    exclusions: &[LabelState],
    limit: usize,
) -> Result<Vec<LabelState>, EnumerationOverflow> {
    let n = ancestors.len();
    debug_assert_eq!(exclusions.len(), n);

    let mut states = Vec::new();
    let mut stack: Vec<(usize, LabelState)> = vec![(0, LabelState::all_false(n))];

    while let Some((mut position, asserted)) = stack.pop() {
        // Labels already forced true by a descendant have no false branch.
        while position < n && asserted.contains(position) {
            position += 1;
        }
        if position == n {
            if states.len() == limit {
                return Err(EnumerationOverflow { limit });
            }
            states.push(asserted);
            continue;
        }

        // Pushed first so the false branch is explored first.
        if let Some(expanded) = try_assert(position, &asserted, ancestors, exclusions) {
            stack.push((position + 1, expanded));
        }
        stack.push((position + 1, asserted));
    }

    Ok(states)
}

/// Asserts `label` plus its ancestors on top of `asserted`, or `None` if that
/// conflicts with an earlier false decision or an exclusion.
fn try_assert(
    label: usize,
    asserted: &LabelState,
    ancestors: &[LabelState],
    exclusions: &[LabelState],
) -> Option<LabelState> {
    let mut closure = ancestors[label].clone();
    closure.insert(label);

    let added = closure.difference(asserted);
    if added.iter_true().any(|a| a < label) {
        return None;
    }

    let mut expanded = asserted.clone();
    expanded.union_with(&closure);
    if added.iter_true().any(|k| exclusions[k].intersects(&expanded)) {
        return None;
    }
    Some(expanded)
}

/// Flat enumeration of every consistent state of a label graph.
///
/// States are stored once, in enumeration order, together with a CSR arena
/// of their true labels so per-example scoring is a contiguous gather.
#[derive(Debug, Clone)]
pub struct FlatStateSpace {
    node_count: usize,
    states: Vec<LabelState>,
    offsets: Vec<usize>,
    members: Vec<u32>,
    index: FxHashMap<LabelState, usize>,
}

impl FlatStateSpace {
    /// Enumerates the consistent states of `graph`, failing with
    /// [`GraphError::StateSpaceTooLarge`] beyond `limit` states.
    pub fn enumerate(graph: &LabelGraph, limit: usize) -> Result<Self, GraphError> {
        let states = enumerate_consistent(graph.ancestor_masks(), graph.exclusion_masks(), limit)
            .map_err(|overflow| GraphError::StateSpaceTooLarge {
                scope: format!("the {}-label graph", graph.node_count()),
                limit: overflow.limit,
            })?;
        Ok(Self::from_states(graph.node_count(), states))
    }

    fn from_states(node_count: usize, states: Vec<LabelState>) -> Self {
        let mut offsets = Vec::with_capacity(states.len() + 1);
        let mut members = Vec::new();
        let mut index = FxHashMap::default();
        offsets.push(0);
        for (i, state) in states.iter().enumerate() {
            members.extend(state.iter_true().map(|l| l as u32));
            offsets.push(members.len());
            index.insert(state.clone(), i);
        }
        Self {
            node_count,
            states,
            offsets,
            members,
            index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of consistent states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always false: the all-false state is always consistent.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[LabelState] {
        &self.states
    }

    pub fn state(&self, index: usize) -> Option<&LabelState> {
        self.states.get(index)
    }

    /// Position of `state` in enumeration order.
    pub fn state_index(&self, state: &LabelState) -> Option<usize> {
        self.index.get(state).copied()
    }

    /// True labels of the state at `index`, ascending.
    #[inline]
    pub fn true_labels(&self, index: usize) -> &[u32] {
        &self.members[self.offsets[index]..self.offsets[index + 1]]
    }

    /// Log of the unnormalized potential of the state at `index`.
    #[inline]
    pub fn log_potential(&self, index: usize, scores: &[f64]) -> f64 {
        self.true_labels(index)
            .iter()
            .map(|&l| scores[l as usize])
            .sum()
    }
}
