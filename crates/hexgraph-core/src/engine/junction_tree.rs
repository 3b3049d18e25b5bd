//! # Junction Tree
//!
//! Exact inference over graphs whose full state space is too large to list.
//!
//! ## Construction
//!
//! 1. **Sparsify**: keep the transitive reduction of the hierarchy and drop
//!    every exclusion implied by an exclusion between ancestors-or-self. The
//!    consistent states are unchanged.
//! 2. **Eliminate**: min-degree elimination (lowest id on ties) over the
//!    sparse interaction graph, recording one clique per eliminated variable.
//! 3. **Connect**: each elimination clique attaches to the clique of the
//!    earliest-eliminated variable it shares; non-maximal cliques are
//!    contracted into the child that contains them.
//! 4. **Enumerate**: each clique lists its local consistent states with the
//!    same branch-and-bound search as the flat space, under the projected
//!    closure and exclusion masks.
//!
//! Every label's score is owned by exactly one clique (the lowest-numbered
//! clique containing it), so a two-pass sum-product over the tree yields the
//! partition function and all single-label marginals.
//!
//! Cliques are numbered breadth-first, so a parent always has a smaller id
//! than its children. The upward pass walks ids downwards; the downward pass
//! walks them upwards.

use rustc_hash::FxHashMap;

use crate::engine::errors::GraphError;
use crate::engine::graph::{LabelGraph, NodeId};
use crate::engine::label_state::LabelState;
use crate::engine::numeric::{log_sum_exp, LogAccumulator};
use crate::engine::state_space::enumerate_consistent;

/// Index of a clique within its [`JunctionTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CliqueId(pub u32);

impl CliqueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Variables shared between a clique and its parent, with per-state lookups.
#[derive(Debug, Clone)]
pub struct Separator {
    variables: Vec<u32>,
    len: usize,
    /// Separator assignment of each child-clique state.
    child_index: Vec<usize>,
    /// Separator assignment of each parent-clique state, `None` when no child
    /// state agrees with it.
    parent_index: Vec<Option<usize>>,
}

impl Separator {
    pub fn variables(&self) -> &[u32] {
        &self.variables
    }

    /// Number of distinct separator assignments.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A clique of the junction tree with its local state space.
#[derive(Debug, Clone)]
pub struct Clique {
    id: CliqueId,
    /// Global label ids, ascending. Local position `k` is `variables[k]`.
    variables: Vec<u32>,
    parent: Option<CliqueId>,
    children: Vec<CliqueId>,
    states: Vec<LabelState>,
    /// Labels whose scores this clique owns, ascending.
    owned: Vec<u32>,
    owned_offsets: Vec<usize>,
    /// Owned labels that are true in each local state (CSR by state).
    owned_members: Vec<u32>,
    separator: Option<Separator>,
}

impl Clique {
    pub fn id(&self) -> CliqueId {
        self.id
    }

    pub fn variables(&self) -> &[u32] {
        &self.variables
    }

    pub fn parent(&self) -> Option<CliqueId> {
        self.parent
    }

    pub fn children(&self) -> &[CliqueId] {
        &self.children
    }

    /// Local consistent states; bit `k` refers to `variables()[k]`.
    pub fn states(&self) -> &[LabelState] {
        &self.states
    }

    pub fn owned_labels(&self) -> &[u32] {
        &self.owned
    }

    pub fn separator(&self) -> Option<&Separator> {
        self.separator.as_ref()
    }

    pub fn contains(&self, label: u32) -> bool {
        self.variables.binary_search(&label).is_ok()
    }

    #[inline]
    fn log_potential(&self, state: usize, scores: &[f64]) -> f64 {
        self.owned_members[self.owned_offsets[state]..self.owned_offsets[state + 1]]
            .iter()
            .map(|&l| scores[l as usize])
            .sum()
    }
}

/// Size summary of a built junction tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct JunctionTreeStats {
    pub cliques: usize,
    pub roots: usize,
    /// Variables in the largest clique.
    pub max_clique_size: usize,
    /// Local states in the largest clique.
    pub max_clique_states: usize,
    /// Local states summed over all cliques.
    pub total_states: usize,
}

/// A calibrated-on-demand clique forest over a label graph.
#[derive(Debug, Clone)]
pub struct JunctionTree {
    node_count: usize,
    cliques: Vec<Clique>,
    /// Owning clique and local position of each label.
    owner: Vec<(CliqueId, usize)>,
}

/// Upward-pass results kept for the downward pass.
struct Upward {
    beliefs: Vec<Vec<f64>>,
    messages: Vec<Vec<f64>>,
    log_partition: f64,
}

impl JunctionTree {
    /// Builds the clique forest for `graph`, failing with
    /// [`GraphError::StateSpaceTooLarge`] if any clique has more than
    /// `max_clique_states` local states.
    pub fn build(graph: &LabelGraph, max_clique_states: usize) -> Result<Self, GraphError> {
        let n = graph.node_count();
        let (hierarchy, exclusion) = sparse_edges(graph);

        let mut adjacency = vec![LabelState::all_false(n); n];
        for &(a, b) in hierarchy.iter().chain(exclusion.iter()) {
            adjacency[a as usize].insert(b as usize);
            adjacency[b as usize].insert(a as usize);
        }

        let elimination = eliminate(adjacency);
        let skeleton = connect(&elimination, n);

        let mut cliques = Vec::with_capacity(skeleton.len());
        for (id, node) in skeleton.into_iter().enumerate() {
            let variables: Vec<u32> = node.variables.iter_true().map(|v| v as u32).collect();
            let positions: Vec<usize> = variables.iter().map(|&v| v as usize).collect();
            let ancestors: Vec<LabelState> = positions
                .iter()
                .map(|&v| graph.ancestor_masks()[v].project(&positions))
                .collect();
            let exclusions: Vec<LabelState> = positions
                .iter()
                .map(|&v| graph.exclusion_masks()[v].project(&positions))
                .collect();
            let states = enumerate_consistent(&ancestors, &exclusions, max_clique_states)
                .map_err(|overflow| GraphError::StateSpaceTooLarge {
                    scope: format!("clique {} ({} labels)", id, variables.len()),
                    limit: overflow.limit,
                })?;
            cliques.push(Clique {
                id: CliqueId(id as u32),
                variables,
                parent: node.parent.map(|p| CliqueId(p as u32)),
                children: node.children.iter().map(|&c| CliqueId(c as u32)).collect(),
                states,
                owned: Vec::new(),
                owned_offsets: Vec::new(),
                owned_members: Vec::new(),
                separator: None,
            });
        }

        // Cliques are in BFS order, so the first clique seen for a label is
        // its lowest-numbered container.
        let mut owner: Vec<Option<(CliqueId, usize)>> = vec![None; n];
        for clique in &mut cliques {
            for (k, &v) in clique.variables.iter().enumerate() {
                if owner[v as usize].is_none() {
                    owner[v as usize] = Some((clique.id, k));
                    clique.owned.push(v);
                }
            }
        }
        let owner: Vec<(CliqueId, usize)> = owner
            .into_iter()
            .enumerate()
            .map(|(v, o)| {
                o.ok_or_else(|| {
                    GraphError::Config(format!("label {v} is not covered by any clique"))
                })
            })
            .collect::<Result<_, _>>()?;

        for clique in &mut cliques {
            let owned_positions: Vec<(usize, u32)> = clique
                .owned
                .iter()
                .map(|&v| (position_of(&clique.variables, v), v))
                .collect();
            let mut offsets = Vec::with_capacity(clique.states.len() + 1);
            let mut members = Vec::new();
            offsets.push(0);
            for state in &clique.states {
                members.extend(
                    owned_positions
                        .iter()
                        .filter(|(k, _)| state.contains(*k))
                        .map(|&(_, v)| v),
                );
                offsets.push(members.len());
            }
            clique.owned_offsets = offsets;
            clique.owned_members = members;
        }

        for id in 0..cliques.len() {
            if let Some(parent) = cliques[id].parent {
                let separator = build_separator(&cliques[parent.index()], &cliques[id]);
                cliques[id].separator = Some(separator);
            }
        }

        let tree = Self {
            node_count: n,
            cliques,
            owner,
        };

        #[cfg(feature = "tracing")]
        {
            let stats = tree.stats();
            tracing::info!(
                labels = n,
                cliques = stats.cliques,
                roots = stats.roots,
                max_clique_size = stats.max_clique_size,
                max_clique_states = stats.max_clique_states,
                total_states = stats.total_states,
                "junction tree built"
            );
        }

        Ok(tree)
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn cliques(&self) -> &[Clique] {
        &self.cliques
    }

    pub fn clique(&self, id: CliqueId) -> Option<&Clique> {
        self.cliques.get(id.index())
    }

    /// Clique that owns the score of `label`.
    pub fn owner(&self, label: NodeId) -> Option<CliqueId> {
        self.owner.get(label.index()).map(|&(c, _)| c)
    }

    pub fn stats(&self) -> JunctionTreeStats {
        JunctionTreeStats {
            cliques: self.cliques.len(),
            roots: self.cliques.iter().filter(|c| c.parent.is_none()).count(),
            max_clique_size: self
                .cliques
                .iter()
                .map(|c| c.variables.len())
                .max()
                .unwrap_or(0),
            max_clique_states: self
                .cliques
                .iter()
                .map(|c| c.states.len())
                .max()
                .unwrap_or(0),
            total_states: self.cliques.iter().map(|c| c.states.len()).sum(),
        }
    }

    /// Log partition function restricted to states with `clamp` true (if
    /// given). Runs the upward pass only.
    pub(crate) fn log_partition(&self, scores: &[f64], clamp: Option<NodeId>) -> f64 {
        self.upward(scores, clamp).log_partition
    }

    /// Log partition function and single-label marginals, conditioned on
    /// `clamp` being true when given.
    ///
    /// When the clamped label has no consistent state the log partition is
    /// `-inf` and all marginals are zero.
    pub(crate) fn calibrate(&self, scores: &[f64], clamp: Option<NodeId>) -> (f64, Vec<f64>) {
        let Upward {
            mut beliefs,
            messages,
            log_partition,
        } = self.upward(scores, clamp);
        if log_partition == f64::NEG_INFINITY {
            return (log_partition, vec![0.0; self.node_count]);
        }

        for clique in &self.cliques {
            let (Some(parent), Some(separator)) = (clique.parent, clique.separator.as_ref())
            else {
                continue;
            };
            let message = &messages[clique.id.index()];
            let mut down = vec![LogAccumulator::new(); separator.len];
            for (t, slot) in separator.parent_index.iter().enumerate() {
                if let Some(i) = *slot {
                    if message[i] == f64::NEG_INFINITY {
                        continue;
                    }
                    down[i].push(beliefs[parent.index()][t] - message[i]);
                }
            }
            let down: Vec<f64> = down.iter().map(LogAccumulator::value).collect();
            for (s, belief) in beliefs[clique.id.index()].iter_mut().enumerate() {
                *belief += down[separator.child_index[s]];
            }
        }

        let totals: Vec<f64> = beliefs.iter().map(|b| log_sum_exp(b)).collect();
        let mut marginals = vec![0.0; self.node_count];
        for (label, &(clique_id, position)) in self.owner.iter().enumerate() {
            let clique = &self.cliques[clique_id.index()];
            let belief = &beliefs[clique_id.index()];
            let mut acc = LogAccumulator::new();
            for (s, state) in clique.states.iter().enumerate() {
                if state.contains(position) {
                    acc.push(belief[s]);
                }
            }
            marginals[label] = (acc.value() - totals[clique_id.index()]).exp().clamp(0.0, 1.0);
        }

        (log_partition, marginals)
    }

    fn upward(&self, scores: &[f64], clamp: Option<NodeId>) -> Upward {
        let mut beliefs: Vec<Vec<f64>> = self
            .cliques
            .iter()
            .map(|clique| {
                (0..clique.states.len())
                    .map(|s| clique.log_potential(s, scores))
                    .collect()
            })
            .collect();

        if let Some(label) = clamp {
            let (clique_id, position) = self.owner[label.index()];
            let clique = &self.cliques[clique_id.index()];
            for (s, state) in clique.states.iter().enumerate() {
                if !state.contains(position) {
                    beliefs[clique_id.index()][s] = f64::NEG_INFINITY;
                }
            }
        }

        let mut messages: Vec<Vec<f64>> = vec![Vec::new(); self.cliques.len()];
        let mut log_partition = 0.0;
        for clique in self.cliques.iter().rev() {
            let id = clique.id.index();
            let (Some(parent), Some(separator)) = (clique.parent, clique.separator.as_ref())
            else {
                log_partition += log_sum_exp(&beliefs[id]);
                continue;
            };
            let mut message = vec![LogAccumulator::new(); separator.len];
            for (s, &belief) in beliefs[id].iter().enumerate() {
                message[separator.child_index[s]].push(belief);
            }
            let message: Vec<f64> = message.iter().map(LogAccumulator::value).collect();
            for (t, slot) in separator.parent_index.iter().enumerate() {
                beliefs[parent.index()][t] += match *slot {
                    Some(i) => message[i],
                    None => f64::NEG_INFINITY,
                };
            }
            messages[id] = message;
        }

        Upward {
            beliefs,
            messages,
            log_partition,
        }
    }
}

/// Sparse constraint edges: `(child, parent)` hierarchy pairs of the
/// transitive reduction, and `(a, b)` exclusion pairs (`a < b`) not implied
/// by an exclusion between ancestors-or-self.
pub(crate) fn sparse_edges(graph: &LabelGraph) -> (Vec<(u32, u32)>, Vec<(u32, u32)>) {
    let ancestors = graph.ancestor_masks();
    let exclusions = graph.exclusion_masks();

    let mut hierarchy = Vec::new();
    for node in graph.nodes() {
        for &parent in &node.parents {
            let implied = node
                .parents
                .iter()
                .any(|&other| other != parent && ancestors[other.index()].contains(parent.index()));
            if !implied {
                hierarchy.push((node.id.0, parent.0));
            }
        }
    }

    let or_self = |v: usize| {
        let mut closed = ancestors[v].clone();
        closed.insert(v);
        closed
    };
    let mut exclusion = Vec::new();
    for (a, b) in graph.exclusion_edges() {
        let (a, b) = (a.index(), b.index());
        let above_a = or_self(a);
        let above_b = or_self(b);
        let implied = ancestors[a]
            .iter_true()
            .any(|x| exclusions[x].intersects(&above_b))
            || ancestors[b]
                .iter_true()
                .any(|y| exclusions[y].intersects(&above_a));
        if !implied {
            exclusion.push((a as u32, b as u32));
        }
    }

    (hierarchy, exclusion)
}

/// One elimination step: the eliminated vertex and its clique.
struct EliminationStep {
    vertex: usize,
    clique: LabelState,
}

/// Min-degree elimination, lowest id first on ties.
fn eliminate(mut adjacency: Vec<LabelState>) -> Vec<EliminationStep> {
    let n = adjacency.len();
    let mut remaining = LabelState::all_false(n);
    for v in 0..n {
        remaining.insert(v);
    }

    let mut steps = Vec::with_capacity(n);
    while !remaining.is_all_false() {
        let mut best: Option<(usize, usize)> = None;
        for v in remaining.iter_true() {
            let degree = adjacency[v].count_true();
            if best.map_or(true, |(_, d)| degree < d) {
                best = Some((v, degree));
            }
        }
        let Some((vertex, _)) = best else { break };

        let neighbors = adjacency[vertex].clone();
        for u in neighbors.iter_true() {
            adjacency[u].union_with(&neighbors);
            adjacency[u].remove(u);
            adjacency[u].remove(vertex);
        }
        remaining.remove(vertex);

        let mut clique = neighbors;
        clique.insert(vertex);
        steps.push(EliminationStep { vertex, clique });
    }
    steps
}

/// A clique of the connected forest, before local enumeration.
struct SkeletonNode {
    variables: LabelState,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Connects elimination cliques into a forest, contracts non-maximal
/// cliques, and renumbers breadth-first from the roots.
fn connect(steps: &[EliminationStep], n: usize) -> Vec<SkeletonNode> {
    let mut position = vec![0; n];
    for (i, step) in steps.iter().enumerate() {
        position[step.vertex] = i;
    }

    let mut parent: Vec<Option<usize>> = steps
        .iter()
        .map(|step| {
            step.clique
                .iter_true()
                .filter(|&u| u != step.vertex)
                .map(|u| position[u])
                .min()
        })
        .collect();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
    for (i, p) in parent.iter().enumerate() {
        if let Some(p) = *p {
            children[p].push(i);
        }
    }

    // Top-down so a merged child is examined after it takes its parent's place.
    let mut alive = vec![true; steps.len()];
    for i in (0..steps.len()).rev() {
        let absorbing = children[i]
            .iter()
            .copied()
            .find(|&c| steps[i].clique.is_subset(&steps[c].clique));
        let Some(c) = absorbing else { continue };

        alive[i] = false;
        parent[c] = parent[i];
        if let Some(p) = parent[i] {
            for slot in children[p].iter_mut() {
                if *slot == i {
                    *slot = c;
                }
            }
        }
        let adopted: Vec<usize> = children[i].drain(..).filter(|&o| o != c).collect();
        for &o in &adopted {
            parent[o] = Some(c);
        }
        children[c].extend(adopted);
    }

    let first_variable = |i: usize| steps[i].clique.iter_true().next().unwrap_or(usize::MAX);
    let mut roots: Vec<usize> = (0..steps.len())
        .filter(|&i| alive[i] && parent[i].is_none())
        .collect();
    roots.sort_by_key(|&i| (first_variable(i), i));

    let mut order: Vec<usize> = Vec::with_capacity(steps.len());
    let mut queue: std::collections::VecDeque<usize> = roots.into_iter().collect();
    while let Some(i) = queue.pop_front() {
        order.push(i);
        let mut kids = children[i].clone();
        kids.sort_by_key(|&c| (first_variable(c), c));
        queue.extend(kids);
    }

    let mut renumber = vec![usize::MAX; steps.len()];
    for (new, &old) in order.iter().enumerate() {
        renumber[old] = new;
    }
    order
        .iter()
        .map(|&old| {
            let mut kids: Vec<usize> = children[old].iter().map(|&c| renumber[c]).collect();
            kids.sort_unstable();
            SkeletonNode {
                variables: steps[old].clique.clone(),
                parent: parent[old].map(|p| renumber[p]),
                children: kids,
            }
        })
        .collect()
}

fn position_of(variables: &[u32], label: u32) -> usize {
    variables.binary_search(&label).unwrap_or(usize::MAX)
}

fn build_separator(parent: &Clique, child: &Clique) -> Separator {
    let variables: Vec<u32> = child
        .variables
        .iter()
        .copied()
        .filter(|&v| parent.contains(v))
        .collect();
    let child_positions: Vec<usize> = variables
        .iter()
        .map(|&v| position_of(&child.variables, v))
        .collect();
    let parent_positions: Vec<usize> = variables
        .iter()
        .map(|&v| position_of(&parent.variables, v))
        .collect();

    let mut index: FxHashMap<LabelState, usize> = FxHashMap::default();
    let child_index: Vec<usize> = child
        .states
        .iter()
        .map(|state| {
            let next = index.len();
            *index.entry(state.project(&child_positions)).or_insert(next)
        })
        .collect();
    let parent_index: Vec<Option<usize>> = parent
        .states
        .iter()
        .map(|state| index.get(&state.project(&parent_positions)).copied())
        .collect();

    Separator {
        variables,
        len: index.len(),
        child_index,
        parent_index,
    }
}
