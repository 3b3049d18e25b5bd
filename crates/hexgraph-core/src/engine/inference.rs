//! Exact inference over a [`StateSpacePartition`].
//!
//! A consistent state `y` has unnormalized potential
//! `exp(sum_i score[i] * y_i)`: true labels contribute `exp(score[i])` and
//! false labels contribute `1`. Under this convention a graph without edges
//! reduces to independent logistic units, and the all-false state always has
//! potential 1, so `Z >= 1`.
//!
//! All functions are stateless; the partition is shared read-only and every
//! call allocates its own scratch.

use crate::engine::errors::InferenceError;
use crate::engine::graph::NodeId;
use crate::engine::label_state::LabelState;
use crate::engine::numeric::LogAccumulator;
use crate::engine::partition::{PartitionKind, StateSpacePartition};
use crate::engine::state_space::FlatStateSpace;

/// Partition function and single-label marginals for one score vector.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Inference {
    /// `ln Z`.
    pub log_partition: f64,
    /// `P(label i is true)`.
    pub marginals: Vec<f64>,
}

impl Inference {
    /// `Z` itself; may overflow to infinity for large scores.
    pub fn partition_function(&self) -> f64 {
        self.log_partition.exp()
    }
}

/// Loss and its gradient with respect to the scores.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LossAndGradient {
    pub loss: f64,
    pub gradient: Vec<f64>,
    /// Unconditioned inference the loss was computed from.
    pub inference: Inference,
}

/// Training objective for an integer label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LossMode {
    /// Negative log-likelihood of the label's canonical state (the label and
    /// its ancestors true, everything else false).
    #[default]
    Joint,
    /// Negative log of `P(label is true)`, summing over every consistent
    /// state that asserts the label.
    Marginal,
}

/// Checks score length and finiteness, including the extreme state sums.
pub fn validate_scores(
    partition: &StateSpacePartition,
    scores: &[f64],
) -> Result<(), InferenceError> {
    let expected = partition.node_count();
    if scores.len() != expected {
        return Err(InferenceError::ScoreLength {
            expected,
            found: scores.len(),
        });
    }
    if let Some((index, &value)) = scores.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(InferenceError::NonFiniteScore { index, value });
    }
    // Every log potential lies between these two sums.
    let positive: f64 = scores.iter().filter(|s| **s > 0.0).sum();
    if !positive.is_finite() {
        return Err(InferenceError::ScoreOverflow { sign: "positive" });
    }
    let negative: f64 = scores.iter().filter(|s| **s < 0.0).sum();
    if !negative.is_finite() {
        return Err(InferenceError::ScoreOverflow { sign: "negative" });
    }
    Ok(())
}

/// `ln Z` only. Cheaper than [`infer`] on the junction tree.
pub fn log_partition(
    partition: &StateSpacePartition,
    scores: &[f64],
) -> Result<f64, InferenceError> {
    validate_scores(partition, scores)?;
    Ok(match partition.kind() {
        PartitionKind::Flat(space) => flat_log_partition(space, scores, None),
        PartitionKind::JunctionTree(tree) => tree.log_partition(scores, None),
    })
}

/// Partition function and marginals.
pub fn infer(
    partition: &StateSpacePartition,
    scores: &[f64],
) -> Result<Inference, InferenceError> {
    validate_scores(partition, scores)?;
    Ok(run(partition, scores, None))
}

/// Inference restricted to the states where `clamp` is true.
///
/// `log_partition` is then `ln Z_{y_clamp = 1}` and the marginals are
/// conditional on the clamped label.
///
/// # Errors
///
/// [`InferenceError::InconsistentLabel`] if no consistent state asserts
/// `clamp` (a dead label).
pub fn infer_conditioned(
    partition: &StateSpacePartition,
    scores: &[f64],
    clamp: NodeId,
) -> Result<Inference, InferenceError> {
    validate_scores(partition, scores)?;
    let canonical = partition.graph().label_state(i64::from(clamp.0))?;
    let inference = run(partition, scores, Some(clamp));
    if inference.log_partition == f64::NEG_INFINITY {
        return Err(InferenceError::InconsistentLabel {
            state: canonical.to_string(),
        });
    }
    Ok(inference)
}

/// Joint negative log-likelihood of `ground_truth`:
/// `ln Z - sum_i score[i] * g_i`, with gradient `marginal - g`.
///
/// # Errors
///
/// [`InferenceError::InconsistentLabel`] if `ground_truth` is not one of the
/// consistent states.
pub fn loss_and_gradient(
    partition: &StateSpacePartition,
    scores: &[f64],
    ground_truth: &LabelState,
) -> Result<LossAndGradient, InferenceError> {
    validate_scores(partition, scores)?;
    if ground_truth.len() != partition.node_count() || !partition.contains(ground_truth) {
        return Err(InferenceError::InconsistentLabel {
            state: ground_truth.to_string(),
        });
    }

    let inference = run(partition, scores, None);
    let observed: f64 = ground_truth.iter_true().map(|i| scores[i]).sum();
    let gradient = inference
        .marginals
        .iter()
        .enumerate()
        .map(|(i, &m)| if ground_truth.contains(i) { m - 1.0 } else { m })
        .collect();

    Ok(LossAndGradient {
        loss: inference.log_partition - observed,
        gradient,
        inference,
    })
}

/// Marginal negative log-likelihood of `label` being true:
/// `ln Z - ln Z_{y_label = 1}`, with gradient
/// `P(y_i = 1) - P(y_i = 1 | y_label = 1)`.
///
/// # Errors
///
/// [`InferenceError::InconsistentLabel`] for a dead label.
pub fn marginal_loss_and_gradient(
    partition: &StateSpacePartition,
    scores: &[f64],
    label: NodeId,
) -> Result<LossAndGradient, InferenceError> {
    let conditioned = infer_conditioned(partition, scores, label)?;
    let inference = run(partition, scores, None);
    let gradient = inference
        .marginals
        .iter()
        .zip(conditioned.marginals.iter())
        .map(|(&m, &c)| m - c)
        .collect();

    Ok(LossAndGradient {
        loss: inference.log_partition - conditioned.log_partition,
        gradient,
        inference,
    })
}

/// Loss for an integer training label under `mode`.
///
/// # Errors
///
/// - [`InferenceError::LabelOutOfRange`] if `label` does not address a node
/// - [`InferenceError::InconsistentLabel`] if the label cannot be asserted
pub fn label_loss_and_gradient(
    partition: &StateSpacePartition,
    scores: &[f64],
    label: i64,
    mode: LossMode,
) -> Result<LossAndGradient, InferenceError> {
    let canonical = partition.graph().label_state(label)?;
    match mode {
        LossMode::Joint => loss_and_gradient(partition, scores, &canonical),
        LossMode::Marginal => marginal_loss_and_gradient(partition, scores, NodeId(label as u32)),
    }
}

fn run(partition: &StateSpacePartition, scores: &[f64], clamp: Option<NodeId>) -> Inference {
    let (log_partition, marginals) = match partition.kind() {
        PartitionKind::Flat(space) => flat_calibrate(space, scores, clamp),
        PartitionKind::JunctionTree(tree) => tree.calibrate(scores, clamp),
    };
    Inference {
        log_partition,
        marginals,
    }
}

fn flat_admits(space: &FlatStateSpace, state: usize, clamp: Option<NodeId>) -> bool {
    match clamp {
        Some(label) => space.true_labels(state).binary_search(&label.0).is_ok(),
        None => true,
    }
}

fn flat_log_partition(space: &FlatStateSpace, scores: &[f64], clamp: Option<NodeId>) -> f64 {
    let mut acc = LogAccumulator::new();
    for state in 0..space.len() {
        if flat_admits(space, state, clamp) {
            acc.push(space.log_potential(state, scores));
        }
    }
    acc.value()
}

fn flat_calibrate(
    space: &FlatStateSpace,
    scores: &[f64],
    clamp: Option<NodeId>,
) -> (f64, Vec<f64>) {
    let log_potentials: Vec<f64> = (0..space.len())
        .map(|state| {
            if flat_admits(space, state, clamp) {
                space.log_potential(state, scores)
            } else {
                f64::NEG_INFINITY
            }
        })
        .collect();
    let log_z = crate::engine::numeric::log_sum_exp(&log_potentials);

    let mut marginals = vec![0.0; space.node_count()];
    if log_z == f64::NEG_INFINITY {
        return (log_z, marginals);
    }
    for (state, &lp) in log_potentials.iter().enumerate() {
        if lp == f64::NEG_INFINITY {
            continue;
        }
        let p = (lp - log_z).exp();
        for &label in space.true_labels(state) {
            marginals[label as usize] += p;
        }
    }
    for m in &mut marginals {
        *m = m.clamp(0.0, 1.0);
    }
    (log_z, marginals)
}
