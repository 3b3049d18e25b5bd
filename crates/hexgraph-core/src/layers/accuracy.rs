//! HEX accuracy layer: top-k accuracy of the label marginals.
//!
//! Labels are ranked by marginal, highest first; equal marginals rank the
//! higher label index first. An example is correct when its label is among
//! the first `top_k`.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::engine::errors::{HexError, HexResult};
use crate::engine::graph::LabelGraph;
use crate::engine::inference::infer;
use crate::engine::partition::StateSpacePartition;
use crate::layers::blob::Blob;
use crate::layers::config::HexAccuracyConfig;
use crate::layers::{check_shapes, label_value, map_examples};
use crate::loader::load_label_graph;

/// Result of one accuracy pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AccuracyOutput {
    /// Fraction of counted examples that were correct; 0 when none counted.
    pub accuracy: f64,
    /// Accuracy per label over the examples carrying it; 0 for labels with
    /// no examples. Present only when per-class output is enabled.
    pub per_class: Option<Vec<f64>>,
    /// Examples that were not ignored.
    pub counted: usize,
}

#[derive(Debug, Clone)]
pub struct HexAccuracyLayer {
    partition: Arc<StateSpacePartition>,
    top_k: usize,
    ignore_label: Option<i64>,
    per_class: bool,
}

impl HexAccuracyLayer {
    pub fn configure(config: HexAccuracyConfig) -> HexResult<Self> {
        config.validate()?;
        let graph = load_label_graph(&config.graph)?;
        Self::configure_with_graph(graph, &config)
    }

    /// Configures the layer on an already built graph; `config.graph` is
    /// ignored.
    pub fn configure_with_graph(
        graph: Arc<LabelGraph>,
        config: &HexAccuracyConfig,
    ) -> HexResult<Self> {
        config.validate_settings(graph.node_count())?;
        let partition = StateSpacePartition::enumerate(graph, &config.enumeration)?;
        Self::from_partition(Arc::new(partition), config)
    }

    /// Shares a partition already built for another layer.
    pub fn from_partition(
        partition: Arc<StateSpacePartition>,
        config: &HexAccuracyConfig,
    ) -> HexResult<Self> {
        config.validate_settings(partition.node_count())?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            layer = "HexAccuracy",
            labels = partition.node_count(),
            top_k = config.top_k,
            ignore_label = ?config.ignore_label,
            "layer configured"
        );

        Ok(Self {
            partition,
            top_k: config.top_k,
            ignore_label: config.ignore_label,
            per_class: config.per_class,
        })
    }

    pub fn partition(&self) -> &Arc<StateSpacePartition> {
        &self.partition
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// # Errors
    ///
    /// - [`HexError::Shape`] for mismatched blobs
    /// - [`HexError::Label`] for a label that is neither ignored nor in range
    pub fn forward(&self, scores: &Blob, labels: &Blob) -> HexResult<AccuracyOutput> {
        let node_count = self.partition.node_count();
        let count = check_shapes(scores, labels, node_count)?;
        let inner = scores.inner();
        let partition = self.partition.as_ref();

        let outcomes = map_examples(count, |e| {
            let label = label_value(labels.data()[e])?;
            if self.ignore_label == Some(label) {
                return Ok(None);
            }
            if label < 0 || label as u64 >= node_count as u64 {
                return Err(HexError::Label(format!(
                    "label {label} is out of range for {node_count} labels"
                )));
            }
            let label = label as usize;
            let marginals = infer(partition, &scores.gather(e / inner, e % inner))?.marginals;
            Ok(Some((label, in_top_k(&marginals, label, self.top_k))))
        })?;

        let mut correct = 0usize;
        let mut counted = 0usize;
        let mut class_correct = vec![0usize; node_count];
        let mut class_total = vec![0usize; node_count];
        for (label, hit) in outcomes.into_iter().flatten() {
            counted += 1;
            class_total[label] += 1;
            if hit {
                correct += 1;
                class_correct[label] += 1;
            }
        }

        let accuracy = if counted == 0 {
            0.0
        } else {
            correct as f64 / counted as f64
        };
        let per_class = self.per_class.then(|| {
            class_correct
                .iter()
                .zip(class_total.iter())
                .map(|(&c, &t)| if t == 0 { 0.0 } else { c as f64 / t as f64 })
                .collect()
        });

        Ok(AccuracyOutput {
            accuracy,
            per_class,
            counted,
        })
    }
}

/// Ranking order: higher value first, then higher index.
fn outranks(values: &[f64], a: usize, b: usize) -> bool {
    match values[a].total_cmp(&values[b]) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => a > b,
    }
}

/// Whether `target` is among the `k` highest-ranked labels.
pub fn in_top_k(values: &[f64], target: usize, k: usize) -> bool {
    let ahead = (0..values.len())
        .filter(|&i| i != target && outranks(values, i, target))
        .count();
    ahead < k
}

/// The `k` highest-ranked labels, best first.
pub fn rank_top_k(values: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .total_cmp(&values[a])
            .then_with(|| b.cmp(&a))
    });
    order.truncate(k);
    order
}
