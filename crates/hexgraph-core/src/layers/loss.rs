//! HEX loss layer: mean negative log-likelihood over a batch and its
//! gradient.
//!
//! The layer exists only in its configured state. `forward` caches the
//! per-example gradients; the following `backward` consumes them, so each
//! forward permits exactly one backward.

use std::sync::Arc;

use crate::engine::errors::{HexError, HexResult};
use crate::engine::graph::LabelGraph;
use crate::engine::inference::{label_loss_and_gradient, LossMode};
use crate::engine::partition::StateSpacePartition;
use crate::layers::blob::Blob;
use crate::layers::config::HexLossConfig;
use crate::layers::{check_shapes, label_value, map_examples};
use crate::loader::load_label_graph;

const LAYER_NAME: &str = "HexLoss";

/// Gradients from the last forward pass.
#[derive(Debug, Clone)]
struct ForwardCache {
    shape: [usize; 4],
    /// One gradient per example, in `n * inner + j` order.
    gradients: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct HexLossLayer {
    partition: Arc<StateSpacePartition>,
    mode: LossMode,
    cache: Option<ForwardCache>,
}

impl HexLossLayer {
    /// Loads the graph named by `config`, enumerates its state space, and
    /// returns the configured layer.
    pub fn configure(config: HexLossConfig) -> HexResult<Self> {
        config.validate()?;
        let graph = load_label_graph(&config.graph)?;
        Self::configure_with_graph(graph, &config)
    }

    /// Configures the layer on an already built graph; `config.graph` is
    /// ignored.
    pub fn configure_with_graph(graph: Arc<LabelGraph>, config: &HexLossConfig) -> HexResult<Self> {
        config.validate_settings()?;
        let partition = StateSpacePartition::enumerate(graph, &config.enumeration)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            layer = LAYER_NAME,
            labels = partition.node_count(),
            mode = ?config.mode,
            "layer configured"
        );

        Ok(Self::from_partition(Arc::new(partition), config.mode))
    }

    /// Shares a partition already built for another layer.
    pub fn from_partition(partition: Arc<StateSpacePartition>, mode: LossMode) -> Self {
        Self {
            partition,
            mode,
            cache: None,
        }
    }

    pub fn partition(&self) -> &Arc<StateSpacePartition> {
        &self.partition
    }

    pub fn mode(&self) -> LossMode {
        self.mode
    }

    /// Mean loss over every `(example, position)` pair.
    ///
    /// # Errors
    ///
    /// - [`HexError::Shape`] if channels differ from the node count or the
    ///   label count differs from `num * height * width`
    /// - [`HexError::Label`] for a non-integer label
    /// - [`HexError::Inference`] for an out-of-range or inconsistent label
    pub fn forward(&mut self, scores: &Blob, labels: &Blob) -> HexResult<f64> {
        self.cache = None;
        let count = check_shapes(scores, labels, self.partition.node_count())?;
        let inner = scores.inner();
        let partition = self.partition.as_ref();
        let mode = self.mode;

        let results = map_examples(count, |e| {
            let label = label_value(labels.data()[e])?;
            let example_scores = scores.gather(e / inner, e % inner);
            let out = label_loss_and_gradient(partition, &example_scores, label, mode)?;
            Ok((out.loss, out.gradient))
        })?;

        let total: f64 = results.iter().map(|(loss, _)| loss).sum();
        let mean = if count == 0 { 0.0 } else { total / count as f64 };

        self.cache = Some(ForwardCache {
            shape: scores.shape(),
            gradients: results.into_iter().map(|(_, g)| g).collect(),
        });
        Ok(mean)
    }

    /// Writes `loss_weight / count * gradient` into `scores.diff`.
    ///
    /// `propagate_down` is `[scores, labels]`. Asking for the label gradient
    /// is a hard error; with `propagate_down[0]` false the diff is left
    /// untouched but the cache is still consumed.
    pub fn backward(
        &mut self,
        loss_weight: f64,
        propagate_down: [bool; 2],
        scores: &mut Blob,
    ) -> HexResult<()> {
        if propagate_down[1] {
            return Err(HexError::LabelPropagation { layer: LAYER_NAME });
        }
        let cache = self.cache.take().ok_or(HexError::BackwardBeforeForward)?;
        if !propagate_down[0] {
            return Ok(());
        }
        if scores.shape() != cache.shape {
            return Err(HexError::Shape(format!(
                "backward blob shape {:?} differs from forward shape {:?}",
                scores.shape(),
                cache.shape
            )));
        }

        let count = cache.gradients.len();
        if count == 0 {
            return Ok(());
        }
        let scale = loss_weight / count as f64;
        let inner = scores.inner();
        for (e, gradient) in cache.gradients.iter().enumerate() {
            let scaled: Vec<f64> = gradient.iter().map(|g| g * scale).collect();
            scores.scatter_diff(e / inner, e % inner, &scaled);
        }
        Ok(())
    }
}
