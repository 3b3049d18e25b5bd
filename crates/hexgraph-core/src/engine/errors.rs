//! Error types for graph construction, inference, and the layer adapters.

use thiserror::Error;

/// Structural errors raised while building a label graph or its state space.
///
/// These are fatal for configuration: a layer cannot be set up on top of a
/// graph that fails any of these checks.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An edge references a label outside `[0, node_count)`.
    #[error("label {id} is out of range for {node_count} labels")]
    OutOfRange { id: u32, node_count: usize },

    /// Hierarchy edges contain a directed cycle through `node`.
    #[error("hierarchy contains a cycle through label {node}")]
    Cycle { node: u32 },

    /// A label is declared mutually exclusive with itself.
    #[error("label {node} is declared mutually exclusive with itself")]
    SelfExclusion { node: u32 },

    /// The label-name table does not match the node count.
    #[error("expected {expected} label names, found {found}")]
    LabelCount { expected: usize, found: usize },

    /// Enumeration exceeded its configured ceiling.
    #[error("state space of {scope} exceeds the ceiling of {limit} states")]
    StateSpaceTooLarge { scope: String, limit: usize },

    /// Invalid enumeration settings.
    #[error("config error: {0}")]
    Config(String),
}

/// Per-example errors raised by the inference engine.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// The ground-truth assignment violates the graph's constraints.
    #[error("ground-truth state {state} is not a consistent assignment")]
    InconsistentLabel { state: String },

    /// An integer label does not address a node of the graph.
    #[error("label {label} is out of range for {node_count} labels")]
    LabelOutOfRange { label: i64, node_count: usize },

    /// Score vector length differs from the node count.
    #[error("score vector has {found} entries, expected {expected}")]
    ScoreLength { expected: usize, found: usize },

    /// A score is NaN or infinite.
    #[error("score for label {index} is not finite ({value})")]
    NonFiniteScore { index: usize, value: f64 },

    /// Scores are finite but a state's log potential overflows.
    #[error("scores overflow: {sign} scores sum to a non-finite value")]
    ScoreOverflow { sign: &'static str },
}

/// Errors surfaced by the loss and accuracy layers and by graph loading.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// without breaking changes.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HexError {
    /// Reading or parsing a graph source failed.
    #[error(transparent)]
    Frontend(#[from] hexgraph_frontend::FrontendError),

    /// Graph construction or enumeration failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Inference failed for an example.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Invalid layer configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Input blobs have incompatible shapes.
    #[error("shape error: {0}")]
    Shape(String),

    /// A label value cannot be used (out of range, not ignored).
    #[error("label error: {0}")]
    Label(String),

    /// `backward` was called without a preceding `forward`.
    #[error("backward called before forward")]
    BackwardBeforeForward,

    /// Gradient was requested for the label input.
    #[error("{layer} layer cannot backpropagate to label inputs")]
    LabelPropagation { layer: &'static str },
}

pub type HexResult<T> = Result<T, HexError>;
