//! Layer configuration.
//!
//! Each config is a plain struct with `Default` and `validate()`. With the
//! `serde` feature they also load from JSON.

use std::path::PathBuf;

use crate::engine::errors::{HexError, HexResult};
use crate::engine::inference::LossMode;
use crate::engine::partition::EnumerationConfig;

/// Where a layer reads its graph from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GraphSourceConfig {
    /// Line-oriented hierarchy/exclusion edge file.
    pub graph_file: PathBuf,
    /// One label name per line; default names are used when absent.
    pub label_name_file: Option<PathBuf>,
    pub node_count: u32,
}

impl GraphSourceConfig {
    pub fn new(graph_file: impl Into<PathBuf>, node_count: u32) -> Self {
        Self {
            graph_file: graph_file.into(),
            label_name_file: None,
            node_count,
        }
    }

    pub fn with_label_names(mut self, path: impl Into<PathBuf>) -> Self {
        self.label_name_file = Some(path.into());
        self
    }

    pub fn validate(&self) -> HexResult<()> {
        if self.node_count == 0 {
            return Err(HexError::Config("node_count must be > 0".into()));
        }
        if self.graph_file.as_os_str().is_empty() {
            return Err(HexError::Config("graph_file must be set".into()));
        }
        Ok(())
    }
}

/// Configuration of [`HexLossLayer`](crate::layers::loss::HexLossLayer).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HexLossConfig {
    pub graph: GraphSourceConfig,
    pub enumeration: EnumerationConfig,
    pub mode: LossMode,
}

impl HexLossConfig {
    /// Checks everything except the graph source, for layers handed a
    /// prebuilt graph.
    pub fn validate_settings(&self) -> HexResult<()> {
        self.enumeration.validate()?;
        Ok(())
    }

    pub fn validate(&self) -> HexResult<()> {
        self.graph.validate()?;
        self.validate_settings()
    }

    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> HexResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| HexError::Config(format!("invalid loss config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration of
/// [`HexAccuracyLayer`](crate::layers::accuracy::HexAccuracyLayer).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HexAccuracyConfig {
    pub graph: GraphSourceConfig,
    pub enumeration: EnumerationConfig,
    /// Rank cutoff; the example counts as correct when its label is among
    /// the `top_k` highest marginals.
    pub top_k: usize,
    /// Examples carrying this label are skipped entirely.
    pub ignore_label: Option<i64>,
    /// Also report accuracy per class.
    pub per_class: bool,
}

impl Default for HexAccuracyConfig {
    fn default() -> Self {
        Self {
            graph: GraphSourceConfig::default(),
            enumeration: EnumerationConfig::default(),
            top_k: 1,
            ignore_label: None,
            per_class: false,
        }
    }
}

impl HexAccuracyConfig {
    /// Checks everything except the graph source against `node_count`.
    pub fn validate_settings(&self, node_count: usize) -> HexResult<()> {
        if self.top_k == 0 || self.top_k > node_count {
            return Err(HexError::Config(format!(
                "top_k must be in 1..={}, got {}",
                node_count, self.top_k
            )));
        }
        self.enumeration.validate()?;
        Ok(())
    }

    pub fn validate(&self) -> HexResult<()> {
        self.graph.validate()?;
        self.validate_settings(self.graph.node_count as usize)
    }

    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> HexResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| HexError::Config(format!("invalid accuracy config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}
