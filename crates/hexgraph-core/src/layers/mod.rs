//! Loss and accuracy layers over host [`Blob`]s.
//!
//! Both layers share a built [`StateSpacePartition`] and treat every
//! `(example, spatial position)` pair of the score blob as one example whose
//! channel vector is the label score vector.
//!
//! [`StateSpacePartition`]: crate::engine::partition::StateSpacePartition

pub mod accuracy;
pub mod blob;
pub mod config;
pub mod loss;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::engine::errors::{HexError, HexResult};
use blob::Blob;

/// Checks the score blob against the graph and the label blob against the
/// score blob. Returns the number of examples.
pub(crate) fn check_shapes(scores: &Blob, labels: &Blob, node_count: usize) -> HexResult<usize> {
    if scores.channels() != node_count {
        return Err(HexError::Shape(format!(
            "score blob has {} channels but the graph has {} labels",
            scores.channels(),
            node_count
        )));
    }
    let examples = scores.num() * scores.inner();
    if labels.count() != examples {
        return Err(HexError::Shape(format!(
            "label blob has {} values, expected num * height * width = {}",
            labels.count(),
            examples
        )));
    }
    Ok(examples)
}

/// Integer label stored as a real.
pub(crate) fn label_value(raw: f64) -> HexResult<i64> {
    if !raw.is_finite() || raw.fract() != 0.0 {
        return Err(HexError::Label(format!("label {raw} is not an integer")));
    }
    Ok(raw as i64)
}

/// Runs `f` for every example index, in parallel with the `parallel`
/// feature. Output order matches index order either way.
#[cfg(feature = "parallel")]
pub(crate) fn map_examples<T, F>(count: usize, f: F) -> HexResult<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> HexResult<T> + Sync + Send,
{
    (0..count).into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn map_examples<T, F>(count: usize, f: F) -> HexResult<Vec<T>>
where
    F: Fn(usize) -> HexResult<T>,
{
    (0..count).map(f).collect()
}
