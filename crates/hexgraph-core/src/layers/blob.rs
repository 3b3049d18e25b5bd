//! Minimal host tensor: a 4-D `[num, channels, height, width]` buffer with a
//! value and a gradient array.

use crate::engine::errors::{HexError, HexResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    shape: [usize; 4],
    data: Vec<f64>,
    diff: Vec<f64>,
}

impl Blob {
    /// A zero-filled blob.
    pub fn zeros(shape: [usize; 4]) -> Self {
        let count = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; count],
            diff: vec![0.0; count],
        }
    }

    /// Wraps `data` laid out row-major over `shape`.
    pub fn from_data(shape: [usize; 4], data: Vec<f64>) -> HexResult<Self> {
        let count: usize = shape.iter().product();
        if data.len() != count {
            return Err(HexError::Shape(format!(
                "blob of shape {:?} needs {} values, got {}",
                shape,
                count,
                data.len()
            )));
        }
        Ok(Self {
            shape,
            diff: vec![0.0; count],
            data,
        })
    }

    /// `[num, channels]` scores, one example per row.
    pub fn from_rows(rows: &[Vec<f64>]) -> HexResult<Self> {
        let channels = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != channels) {
            return Err(HexError::Shape("rows have different lengths".into()));
        }
        let data = rows.iter().flatten().copied().collect();
        Self::from_data([rows.len(), channels, 1, 1], data)
    }

    /// `[num, 1]` label blob.
    pub fn from_labels(labels: &[f64]) -> Self {
        Self {
            shape: [labels.len(), 1, 1, 1],
            data: labels.to_vec(),
            diff: vec![0.0; labels.len()],
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn num(&self) -> usize {
        self.shape[0]
    }

    pub fn channels(&self) -> usize {
        self.shape[1]
    }

    /// Spatial positions per example (`height * width`).
    pub fn inner(&self) -> usize {
        self.shape[2] * self.shape[3]
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn diff(&self) -> &[f64] {
        &self.diff
    }

    pub fn diff_mut(&mut self) -> &mut [f64] {
        &mut self.diff
    }

    /// Channel vector at example `n`, position `j`.
    pub(crate) fn gather(&self, n: usize, j: usize) -> Vec<f64> {
        let (channels, inner) = (self.channels(), self.inner());
        let base = n * channels * inner + j;
        (0..channels).map(|c| self.data[base + c * inner]).collect()
    }

    /// Writes `values` into the diff channel vector at example `n`,
    /// position `j`.
    pub(crate) fn scatter_diff(&mut self, n: usize, j: usize, values: &[f64]) {
        let (channels, inner) = (self.channels(), self.inner());
        let base = n * channels * inner + j;
        for (c, &v) in values.iter().enumerate().take(channels) {
            self.diff[base + c * inner] = v;
        }
    }
}
