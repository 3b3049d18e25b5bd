//! Log-space accumulation helpers shared by the flat and junction-tree paths.

/// `ln(exp(a) + exp(b))` without overflow.
#[inline]
pub fn log_add(a: f64, b: f64) -> f64 {
    let m = a.max(b);
    if !m.is_finite() {
        return m;
    }
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// `ln(sum(exp(x)))` over a slice; `-inf` for an empty slice or all `-inf`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let m = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !m.is_finite() {
        return m;
    }
    let sum: f64 = values.iter().map(|&v| (v - m).exp()).sum();
    m + sum.ln()
}

/// Running log-sum-exp that rescales as the maximum grows.
///
/// Used where terms are produced one at a time and collecting them into a
/// slice would cost an allocation per example.
#[derive(Debug, Clone, Copy)]
pub struct LogAccumulator {
    max: f64,
    scaled_sum: f64,
}

impl Default for LogAccumulator {
    fn default() -> Self {
        Self {
            max: f64::NEG_INFINITY,
            scaled_sum: 0.0,
        }
    }
}

impl LogAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, value: f64) {
        if value == f64::NEG_INFINITY {
            return;
        }
        if value > self.max {
            self.scaled_sum = self.scaled_sum * (self.max - value).exp() + 1.0;
            self.max = value;
        } else {
            self.scaled_sum += (value - self.max).exp();
        }
    }

    /// Current log of the sum; `-inf` if nothing finite was pushed.
    pub fn value(&self) -> f64 {
        if self.max == f64::NEG_INFINITY {
            return f64::NEG_INFINITY;
        }
        self.max + self.scaled_sum.ln()
    }
}
