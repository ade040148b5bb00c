//! Zipf-distributed ranks over `1..=n`.
//!
//! `P(k) ∝ 1 / k^s`. The CDF is built once; sampling is a binary search.

use anyhow::{ensure, Result};

#[derive(Debug, Clone)]
pub struct Zipf {
    cdf: Vec<f64>,
}

impl Zipf {
    pub fn new(n: usize, exponent: f64) -> Result<Self> {
        ensure!(n > 0, "zipf needs at least one rank");
        ensure!(
            exponent.is_finite() && exponent > 0.0,
            "zipf exponent must be positive, got {}",
            exponent
        );

        let weights: Vec<f64> = (1..=n).map(|k| (k as f64).powf(-exponent)).collect();
        let total: f64 = weights.iter().sum();

        let mut acc = 0.0;
        let mut cdf: Vec<f64> = weights
            .into_iter()
            .map(|w| {
                acc += w / total;
                acc
            })
            .collect();
        // Rounding can leave the last bucket just under 1.0.
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }
        Ok(Self { cdf })
    }

    /// A rank in `1..=n`.
    pub fn sample(&self, rng: &mut fastrand::Rng) -> usize {
        let u = rng.f64();
        self.cdf.partition_point(|&p| p < u) + 1
    }
}
