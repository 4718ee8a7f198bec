//! Running statistics and distortion metrics for lossy codecs.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Streaming moments of a sequence of values.
///
/// Single-pass update of mean and the second and third central moments, so
/// per-thread instances can be merged with [`Stats::assimilate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    count: u64,
    min: f64,
    max: f64,
    mean: f64,
    m2: f64,
    m3: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            m2: 0.0,
            m3: 0.0,
        }
    }
}

impl Stats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one value.
    pub fn notify(&mut self, value: f32) {
        let x = f64::from(value);
        let n1 = self.count as f64;
        self.count += 1;
        let n = self.count as f64;

        self.min = self.min.min(x);
        self.max = self.max.max(x);

        let delta = x - self.mean;
        let delta_n = delta / n;
        let term1 = delta * delta_n * n1;
        self.mean += delta_n;
        self.m3 += term1 * delta_n * (n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term1;
    }

    /// Merge statistics gathered elsewhere into `self`.
    pub fn assimilate(&mut self, other: &Stats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }

        let na = self.count as f64;
        let nb = other.count as f64;
        let n = na + nb;
        let delta = other.mean - self.mean;
        let delta2 = delta * delta;

        let m3 = self.m3
            + other.m3
            + delta * delta2 * na * nb * (na - nb) / (n * n)
            + 3.0 * delta * (na * other.m2 - nb * self.m2) / n;
        let m2 = self.m2 + other.m2 + delta2 * na * nb / n;

        self.count += other.count;
        self.mean += delta * nb / n;
        self.m2 = m2;
        self.m3 = m3;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Number of recorded values.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Smallest recorded value, or 0 if empty.
    pub fn min(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.min
        }
    }

    /// Largest recorded value, or 0 if empty.
    pub fn max(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.max
        }
    }

    /// Arithmetic mean.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.m2 / self.count as f64
    }

    /// Sample skewness, 0 for constant or empty input.
    pub fn skewness(&self) -> f64 {
        if self.m2 <= 0.0 {
            return 0.0;
        }
        (self.count as f64).sqrt() * self.m3 / self.m2.powf(1.5)
    }
}

/// Number of bins in the input-value histogram.
pub const HISTOGRAM_BINS: usize = 1000;

/// Error metrics between original values and their decoded counterparts.
///
/// Purely diagnostic; codecs only update it when asked to collect stats.
#[derive(Debug, Clone, Default)]
pub struct DistortionStats {
    original: Stats,
    l1: Stats,
    sum_l1: f64,
    num_exact: usize,
    num_sign_flip: usize,
    num_rounded_to_zero: usize,
    sum_log_ratio: f64,
    num_inexact: usize,
    sum_inexact_l1: f64,
    sum_sq_inexact_l1: f64,
    histogram: Vec<u32>,
}

impl DistortionStats {
    /// Create empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one original value and its decoded value.
    pub fn notify(&mut self, original: f32, distorted: f32) {
        let l1 = (original - distorted).abs();
        self.original.notify(original);
        self.l1.notify(l1);
        self.sum_l1 += f64::from(l1);

        if l1 == 0.0 {
            self.num_exact += 1;
        }
        if original != 0.0 && distorted != 0.0 && (original < 0.0) != (distorted < 0.0) {
            self.num_sign_flip += 1;
        }
        if original != 0.0 && distorted == 0.0 {
            self.num_rounded_to_zero += 1;
        }

        if l1 != 0.0 {
            let l1 = f64::from(l1);
            self.sum_log_ratio += (1.0 + f64::from(original.abs()) / l1).ln();
            self.num_inexact += 1;
            self.sum_inexact_l1 += l1;
            self.sum_sq_inexact_l1 += l1 * l1;
        }
    }

    /// Record an input value in the 0.01-wide histogram centered on zero.
    ///
    /// Values outside `[-5, 5)` land in the edge bins.
    pub fn notify_input(&mut self, value: f32) {
        if self.histogram.is_empty() {
            self.histogram = vec![0; HISTOGRAM_BINS];
        }
        let bin = (value * 100.0 + 500.0).round();
        let bin = if bin.is_nan() {
            HISTOGRAM_BINS / 2
        } else {
            bin.clamp(0.0, (HISTOGRAM_BINS - 1) as f32) as usize
        };
        self.histogram[bin] += 1;
    }

    /// Merge another instance into `self`.
    pub fn assimilate(&mut self, other: &DistortionStats) {
        self.original.assimilate(&other.original);
        self.l1.assimilate(&other.l1);
        self.sum_l1 += other.sum_l1;
        self.num_exact += other.num_exact;
        self.num_sign_flip += other.num_sign_flip;
        self.num_rounded_to_zero += other.num_rounded_to_zero;
        self.sum_log_ratio += other.sum_log_ratio;
        self.num_inexact += other.num_inexact;
        self.sum_inexact_l1 += other.sum_inexact_l1;
        self.sum_sq_inexact_l1 += other.sum_sq_inexact_l1;

        if !other.histogram.is_empty() {
            if self.histogram.is_empty() {
                self.histogram = vec![0; HISTOGRAM_BINS];
            }
            for (dst, src) in self.histogram.iter_mut().zip(&other.histogram) {
                *dst += src;
            }
        }
    }

    /// Number of recorded pairs.
    pub fn num(&self) -> usize {
        self.l1.count() as usize
    }

    /// Pairs decoded without error.
    pub fn num_exact(&self) -> usize {
        self.num_exact
    }

    /// Pairs whose nonzero original and decoded values differ in sign.
    pub fn num_sign_flip(&self) -> usize {
        self.num_sign_flip
    }

    /// Nonzero originals decoded as zero.
    pub fn num_rounded_to_zero(&self) -> usize {
        self.num_rounded_to_zero
    }

    /// Total absolute error.
    pub fn sum_l1(&self) -> f64 {
        self.sum_l1
    }

    /// Statistics of the absolute error.
    pub fn l1(&self) -> &Stats {
        &self.l1
    }

    /// Statistics of the original values.
    pub fn original(&self) -> &Stats {
        &self.original
    }

    /// Geometric mean of `1 + |original| / l1` over pairs with nonzero error,
    /// or 0 if there are none.
    pub fn geomean_value_div_l1(&self) -> f64 {
        if self.num_inexact == 0 {
            return 0.0;
        }
        (self.sum_log_ratio / self.num_inexact as f64).exp()
    }

    /// Mean of the nonzero errors, each weighted by `1 - l1 / max_l1` so that
    /// outliers count less. 0 if every pair was exact.
    pub fn weighted_average_l1(&self) -> f64 {
        if self.num_inexact == 0 {
            return 0.0;
        }
        let max = self.l1.max();
        let sum_weights = self.num_inexact as f64 - self.sum_inexact_l1 / max;
        if sum_weights <= 0.0 {
            // All errors equal the maximum.
            return self.sum_inexact_l1 / self.num_inexact as f64;
        }
        (self.sum_inexact_l1 - self.sum_sq_inexact_l1 / max) / sum_weights
    }

    /// Input histogram, empty unless [`Self::notify_input`] was called.
    pub fn histogram(&self) -> &[u32] {
        &self.histogram
    }

    /// Snapshot of the headline metrics.
    pub fn summary(&self) -> DistortionSummary {
        DistortionSummary {
            num: self.num(),
            num_exact: self.num_exact,
            num_sign_flip: self.num_sign_flip,
            num_rounded_to_zero: self.num_rounded_to_zero,
            sum_l1: self.sum_l1,
            mean_l1: self.l1.mean(),
            max_l1: self.l1.max(),
            geomean_value_div_l1: self.geomean_value_div_l1(),
            weighted_average_l1: self.weighted_average_l1(),
            original_skewness: self.original.skewness(),
        }
    }

    /// Log the summary at info level.
    pub fn log_summary(&self, label: &str) {
        let s = self.summary();
        info!(
            label,
            num = s.num,
            exact = s.num_exact,
            sign_flips = s.num_sign_flip,
            rounded_to_zero = s.num_rounded_to_zero,
            mean_l1 = s.mean_l1,
            max_l1 = s.max_l1,
            geomean_div_l1 = s.geomean_value_div_l1,
            weighted_l1 = s.weighted_average_l1,
            "distortion"
        );
    }
}

/// Serializable snapshot of [`DistortionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistortionSummary {
    pub num: usize,
    pub num_exact: usize,
    pub num_sign_flip: usize,
    pub num_rounded_to_zero: usize,
    pub sum_l1: f64,
    pub mean_l1: f64,
    pub max_l1: f64,
    pub geomean_value_div_l1: f64,
    pub weighted_average_l1: f64,
    pub original_skewness: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_stats_moments() {
        let mut stats = Stats::new();
        for v in [1.0f32, 2.0, 3.0, 4.0] {
            stats.notify(v);
        }
        assert_eq!(stats.count(), 4);
        assert_eq!(stats.min(), 1.0);
        assert_eq!(stats.max(), 4.0);
        assert!((stats.mean() - 2.5).abs() < 1e-12);
        assert!((stats.variance() - 1.25).abs() < 1e-12);
        assert!(stats.skewness().abs() < 1e-12);
    }

    #[test]
    fn test_stats_skewed() {
        let mut stats = Stats::new();
        for v in [0.0f32, 0.0, 0.0, 10.0] {
            stats.notify(v);
        }
        assert!(stats.skewness() > 0.0);
    }

    #[test]
    fn test_distortion_counts() {
        let mut d = DistortionStats::new();
        d.notify(1.0, 1.0);
        d.notify(0.5, -0.25);
        d.notify(0.25, 0.0);
        d.notify(0.0, 0.0);

        assert_eq!(d.num(), 4);
        assert_eq!(d.num_exact(), 2);
        assert_eq!(d.num_sign_flip(), 1);
        assert_eq!(d.num_rounded_to_zero(), 1);
        assert!((d.sum_l1() - 1.0).abs() < 1e-12);
        assert!((d.l1().max() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_geomean_empty_is_zero() {
        let mut d = DistortionStats::new();
        d.notify(2.0, 2.0);
        assert_eq!(d.geomean_value_div_l1(), 0.0);

        d.notify(2.0, 1.0);
        assert!((d.geomean_value_div_l1() - 3.0).abs() < 1e-12);

        // Zero originals still count, with ratio 1.
        d.notify(0.0, 0.5);
        assert!((d.geomean_value_div_l1() - 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_average() {
        let mut d = DistortionStats::new();
        d.notify(3.0, 3.0);
        assert_eq!(d.weighted_average_l1(), 0.0);

        d.notify(1.0, 0.5);
        d.notify(2.0, 2.25);
        // Weights 0 and 0.5 for errors 0.5 and 0.25; the exact pair is skipped.
        assert!((d.weighted_average_l1() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_average_uniform_errors() {
        let mut d = DistortionStats::new();
        d.notify(1.0, 0.5);
        d.notify(-2.0, -1.5);
        assert!((d.weighted_average_l1() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_histogram() {
        let mut d = DistortionStats::new();
        assert!(d.histogram().is_empty());
        d.notify_input(0.0);
        d.notify_input(0.011);
        d.notify_input(-100.0);
        d.notify_input(100.0);
        let h = d.histogram();
        assert_eq!(h.len(), HISTOGRAM_BINS);
        assert_eq!(h[500], 1);
        assert_eq!(h[501], 1);
        assert_eq!(h[0], 1);
        assert_eq!(h[HISTOGRAM_BINS - 1], 1);
    }

    #[test]
    fn test_summary_serializes() {
        let mut d = DistortionStats::new();
        d.notify(1.0, 0.75);
        let s = d.summary();
        assert_eq!(s.num, 1);
        assert!((s.max_l1 - 0.25).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_assimilate_matches_sequential(
            values in prop::collection::vec(-1000.0f32..1000.0, 2..200),
            split in 0usize..200,
        ) {
            let split = split % values.len();
            let mut whole = Stats::new();
            let mut left = Stats::new();
            let mut right = Stats::new();
            for (i, &v) in values.iter().enumerate() {
                whole.notify(v);
                if i < split { left.notify(v) } else { right.notify(v) }
            }
            left.assimilate(&right);

            prop_assert_eq!(left.count(), whole.count());
            prop_assert_eq!(left.min(), whole.min());
            prop_assert_eq!(left.max(), whole.max());
            prop_assert!((left.mean() - whole.mean()).abs() <= 1e-6 * (1.0 + whole.mean().abs()));
            prop_assert!((left.variance() - whole.variance()).abs() <= 1e-6 * (1.0 + whole.variance()));
        }

        #[test]
        fn prop_distortion_assimilate(
            pairs in prop::collection::vec((-10.0f32..10.0, -10.0f32..10.0), 1..100),
        ) {
            let mut whole = DistortionStats::new();
            let mut a = DistortionStats::new();
            let mut b = DistortionStats::new();
            for (i, &(o, d)) in pairs.iter().enumerate() {
                whole.notify(o, d);
                if i % 2 == 0 { a.notify(o, d) } else { b.notify(o, d) }
            }
            a.assimilate(&b);
            prop_assert_eq!(a.num(), whole.num());
            prop_assert_eq!(a.num_exact(), whole.num_exact());
            prop_assert_eq!(a.num_sign_flip(), whole.num_sign_flip());
            prop_assert!((a.sum_l1() - whole.sum_l1()).abs() < 1e-6 * (1.0 + whole.sum_l1()));
            prop_assert!(
                (a.weighted_average_l1() - whole.weighted_average_l1()).abs()
                    < 1e-6 * (1.0 + whole.weighted_average_l1())
            );
        }
    }
}
