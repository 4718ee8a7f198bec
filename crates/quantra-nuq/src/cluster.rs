//! Exact 1-D clustering of one group.
//!
//! Minimizes the sum of squared errors between each element and its center.
//! On sorted data every optimal cluster is a contiguous run, so the problem
//! reduces to choosing cut points. The segment cost satisfies the quadrangle
//! inequality, which makes the optimal cut monotone in the segment end and
//! allows each DP layer to be solved by divide and conquer in `O(n log n)`.

use crate::stream::{CLUSTERS, GROUP_SIZE};

/// Scratch space for [`NuqClustering::cluster_exact_l2`].
///
/// Allocated once per worker and reused for every group.
#[derive(Debug, Clone)]
pub struct ClusterBuf {
    sorted: Vec<(f32, u16)>,
    values: Vec<f64>,
    weights: Vec<f64>,
    distinct_of: Vec<u16>,
    cluster_of: Vec<u16>,
    prefix_w: Vec<f64>,
    prefix_s: Vec<f64>,
    prefix_q: Vec<f64>,
    cost_prev: Vec<f64>,
    cost_cur: Vec<f64>,
    cuts: Vec<u16>,
}

impl Default for ClusterBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterBuf {
    /// Allocate buffers for one group.
    pub fn new() -> Self {
        Self {
            sorted: Vec::with_capacity(GROUP_SIZE),
            values: Vec::with_capacity(GROUP_SIZE),
            weights: Vec::with_capacity(GROUP_SIZE),
            distinct_of: vec![0; GROUP_SIZE],
            cluster_of: vec![0; GROUP_SIZE],
            prefix_w: Vec::with_capacity(GROUP_SIZE + 1),
            prefix_s: Vec::with_capacity(GROUP_SIZE + 1),
            prefix_q: Vec::with_capacity(GROUP_SIZE + 1),
            cost_prev: vec![0.0; GROUP_SIZE],
            cost_cur: vec![0.0; GROUP_SIZE],
            cuts: vec![0; CLUSTERS * GROUP_SIZE],
        }
    }
}

/// Sum of squared deviations of weighted runs, from prefix sums.
struct SegmentCost<'a> {
    w: &'a [f64],
    s: &'a [f64],
    q: &'a [f64],
}

impl SegmentCost<'_> {
    /// Cost of distinct values `first..=last` sharing one center.
    #[inline]
    fn cost(&self, first: usize, last: usize) -> f64 {
        let w = self.w[last + 1] - self.w[first];
        let s = self.s[last + 1] - self.s[first];
        let q = self.q[last + 1] - self.q[first];
        (q - s * s / w).max(0.0)
    }
}

/// One DP layer: `cur[i]` is the best cost of covering `0..=i` given the
/// previous layer `prev`, and `cuts[i]` the first value of the last cluster.
struct Layer<'a> {
    seg: &'a SegmentCost<'a>,
    prev: &'a [f64],
    cur: &'a mut [f64],
    cuts: &'a mut [u16],
}

impl Layer<'_> {
    fn solve(&mut self, lo: usize, hi: usize, first_lo: usize, first_hi: usize) {
        if lo > hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;

        let mut best = f64::INFINITY;
        let mut best_first = first_lo;
        // Strict comparison keeps the smallest cut among ties.
        for first in first_lo..=first_hi.min(mid) {
            let cost = self.prev[first - 1] + self.seg.cost(first, mid);
            if cost < best {
                best = cost;
                best_first = first;
            }
        }
        self.cur[mid] = best;
        self.cuts[mid] = best_first as u16;

        if mid > lo {
            self.solve(lo, mid - 1, first_lo, best_first);
        }
        self.solve(mid + 1, hi, best_first, first_hi);
    }
}

/// Exact L2 clustering of NUQ groups.
pub struct NuqClustering;

impl NuqClustering {
    /// Clusters up to [`GROUP_SIZE`] values, zero-padding a short group.
    ///
    /// Writes one center per slot and one index per element (padding
    /// positions included) and returns the number of unused slots. With `d`
    /// distinct values, `min(d, CLUSTERS)` clusters are used; unused slots
    /// come first and hold 0.0, used slots hold their centers in ascending
    /// order. Values beyond the first [`GROUP_SIZE`] are ignored.
    pub fn cluster_exact_l2(
        raw: &[f32],
        buf: &mut ClusterBuf,
        centers: &mut [f32; CLUSTERS],
        indices: &mut [u16; GROUP_SIZE],
    ) -> usize {
        let raw = &raw[..raw.len().min(GROUP_SIZE)];
        let ClusterBuf {
            sorted,
            values,
            weights,
            distinct_of,
            cluster_of,
            prefix_w,
            prefix_s,
            prefix_q,
            cost_prev,
            cost_cur,
            cuts,
        } = buf;

        sorted.clear();
        sorted.extend((0..GROUP_SIZE).map(|pos| (raw.get(pos).copied().unwrap_or(0.0), pos as u16)));
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        values.clear();
        weights.clear();
        for &(value, pos) in sorted.iter() {
            match values.last() {
                Some(&last) if last == f64::from(value) => {
                    if let Some(w) = weights.last_mut() {
                        *w += 1.0;
                    }
                }
                _ => {
                    values.push(f64::from(value));
                    weights.push(1.0);
                }
            }
            distinct_of[pos as usize] = (values.len() - 1) as u16;
        }

        let d = values.len();
        let k = d.min(CLUSTERS);
        let unused = CLUSTERS - k;

        // Shifting by the mean keeps the prefix sums well conditioned.
        let total: f64 = values.iter().zip(weights.iter()).map(|(v, w)| v * w).sum();
        let mean = total / GROUP_SIZE as f64;
        prefix_w.clear();
        prefix_s.clear();
        prefix_q.clear();
        prefix_w.push(0.0);
        prefix_s.push(0.0);
        prefix_q.push(0.0);
        let (mut acc_w, mut acc_s, mut acc_q) = (0.0, 0.0, 0.0);
        for (&v, &w) in values.iter().zip(weights.iter()) {
            let x = v - mean;
            acc_w += w;
            acc_s += w * x;
            acc_q += w * x * x;
            prefix_w.push(acc_w);
            prefix_s.push(acc_s);
            prefix_q.push(acc_q);
        }
        let seg = SegmentCost {
            w: prefix_w,
            s: prefix_s,
            q: prefix_q,
        };

        for (i, cost) in cost_prev.iter_mut().enumerate().take(d) {
            *cost = seg.cost(0, i);
        }
        for c in 1..k {
            let mut layer = Layer {
                seg: &seg,
                prev: cost_prev,
                cur: cost_cur,
                cuts: &mut cuts[c * GROUP_SIZE..(c + 1) * GROUP_SIZE],
            };
            layer.solve(c, d - 1, c, d - 1);
            core::mem::swap(cost_prev, cost_cur);
        }

        centers[..unused].fill(0.0);
        let mut last = d - 1;
        for c in (0..k).rev() {
            let first = if c == 0 {
                0
            } else {
                cuts[c * GROUP_SIZE + last] as usize
            };
            let mut sum = 0.0;
            let mut weight = 0.0;
            for idx in first..=last {
                sum += values[idx] * weights[idx];
                weight += weights[idx];
                cluster_of[idx] = (unused + c) as u16;
            }
            centers[unused + c] = (sum / weight) as f32;
            if c > 0 {
                last = first - 1;
            }
        }

        for (index, &distinct) in indices.iter_mut().zip(distinct_of.iter()) {
            *index = cluster_of[distinct as usize];
        }
        unused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quantra_core::DistortionStats;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn cluster(raw: &[f32]) -> (usize, [f32; CLUSTERS], [u16; GROUP_SIZE]) {
        let mut buf = ClusterBuf::new();
        let mut centers = [0.0; CLUSTERS];
        let mut indices = [0; GROUP_SIZE];
        let unused = NuqClustering::cluster_exact_l2(raw, &mut buf, &mut centers, &mut indices);
        (unused, centers, indices)
    }

    fn distortion(raw: &[f32], centers: &[f32; CLUSTERS], indices: &[u16; GROUP_SIZE]) -> DistortionStats {
        let mut stats = DistortionStats::new();
        for (&v, &i) in raw.iter().zip(indices.iter()) {
            assert!((i as usize) < CLUSTERS);
            stats.notify(v, centers[i as usize]);
        }
        stats
    }

    #[test]
    fn test_flat() {
        let raw = [0.5f32; GROUP_SIZE];
        let (unused, centers, indices) = cluster(&raw);
        assert_eq!(unused, CLUSTERS - 1);
        assert!(centers[..unused].iter().all(|&c| c == 0.0));
        assert_eq!(centers[unused], 0.5);
        assert!(indices.iter().all(|&i| i as usize == unused));
    }

    #[test]
    fn test_plateaus() {
        let mut raw: Vec<f32> = (0..GROUP_SIZE)
            .map(|i| {
                let plateau = i / (GROUP_SIZE / CLUSTERS);
                plateau as f32 / CLUSTERS as f32 - 0.5
            })
            .collect();
        raw.shuffle(&mut StdRng::seed_from_u64(7));

        let (unused, centers, indices) = cluster(&raw);
        assert_eq!(unused, 0);

        let stats = distortion(&raw, &centers, &indices);
        assert_eq!(stats.num_exact(), GROUP_SIZE);
        assert_eq!(stats.num_sign_flip(), 0);
        assert_eq!(stats.num_rounded_to_zero(), 0);
        assert_eq!(stats.sum_l1(), 0.0);
        assert_eq!(stats.geomean_value_div_l1(), 0.0);
        assert_eq!(stats.weighted_average_l1(), 0.0);
        assert!(stats.original().mean().abs() < 0.05);
    }

    #[test]
    fn test_ramp() {
        let mut raw: Vec<f32> = (0..GROUP_SIZE)
            .map(|i| i as f32 / GROUP_SIZE as f32 - 0.45)
            .collect();
        raw.shuffle(&mut StdRng::seed_from_u64(42));

        let (unused, centers, indices) = cluster(&raw);
        assert_eq!(unused, 0);

        let stats = distortion(&raw, &centers, &indices);
        assert_eq!(stats.num_exact(), 0);
        assert!(stats.num_sign_flip() < 10);
        assert_eq!(stats.num_rounded_to_zero(), 0);
        // Sixteen runs of sixteen evenly spaced values.
        assert!((stats.sum_l1() - 4.0).abs() < 1e-3, "sum_l1 {}", stats.sum_l1());
        assert!(stats.l1().max() <= 0.04);
        let geomean = stats.geomean_value_div_l1();
        assert!((17.0..=18.0).contains(&geomean), "geomean {geomean}");
        let weighted = stats.weighted_average_l1();
        assert!((0.005..=0.010).contains(&weighted), "weighted l1 {weighted}");
        assert!((stats.original().mean() - 0.05).abs() < 0.01);
        assert!(stats.original().skewness().abs() < 1e-4);
    }

    #[test]
    fn test_normal() {
        let mut rng = StdRng::seed_from_u64(12345);
        let raw: Vec<f32> = (0..GROUP_SIZE).map(|_| rng.sample(StandardNormal)).collect();

        let (unused, centers, indices) = cluster(&raw);
        assert_eq!(unused, 0);

        let stats = distortion(&raw, &centers, &indices);
        assert!(stats.num_sign_flip() < GROUP_SIZE / CLUSTERS);
        assert_eq!(stats.num_rounded_to_zero(), 0);
        // Unit variance; sixteen clusters leave about 0.065 mean error.
        assert!(stats.l1().mean() < 0.08, "mean l1 {}", stats.l1().mean());
        assert!(stats.l1().max() <= 0.25);

        let expected = reference_sse(&raw, CLUSTERS);
        let sse = sum_squared_error(&raw, &centers, &indices);
        assert!((sse - expected).abs() < 1e-6 * (1.0 + expected), "{sse} vs {expected}");
    }

    #[test]
    fn test_centers_ascending() {
        let mut rng = StdRng::seed_from_u64(3);
        let raw: Vec<f32> = (0..GROUP_SIZE).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let (unused, centers, _) = cluster(&raw);
        assert_eq!(unused, 0);
        assert!(centers.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_few_distinct_values_are_exact() {
        let raw: Vec<f32> = (0..GROUP_SIZE).map(|i| [-1.5f32, 0.25, 3.0][i % 3]).collect();
        let (unused, centers, indices) = cluster(&raw);
        assert_eq!(unused, CLUSTERS - 3);
        assert_eq!(&centers[unused..], &[-1.5, 0.25, 3.0]);
        for (&v, &i) in raw.iter().zip(indices.iter()) {
            assert_eq!(centers[i as usize], v);
        }
    }

    #[test]
    fn test_partial_group_padding_maps_to_zero() {
        let raw = [1.0f32, 2.0, 3.0];
        let (unused, centers, indices) = cluster(&raw);
        // 1, 2, 3 and the zero padding.
        assert_eq!(unused, CLUSTERS - 4);
        for (&v, &i) in raw.iter().zip(indices.iter()) {
            assert_eq!(centers[i as usize], v);
        }
        assert!(indices[raw.len()..].iter().all(|&i| centers[i as usize] == 0.0));
    }

    /// Quadratic DP over sorted elements, used as ground truth.
    fn reference_sse(raw: &[f32], k: usize) -> f64 {
        let mut v: Vec<f64> = raw.iter().map(|&x| f64::from(x)).collect();
        v.resize(GROUP_SIZE, 0.0);
        v.sort_by(f64::total_cmp);
        let n = v.len();
        let mut ps = vec![0.0; n + 1];
        let mut pq = vec![0.0; n + 1];
        for i in 0..n {
            ps[i + 1] = ps[i] + v[i];
            pq[i + 1] = pq[i] + v[i] * v[i];
        }
        let seg = |a: usize, b: usize| {
            let w = (b + 1 - a) as f64;
            let s = ps[b + 1] - ps[a];
            (pq[b + 1] - pq[a] - s * s / w).max(0.0)
        };
        let mut prev: Vec<f64> = (0..n).map(|i| seg(0, i)).collect();
        for c in 1..k {
            let mut cur = vec![f64::INFINITY; n];
            for i in c..n {
                for j in c..=i {
                    cur[i] = cur[i].min(prev[j - 1] + seg(j, i));
                }
            }
            prev = cur;
        }
        prev[n - 1]
    }

    fn sum_squared_error(raw: &[f32], centers: &[f32; CLUSTERS], indices: &[u16; GROUP_SIZE]) -> f64 {
        raw.iter()
            .zip(indices.iter())
            .map(|(&v, &i)| {
                let e = f64::from(v) - f64::from(centers[i as usize]);
                e * e
            })
            .sum()
    }

    #[test]
    fn test_matches_quadratic_dp() {
        let mut rng = StdRng::seed_from_u64(99);
        let raw: Vec<f32> = (0..GROUP_SIZE)
            .map(|_| rng.gen_range(0..40) as f32 * 0.1 - 1.0)
            .collect();
        let (unused, centers, indices) = cluster(&raw);
        assert_eq!(unused, 0);

        let sse = sum_squared_error(&raw, &centers, &indices);
        let expected = reference_sse(&raw, CLUSTERS);
        assert!((sse - expected).abs() < 1e-6 * (1.0 + expected), "{sse} vs {expected}");
    }
}
