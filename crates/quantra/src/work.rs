//! Compression configuration and per-worker state.

use quantra_core::{DistortionStats, Error, Result};
use quantra_nuq::ClusterBuf;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

/// Settings for [`compress`](crate::compress).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressConfig {
    /// Record distortion statistics for every compressed element.
    pub collect_stats: bool,
    /// Log throughput for calls compressing more elements than this.
    pub report_throughput_above: usize,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            collect_stats: false,
            report_throughput_above: 10_000_000,
        }
    }
}

impl CompressConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable distortion statistics.
    pub fn with_collect_stats(mut self, collect_stats: bool) -> Self {
        self.collect_stats = collect_stats;
        self
    }

    /// Set the throughput logging threshold in elements.
    pub fn with_report_throughput_above(mut self, num: usize) -> Self {
        self.report_throughput_above = num;
        self
    }
}

/// Scratch state owned by one worker for the duration of a call.
#[derive(Debug, Clone)]
pub struct CompressPerThread {
    /// Distortion of everything this worker compressed.
    pub stats: DistortionStats,
    /// Clustering buffers for NUQ.
    pub buf: ClusterBuf,
    /// Whether codecs should update `stats`.
    pub collect_stats: bool,
    /// Unused NUQ cluster slots over all groups this worker encoded.
    pub unused_clusters: usize,
    pub(crate) decoded: Vec<f32>,
}

impl CompressPerThread {
    /// Create fresh state.
    pub fn new(collect_stats: bool) -> Self {
        Self {
            stats: DistortionStats::new(),
            buf: ClusterBuf::new(),
            collect_stats,
            unused_clusters: 0,
            decoded: Vec::new(),
        }
    }
}

impl Default for CompressPerThread {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Configuration plus the per-worker states of the most recent call.
#[derive(Debug, Clone, Default)]
pub struct CompressWorkingSet {
    config: CompressConfig,
    tls: Vec<CompressPerThread>,
    stats: DistortionStats,
    unused_clusters: usize,
}

impl CompressWorkingSet {
    /// Create a working set.
    pub fn new(config: CompressConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &CompressConfig {
        &self.config
    }

    /// Replace the configuration for subsequent calls.
    pub fn set_config(&mut self, config: CompressConfig) {
        self.config = config;
    }

    /// Per-worker states of the most recent call.
    pub fn tls(&self) -> &[CompressPerThread] {
        &self.tls
    }

    /// Distortion of the most recent call, merged over all workers.
    pub fn stats(&self) -> &DistortionStats {
        &self.stats
    }

    /// Unused NUQ cluster slots of the most recent call.
    pub fn unused_clusters(&self) -> usize {
        self.unused_clusters
    }

    /// Takes ownership of the workers' states and merges their results.
    pub(crate) fn absorb(&mut self, tls: Vec<CompressPerThread>) {
        let mut stats = DistortionStats::new();
        let mut unused = 0;
        for state in &tls {
            stats.assimilate(&state.stats);
            unused += state.unused_clusters;
        }
        self.stats = stats;
        self.unused_clusters = unused;
        self.tls = tls;
    }
}

/// Build a worker pool with `num_threads` threads, 0 for one per core.
pub fn thread_pool(num_threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("quantra-{i}"))
        .build()
        .map_err(|e| Error::ThreadPool(format!("failed to create thread pool: {e}")))
}
