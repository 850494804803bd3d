//! Pipeline configuration.

/// Default difference in cell averages for two cells to match (0–255).
pub const DEFAULT_TOLERANCE: f64 = 20.0;

/// Ratio of cells that must match for two images to be similar.
pub const SIMILAR_QUADS_RATIO: f64 = 0.6;

/// Default grid schedule: a coarse pass, then a fine pruning pass.
pub const DEFAULT_GRID_SCHEDULE: [(usize, usize); 2] = [(4, 4), (16, 16)];

/// Tuning knobs for one similarity search.
///
/// Thresholds travel with the search instead of living in module-level
/// state, so concurrent searches with different settings don't interfere.
#[derive(Debug, Clone)]
pub struct SimilarityConfig {
    /// Maximum difference between two cell averages for them to be
    /// considered matching (0–255).
    pub tolerance: f64,
    /// Grid resolutions applied in sequence; each entry refines the
    /// clusters produced by the previous one.
    pub grid_schedule: Vec<(usize, usize)>,
    /// Fraction of grid cells that must vote for a pair of images.
    pub similar_ratio: f64,
    /// Worker threads for the parallel stages; `None` uses all CPUs.
    pub worker_count: Option<usize>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            grid_schedule: DEFAULT_GRID_SCHEDULE.to_vec(),
            similar_ratio: SIMILAR_QUADS_RATIO,
            worker_count: None,
        }
    }
}

impl SimilarityConfig {
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }
}
