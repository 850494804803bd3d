//! Cross-cell similarity voting and candidate selection.
//!
//! Every grid cell contributes one vote for each pair of images whose
//! cell averages landed in the same tolerance group. Images whose vote
//! total meets the configured ratio of cells form candidate clusters.
//!
//! All maps are `BTreeMap`s keyed by descriptor path order, so merging
//! and iteration are explicitly ordered and the pipeline output is
//! reproducible regardless of input ordering.

use crate::descriptor::ImageDescriptor;
use crate::quadrants::QuadrantAverages;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Per-image co-occurrence counts: image → (other image → votes).
pub type SimilarCounts = BTreeMap<Arc<ImageDescriptor>, BTreeMap<Arc<ImageDescriptor>, u32>>;

/// A set of images believed mutually similar.
pub type Cluster = BTreeSet<Arc<ImageDescriptor>>;

/// Count co-occurrences within one cell's tolerance groups.
///
/// For `groups = [{a, b, c}, {a, d}]` the result is
/// `{a: {b: 1, c: 1, d: 1}, b: {a: 1, c: 1}, c: {a: 1, b: 1}, d: {a: 1}}`.
pub fn count_quadrant(groups: &[Vec<&QuadrantAverages>]) -> SimilarCounts {
    let mut image_counts = SimilarCounts::new();

    for group in groups {
        for quadavg in group {
            let im = quadavg.descriptor();
            let counts = image_counts.entry(Arc::clone(im)).or_default();

            for other_quadavg in group {
                let other_im = other_quadavg.descriptor();
                if other_im != im {
                    *counts.entry(Arc::clone(other_im)).or_insert(0) += 1;
                }
            }
        }
    }

    image_counts
}

/// Sum per-cell counts into one map.
pub fn merge_counts(per_cell: impl IntoIterator<Item = SimilarCounts>) -> SimilarCounts {
    let mut merged = SimilarCounts::new();

    for cell_counts in per_cell {
        for (im, counts) in cell_counts {
            let entry = merged.entry(im).or_default();
            for (other_im, votes) in counts {
                *entry.entry(other_im).or_insert(0) += votes;
            }
        }
    }

    merged
}

/// Threshold merged counts into candidate clusters.
///
/// An image whose vote count against another image reaches
/// `floor(cells * similar_ratio)` joins that image's neighborhood; every
/// non-empty neighborhood plus the image itself becomes one candidate
/// cluster. Distinct clusters may share members.
pub fn select_candidates(
    counts: &SimilarCounts,
    cells: usize,
    similar_ratio: f64,
) -> BTreeSet<Cluster> {
    let min_similar = (cells as f64 * similar_ratio) as u32;

    let mut candidates = BTreeSet::new();
    for (im, im_counts) in counts {
        let mut similar_to_im: Cluster = im_counts
            .iter()
            .filter(|(_, &votes)| votes >= min_similar)
            .map(|(other_im, _)| Arc::clone(other_im))
            .collect();

        if !similar_to_im.is_empty() {
            similar_to_im.insert(Arc::clone(im));
            candidates.insert(similar_to_im);
        }
    }

    candidates
}
