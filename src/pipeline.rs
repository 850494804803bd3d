//! Pipeline orchestration: fingerprinting, per-cell grouping, vote
//! counting and iterative refinement.
//!
//! Each stage is a synchronization barrier: all tasks of one stage
//! complete before the next stage starts. On any error the remaining
//! work is dropped and the error propagates; no partial results are
//! returned and nothing is retried.

use crate::config::SimilarityConfig;
use crate::counting::{count_quadrant, merge_counts, select_candidates, Cluster, SimilarCounts};
use crate::descriptor::{DecodeError, ImageDescriptor};
use crate::grouping::group_by;
use crate::quadrants::{quadrant_averages, validate_grid, GridError, QuadrantAverages};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Find clusters of visually similar images among `paths`.
///
/// Fingerprints every file (in parallel, one task per image), then runs
/// the grouping/counting/selection pipeline once per entry of the grid
/// schedule, each pass refining the previous pass's candidate clusters
/// with a finer subdivision.
///
/// The whole schedule is validated before any parallel work starts. A
/// `DecodeError` on any file aborts the search; use
/// [`load_descriptors`] plus [`find_similar_descriptors`] to skip
/// undecodable files instead. Empty input yields an empty result.
///
/// Returned clusters may overlap. Output is deterministic for a fixed
/// input set regardless of input ordering.
pub fn find_similar(
    paths: &[PathBuf],
    config: &SimilarityConfig,
) -> Result<BTreeSet<Cluster>, PipelineError> {
    validate_schedule(config)?;
    if paths.is_empty() {
        return Ok(BTreeSet::new());
    }

    let pool = worker_pool(config.worker_count)?;
    pool.install(|| -> Result<BTreeSet<Cluster>, PipelineError> {
        let descriptors = paths
            .par_iter()
            .map(|path| ImageDescriptor::from_path(path).map(Arc::new))
            .collect::<Result<Vec<_>, DecodeError>>()?;

        Ok(refine_schedule(descriptors, config)?)
    })
}

/// [`find_similar`] over descriptors that are already fingerprinted.
pub fn find_similar_descriptors(
    descriptors: Vec<Arc<ImageDescriptor>>,
    config: &SimilarityConfig,
) -> Result<BTreeSet<Cluster>, PipelineError> {
    validate_schedule(config)?;
    if descriptors.is_empty() {
        return Ok(BTreeSet::new());
    }

    let pool = worker_pool(config.worker_count)?;
    pool.install(|| Ok(refine_schedule(descriptors, config)?))
}

/// Fingerprint many files in parallel, reporting per-file outcomes.
///
/// Unlike [`find_similar`], one unreadable file does not abort the batch;
/// the caller decides whether to skip it or give up.
pub fn load_descriptors(
    paths: &[PathBuf],
    worker_count: Option<usize>,
) -> Result<Vec<(PathBuf, Result<Arc<ImageDescriptor>, DecodeError>)>, PipelineError> {
    let pool = worker_pool(worker_count)?;
    Ok(pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                (
                    path.clone(),
                    ImageDescriptor::from_path(path).map(Arc::new),
                )
            })
            .collect()
    }))
}

fn worker_pool(worker_count: Option<usize>) -> Result<ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count.unwrap_or_else(num_cpus::get))
        .build()
}

/// Fail on any grid of the schedule that does not divide the fingerprint.
fn validate_schedule(config: &SimilarityConfig) -> Result<(), GridError> {
    for &(n_x, n_y) in &config.grid_schedule {
        validate_grid(n_x, n_y)?;
    }
    Ok(())
}

/// Run every pass of the grid schedule over a seed cluster of all images.
fn refine_schedule(
    descriptors: Vec<Arc<ImageDescriptor>>,
    config: &SimilarityConfig,
) -> Result<BTreeSet<Cluster>, GridError> {
    if config.grid_schedule.is_empty() {
        return Ok(BTreeSet::new());
    }

    let seed: Cluster = descriptors.into_iter().collect();
    let mut candidates = BTreeSet::from([seed]);

    for &(n_x, n_y) in &config.grid_schedule {
        candidates = refine_candidates(&candidates, config, n_x, n_y)?;
        log::info!(
            "refinement at {}x{} produced {} candidate cluster(s)",
            n_x,
            n_y,
            candidates.len()
        );
    }

    Ok(candidates)
}

/// Refine candidate clusters with a finer grid.
///
/// Each cluster is re-clustered independently, using only its own members
/// as the input population. Clusters are visited in their canonical
/// (path) order so the union is reproducible. Every refined cluster is a
/// subset of the candidate that produced it.
pub fn refine_candidates(
    candidates: &BTreeSet<Cluster>,
    config: &SimilarityConfig,
    n_x: usize,
    n_y: usize,
) -> Result<BTreeSet<Cluster>, GridError> {
    let mut refined = BTreeSet::new();

    for candidate_group in candidates {
        let members: Vec<Arc<ImageDescriptor>> = candidate_group.iter().cloned().collect();
        refined.extend(similar_candidates(&members, config, n_x, n_y)?);
    }

    Ok(refined)
}

/// One full pass at one grid resolution: averages → per-cell groups →
/// per-cell counts → merged counts → thresholded candidates.
fn similar_candidates(
    descriptors: &[Arc<ImageDescriptor>],
    config: &SimilarityConfig,
    n_x: usize,
    n_y: usize,
) -> Result<BTreeSet<Cluster>, GridError> {
    // one task per image
    let all_quads = descriptors
        .par_iter()
        .map(|imdesc| quadrant_averages(imdesc, n_x, n_y))
        .collect::<Result<Vec<_>, GridError>>()?;

    // one task per cell index
    let cells = n_x * n_y;
    let grouped: Vec<Vec<Vec<&QuadrantAverages>>> = (0..cells)
        .into_par_iter()
        .map(|cell| group_cell(&all_quads, config.tolerance, cell))
        .collect();

    let per_cell: Vec<SimilarCounts> = grouped
        .par_iter()
        .map(|groups| count_quadrant(groups))
        .collect();

    let merged = merge_counts(per_cell);
    Ok(select_candidates(&merged, cells, config.similar_ratio))
}

/// Group one cell's averages across all images.
///
/// A named task taking the cell index by value; the per-cell work is
/// dispatched through this single function rather than through one
/// capturing closure per cell.
fn group_cell(
    all_quads: &[QuadrantAverages],
    tolerance: f64,
    cell: usize,
) -> Vec<Vec<&QuadrantAverages>> {
    group_by(all_quads, tolerance, false, |quads| quads.averages()[cell])
}
