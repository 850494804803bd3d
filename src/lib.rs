//! imgsim — find groups of visually similar images among many.
//!
//! Images are reduced to compact fingerprints, subdivided into grid
//! cells, and grouped per cell by numeric proximity of the cell
//! averages. Images that land in the same group across enough cells form
//! candidate clusters, which are then refined with finer grids to prune
//! false positives. No pairwise full-image comparison takes place.
//!
//! ```no_run
//! use imgsim::{find_similar, SimilarityConfig};
//! use std::path::PathBuf;
//!
//! let paths = vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")];
//! let clusters = find_similar(&paths, &SimilarityConfig::default())?;
//! for cluster in &clusters {
//!     for image in cluster {
//!         println!("{}", image.path().display());
//!     }
//!     println!("--------");
//! }
//! # Ok::<(), imgsim::PipelineError>(())
//! ```

pub mod config;
pub mod counting;
pub mod descriptor;
pub mod grouping;
pub mod pipeline;
pub mod quadrants;
pub mod scanner;

pub use config::SimilarityConfig;
pub use counting::{Cluster, SimilarCounts};
pub use descriptor::{DecodeError, ImageDescriptor};
pub use grouping::{group_by, without_pair_subsets, without_subsets};
pub use pipeline::{find_similar, find_similar_descriptors, load_descriptors, PipelineError};
pub use quadrants::{quadrant_averages, GridError, QuadrantAverages};
pub use scanner::{discover_images, ErrorPolicy, ScanError, ScanOptions, SymlinkPolicy};
