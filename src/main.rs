use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use imgsim::{
    discover_images, find_similar_descriptors, load_descriptors, without_subsets, Cluster,
    ErrorPolicy, ScanOptions, SimilarityConfig, SymlinkPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "imgsim", version, about = "Find groups of visually similar images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan for groups of similar images
    Scan {
        /// Directory to scan recursively
        #[arg(short, long, value_name = "DIR", conflicts_with = "files")]
        path: Option<PathBuf>,

        /// Explicit image files to compare (instead of a directory)
        #[arg(value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Maximum difference between cell averages (0-255)
        #[arg(short, long, default_value_t = 20.0)]
        tolerance: f64,

        /// Grid schedule, coarse to fine, e.g. "4x4,16x16"
        #[arg(long, default_value = "4x4,16x16")]
        grids: String,

        /// Fraction of grid cells that must match
        #[arg(long, default_value_t = 0.6)]
        ratio: f64,

        /// Worker threads (default: all CPUs)
        #[arg(long)]
        workers: Option<usize>,

        /// When to follow symbolic links
        #[arg(long, value_enum, default_value = "always")]
        follow_symlinks: FollowSymlinks,

        /// What to do when a directory entry cannot be listed
        #[arg(long, value_enum, default_value = "print")]
        on_error: OnError,

        /// Skip files that fail to decode instead of aborting
        #[arg(long)]
        skip_undecodable: bool,

        /// Drop clusters wholly contained in other clusters
        #[arg(long)]
        prune_nested: bool,

        /// Print clusters as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FollowSymlinks {
    Never,
    Always,
    Directory,
    File,
}

impl From<FollowSymlinks> for SymlinkPolicy {
    fn from(value: FollowSymlinks) -> Self {
        match value {
            FollowSymlinks::Never => SymlinkPolicy::Never,
            FollowSymlinks::Always => SymlinkPolicy::Always,
            FollowSymlinks::Directory => SymlinkPolicy::Directories,
            FollowSymlinks::File => SymlinkPolicy::Files,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OnError {
    Abort,
    Ignore,
    Print,
}

impl From<OnError> for ErrorPolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => ErrorPolicy::Abort,
            OnError::Ignore => ErrorPolicy::Ignore,
            OnError::Print => ErrorPolicy::Warn,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            path,
            files,
            tolerance,
            grids,
            ratio,
            workers,
            follow_symlinks,
            on_error,
            skip_undecodable,
            prune_nested,
            json,
        } => {
            let config = SimilarityConfig {
                tolerance,
                grid_schedule: parse_grid_schedule(&grids)?,
                similar_ratio: ratio,
                worker_count: workers,
            };

            let paths = if !files.is_empty() {
                files
            } else if let Some(dir) = path {
                let options = ScanOptions {
                    follow_symlinks: follow_symlinks.into(),
                    on_error: on_error.into(),
                };
                scan_directory(&dir, &options)?
            } else {
                bail!("either --path or a list of files is required");
            };

            if paths.is_empty() {
                if json {
                    report(&[], true)?;
                } else {
                    println!("No images found.");
                }
                return Ok(());
            }

            eprintln!("▶ Fingerprinting {} image(s)…", paths.len());
            let loaded = benchmark("fingerprinting", || {
                load_descriptors(&paths, config.worker_count)
            })?;

            let mut descriptors = Vec::with_capacity(loaded.len());
            for (file, result) in loaded {
                match result {
                    Ok(descriptor) => descriptors.push(descriptor),
                    Err(err) if skip_undecodable => {
                        log::warn!("skipping {}: {}", file.display(), err);
                        eprintln!("⚠️  Skipping {}: {}", file.display(), err);
                    }
                    Err(err) => {
                        return Err(err)
                            .with_context(|| format!("Failed to decode {}", file.display()));
                    }
                }
            }

            let clusters = benchmark("clustering", || {
                find_similar_descriptors(descriptors, &config)
            })?;

            let clusters: Vec<Cluster> = if prune_nested {
                without_subsets(clusters).into_iter().collect()
            } else {
                clusters.into_iter().collect()
            };

            report(&clusters, json)?;
        }
    }

    Ok(())
}

/// Parse a schedule like "4x4,16x16" into grid dimension pairs.
fn parse_grid_schedule(arg: &str) -> Result<Vec<(usize, usize)>> {
    let mut schedule = Vec::new();
    for grid in arg.split(',') {
        let (n_x, n_y) = grid
            .trim()
            .split_once('x')
            .with_context(|| format!("invalid grid '{grid}', expected e.g. '4x4'"))?;
        schedule.push((
            n_x.parse().with_context(|| format!("invalid grid '{grid}'"))?,
            n_y.parse().with_context(|| format!("invalid grid '{grid}'"))?,
        ));
    }
    Ok(schedule)
}

/// Recursively walk `dir`, returning the image file paths found.
fn scan_directory(dir: &PathBuf, options: &ScanOptions) -> Result<Vec<PathBuf>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let images = discover_images(dir, options)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    spinner.finish_with_message(format!("Found {} image(s)", images.len()));
    Ok(images)
}

#[derive(Serialize, Debug)]
struct JsonReport {
    group_count: usize,
    groups: Vec<Vec<String>>,
}

fn report(clusters: &[Cluster], json: bool) -> Result<()> {
    if json {
        println!("{}", json_report(clusters)?);
        return Ok(());
    }

    if clusters.is_empty() {
        println!("No similar images found.");
    } else {
        println!("Found {} similar group(s):", clusters.len());
        for (i, cluster) in clusters.iter().enumerate() {
            println!(" Group {}:", i + 1);
            for image in cluster {
                println!("   ▶ {}", image.path().display());
            }
        }
    }
    Ok(())
}

/// The whole JSON document printed by `--json`.
fn json_report(clusters: &[Cluster]) -> Result<String> {
    let groups: Vec<Vec<String>> = clusters
        .iter()
        .map(|cluster| {
            cluster
                .iter()
                .map(|image| image.path().to_string_lossy().into_owned())
                .collect()
        })
        .collect();
    let report = JsonReport {
        group_count: groups.len(),
        groups,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Run `f()`, report how long it took (with `label`), and return its result.
///
/// Timing goes to stderr, like all progress chatter, so `--json` output
/// on stdout stays machine-readable.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    eprintln!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
