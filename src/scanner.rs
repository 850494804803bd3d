//! Directory traversal and image discovery.
//!
//! Thin boundary around `walkdir`: extension filtering, a symlink
//! policy, and a configurable per-entry error policy. The similarity
//! pipeline itself never touches the filesystem beyond this and the
//! fingerprint decoding.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// File extensions treated as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("error listing directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// When to follow symbolic links during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymlinkPolicy {
    /// Never follow any symbolic links.
    Never,
    /// Follow all symbolic links.
    #[default]
    Always,
    /// Only follow symlinks pointing to directories.
    Directories,
    /// Only follow symlinks pointing to files.
    Files,
}

/// What to do when a directory entry cannot be listed.
#[derive(Debug, Clone, Copy)]
pub enum ErrorPolicy {
    /// Propagate the error and stop the scan.
    Abort,
    /// Skip the entry silently.
    Ignore,
    /// Log a warning and continue.
    Warn,
    /// Invoke a caller-supplied handler and continue.
    Custom(fn(&walkdir::Error)),
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub follow_symlinks: SymlinkPolicy,
    pub on_error: ErrorPolicy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            follow_symlinks: SymlinkPolicy::default(),
            on_error: ErrorPolicy::Warn,
        }
    }
}

/// Recursively collect image file paths under `root`.
///
/// Results are sorted by path so downstream runs are reproducible.
pub fn discover_images(root: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::InvalidPath {
            path: root.to_string_lossy().to_string(),
        });
    }

    let follow = matches!(
        options.follow_symlinks,
        SymlinkPolicy::Always | SymlinkPolicy::Directories
    );

    let mut images = Vec::new();
    for entry in WalkDir::new(root).follow_links(follow) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => match options.on_error {
                ErrorPolicy::Abort => return Err(err.into()),
                ErrorPolicy::Ignore => continue,
                ErrorPolicy::Warn => {
                    log::warn!("error listing entry under {}: {}", root.display(), err);
                    continue;
                }
                ErrorPolicy::Custom(handler) => {
                    handler(&err);
                    continue;
                }
            },
        };

        let path = entry.path();
        match options.follow_symlinks {
            SymlinkPolicy::Never if entry.path_is_symlink() => continue,
            // with follow_links enabled, file symlinks are resolved and
            // report the target's file type
            SymlinkPolicy::Directories
                if entry.path_is_symlink() && entry.file_type().is_file() =>
            {
                continue
            }
            _ => {}
        }

        if !path.is_file() {
            continue;
        }

        if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
            if IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                images.push(path.to_path_buf());
            }
        }
    }

    images.sort();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn filters_by_extension_and_recurses() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("b.PNG"));
        touch(&dir.path().join("notes.txt"));
        touch(&sub.join("c.webp"));

        let images = discover_images(dir.path(), &ScanOptions::default()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(images.len(), 3);
        assert!(names.contains(&"a.jpg".to_string()));
        assert!(names.contains(&"b.PNG".to_string()));
        assert!(names.contains(&"c.webp".to_string()));
    }

    #[test]
    fn results_are_sorted() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("z.jpg"));
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("m.jpg"));

        let images = discover_images(dir.path(), &ScanOptions::default()).unwrap();
        let mut sorted = images.clone();
        sorted.sort();
        assert_eq!(images, sorted);
    }

    #[test]
    fn rejects_nonexistent_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            discover_images(&missing, &ScanOptions::default()),
            Err(ScanError::InvalidPath { .. })
        ));
    }

    // a dangling symlink makes walkdir yield an error entry when links
    // are followed
    #[cfg(unix)]
    fn dangle(dir: &Path) {
        std::os::unix::fs::symlink(dir.join("missing.jpg"), dir.join("broken.jpg")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn abort_policy_propagates_walk_errors() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("good.jpg"));
        dangle(dir.path());

        let abort = ScanOptions {
            on_error: ErrorPolicy::Abort,
            ..ScanOptions::default()
        };
        assert!(matches!(
            discover_images(dir.path(), &abort),
            Err(ScanError::Walk(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn ignore_policy_skips_broken_entries() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("good.jpg"));
        dangle(dir.path());

        let ignore = ScanOptions {
            on_error: ErrorPolicy::Ignore,
            ..ScanOptions::default()
        };
        let images = discover_images(dir.path(), &ignore).unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].ends_with("good.jpg"));
    }

    #[cfg(unix)]
    #[test]
    fn custom_policy_invokes_the_handler() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static SEEN: AtomicUsize = AtomicUsize::new(0);
        fn record(_: &walkdir::Error) {
            SEEN.fetch_add(1, Ordering::SeqCst);
        }

        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("good.jpg"));
        dangle(dir.path());

        let custom = ScanOptions {
            on_error: ErrorPolicy::Custom(record),
            ..ScanOptions::default()
        };
        let images = discover_images(dir.path(), &custom).unwrap();
        assert_eq!(images.len(), 1);
        assert!(SEEN.load(Ordering::SeqCst) >= 1);
    }

    #[cfg(unix)]
    fn symlink_fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let album = dir.path().join("album");
        fs::create_dir(&album).unwrap();
        touch(&album.join("inside.jpg"));
        touch(&dir.path().join("plain.jpg"));
        std::os::unix::fs::symlink(&album, dir.path().join("album_link")).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("plain.jpg"),
            dir.path().join("file_link.jpg"),
        )
        .unwrap();
        dir
    }

    #[cfg(unix)]
    #[test]
    fn directories_policy_follows_only_directory_symlinks() {
        let dir = symlink_fixture();

        let options = ScanOptions {
            follow_symlinks: SymlinkPolicy::Directories,
            ..ScanOptions::default()
        };
        let images = discover_images(dir.path(), &options).unwrap();

        // the directory symlink is descended into
        assert!(images
            .iter()
            .any(|p| p.starts_with(dir.path().join("album_link"))));
        // the file symlink is dropped, its target still found directly
        assert!(!images.iter().any(|p| p.ends_with("file_link.jpg")));
        assert!(images.iter().any(|p| p.ends_with("plain.jpg")));
    }

    #[cfg(unix)]
    #[test]
    fn files_policy_follows_only_file_symlinks() {
        let dir = symlink_fixture();

        let options = ScanOptions {
            follow_symlinks: SymlinkPolicy::Files,
            ..ScanOptions::default()
        };
        let images = discover_images(dir.path(), &options).unwrap();

        assert!(images.iter().any(|p| p.ends_with("file_link.jpg")));
        // the directory symlink is not descended into; the real
        // directory still is
        assert!(!images
            .iter()
            .any(|p| p.starts_with(dir.path().join("album_link"))));
        assert!(images.iter().any(|p| p.ends_with("inside.jpg")));
    }

    #[cfg(unix)]
    #[test]
    fn never_policy_skips_symlinked_files() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("real.jpg");
        touch(&target);
        std::os::unix::fs::symlink(&target, dir.path().join("link.jpg")).unwrap();

        let never = ScanOptions {
            follow_symlinks: SymlinkPolicy::Never,
            ..ScanOptions::default()
        };
        let images = discover_images(dir.path(), &never).unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].ends_with("real.jpg"));

        let always = ScanOptions::default();
        let images = discover_images(dir.path(), &always).unwrap();
        assert_eq!(images.len(), 2);
    }
}
