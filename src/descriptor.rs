//! Image descriptors: a file path plus its fingerprint.
//!
//! A fingerprint is a fixed-size, contrast-normalized, downsampled pixel
//! representation of an image, used as a cheap proxy for its visual
//! content. Two descriptors compare equal iff their paths are equal; the
//! fingerprint never participates in equality or ordering.

use image::imageops::FilterType;
use image::ImageReader;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Width of the fingerprint thumbnail, in pixels.
pub const FINGERPRINT_WIDTH: u32 = 16;
/// Height of the fingerprint thumbnail, in pixels.
pub const FINGERPRINT_HEIGHT: u32 = 16;
/// Interleaved color channels per fingerprint pixel.
pub const FINGERPRINT_CHANNELS: usize = 3;
/// Total byte length of a fingerprint.
pub const FINGERPRINT_LEN: usize =
    (FINGERPRINT_WIDTH as usize) * (FINGERPRINT_HEIGHT as usize) * FINGERPRINT_CHANNELS;

/// Percent of histogram mass clipped from each tail before stretching.
const AUTOCONTRAST_CUTOFF_PERCENT: u32 = 5;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
}

/// Read-only descriptor of one input image.
#[derive(Clone)]
pub struct ImageDescriptor {
    path: PathBuf,
    fingerprint: Vec<u8>,
}

impl ImageDescriptor {
    /// Decode the image at `path` and compute its fingerprint.
    ///
    /// The image is converted to RGB, downsampled to
    /// [`FINGERPRINT_WIDTH`]×[`FINGERPRINT_HEIGHT`] with nearest-neighbor
    /// filtering, and contrast-normalized so that differently exposed
    /// copies of the same image fingerprint similarly.
    ///
    /// Errors are per-file; the caller decides whether to skip the file or
    /// abort the batch.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, DecodeError> {
        let path = path.into();
        let img = ImageReader::open(&path)?.decode()?;
        let small = img
            .resize_exact(FINGERPRINT_WIDTH, FINGERPRINT_HEIGHT, FilterType::Nearest)
            .to_rgb8();

        let mut fingerprint = small.into_raw();
        debug_assert_eq!(fingerprint.len(), FINGERPRINT_LEN);
        autocontrast(&mut fingerprint);

        Ok(Self { path, fingerprint })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Row-major, RGB-interleaved fingerprint bytes.
    pub fn fingerprint(&self) -> &[u8] {
        &self.fingerprint
    }

    #[cfg(test)]
    pub(crate) fn from_parts(path: impl Into<PathBuf>, fingerprint: Vec<u8>) -> Self {
        assert_eq!(fingerprint.len(), FINGERPRINT_LEN);
        Self {
            path: path.into(),
            fingerprint,
        }
    }
}

// Identity is the file path alone. Two descriptors for the same path are
// interchangeable even if their fingerprints were computed at different
// times.
impl PartialEq for ImageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ImageDescriptor {}

impl Hash for ImageDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for ImageDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ImageDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

impl fmt::Debug for ImageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageDescriptor")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Per-channel contrast normalization.
///
/// Clips [`AUTOCONTRAST_CUTOFF_PERCENT`] percent of histogram mass from
/// each tail of every channel, then linearly stretches the remaining
/// range to 0–255. Channels whose clipped range is empty (uniform images)
/// are left unchanged.
fn autocontrast(data: &mut [u8]) {
    for channel in 0..FINGERPRINT_CHANNELS {
        let mut histogram = [0u32; 256];
        for v in data.iter().skip(channel).step_by(FINGERPRINT_CHANNELS) {
            histogram[*v as usize] += 1;
        }

        let total: u32 = histogram.iter().sum();
        let cut = total * AUTOCONTRAST_CUTOFF_PERCENT / 100;

        let mut lo = 255usize;
        let mut remaining = cut;
        for (level, &count) in histogram.iter().enumerate() {
            if count > remaining {
                lo = level;
                break;
            }
            remaining -= count;
        }

        let mut hi = 0usize;
        let mut remaining = cut;
        for (level, &count) in histogram.iter().enumerate().rev() {
            if count > remaining {
                hi = level;
                break;
            }
            remaining -= count;
        }

        if hi <= lo {
            continue;
        }

        let span = (hi - lo) as f64;
        for v in data.iter_mut().skip(channel).step_by(FINGERPRINT_CHANNELS) {
            let clamped = (*v as usize).clamp(lo, hi);
            *v = ((clamped - lo) as f64 * 255.0 / span).round() as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn save_image(path: &Path, pixel: impl Fn(u32, u32) -> [u8; 3]) {
        let img = ImageBuffer::from_fn(64, 64, |x, y| Rgb(pixel(x, y)));
        img.save(path).unwrap();
    }

    #[test]
    fn identity_is_path_only() {
        let a = ImageDescriptor::from_parts("a.png", vec![0; FINGERPRINT_LEN]);
        let a_recomputed = ImageDescriptor::from_parts("a.png", vec![255; FINGERPRINT_LEN]);
        let b = ImageDescriptor::from_parts("b.png", vec![0; FINGERPRINT_LEN]);

        // stale and fresh fingerprints for the same path are interchangeable
        assert_eq!(a, a_recomputed);
        assert_ne!(a, b);

        use std::collections::hash_map::DefaultHasher;
        let hash = |d: &ImageDescriptor| {
            let mut h = DefaultHasher::new();
            d.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&a_recomputed));

        assert!(a < b);
    }

    #[test]
    fn fingerprint_has_fixed_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gradient.png");
        save_image(&path, |x, y| [(x * 4) as u8, (y * 4) as u8, 128]);

        let desc = ImageDescriptor::from_path(&path).unwrap();
        assert_eq!(desc.fingerprint().len(), FINGERPRINT_LEN);
    }

    #[test]
    fn identical_files_identical_fingerprints() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.png");
        let second = dir.path().join("second.png");
        save_image(&first, |x, y| [(x + y) as u8, x as u8, y as u8]);
        save_image(&second, |x, y| [(x + y) as u8, x as u8, y as u8]);

        let a = ImageDescriptor::from_path(&first).unwrap();
        let b = ImageDescriptor::from_path(&second).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn unreadable_file_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.png");
        assert!(ImageDescriptor::from_path(&missing).is_err());

        let corrupt = dir.path().join("corrupt.png");
        std::fs::write(&corrupt, b"not an image").unwrap();
        assert!(ImageDescriptor::from_path(&corrupt).is_err());
    }

    #[test]
    fn autocontrast_stretches_to_full_range() {
        let mut data = vec![0u8; FINGERPRINT_LEN];
        for (i, v) in data.iter_mut().enumerate() {
            // half the pixels at 50, half at 150, in every channel
            *v = if (i / FINGERPRINT_CHANNELS) % 2 == 0 { 50 } else { 150 };
        }

        autocontrast(&mut data);
        assert!(data.iter().all(|&v| v == 0 || v == 255));
    }

    #[test]
    fn autocontrast_leaves_uniform_images_unchanged() {
        let mut data = vec![77u8; FINGERPRINT_LEN];
        autocontrast(&mut data);
        assert!(data.iter().all(|&v| v == 77));
    }
}
