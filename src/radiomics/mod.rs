//! Radiomic texture features behind a file-based extractor contract.
//!
//! An extractor receives an image path, a mask path and the mask label selecting the region,
//! and returns named scalars. [`RadiomicAdapter`] owns the transient mask file handed to the
//! extractor and keeps only the second-order texture families of its output.

pub mod features;
pub mod native;
pub mod params;
pub mod roi;

pub use native::NativeExtractor;
pub use params::{FeatureClassKind, ParamsError, RadiomicsParams};

use image::ImageFormat;
use snafu::{ResultExt, Snafu};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::mask::BinaryMask;

/// Ordered feature names and values as produced by an extractor.
pub type FeatureMap = Vec<(String, f64)>;

/// Name markers of the second-order texture families, matched case-insensitively.
pub const TEXTURE_FAMILIES: [&str; 5] = ["glcm", "glrlm", "glszm", "gldm", "ngtdm"];

/// Mask value the adapter writes for the region of interest.
pub const REGION_LABEL: u8 = 1;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExtractorError {
    #[snafu(display("error reading image {}", path.display()))]
    ReadImage {
        path: PathBuf,
        #[snafu(source(from(image::ImageError, Box::new)))]
        source: Box<image::ImageError>,
    },

    #[snafu(display("error reading mask {}", path.display()))]
    ReadMask {
        path: PathBuf,
        #[snafu(source(from(image::ImageError, Box::new)))]
        source: Box<image::ImageError>,
    },

    #[snafu(display(
        "mask is {}x{} but image is {}x{}",
        mask_width,
        mask_height,
        image_width,
        image_height
    ))]
    ShapeMismatch {
        image_width: usize,
        image_height: usize,
        mask_width: usize,
        mask_height: usize,
    },

    #[snafu(display("region has {} pixels, at least {} required", count, minimum))]
    RegionTooSmall { count: usize, minimum: usize },

    #[snafu(display("region spans {} gray levels, at most {} supported", levels, maximum))]
    TooManyLevels { levels: usize, maximum: usize },

    #[snafu(display("{} matrix is empty for this region", class))]
    DegenerateMatrix { class: FeatureClassKind },

    #[snafu(display("error creating transient mask file"))]
    CreateTransient {
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("error writing transient mask {}", path.display()))]
    WriteTransient {
        path: PathBuf,
        #[snafu(source(from(image::ImageError, Box::new)))]
        source: Box<image::ImageError>,
    },

    #[snafu(display("error flushing transient mask {}", path.display()))]
    FlushTransient {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("{}", message))]
    Failed { message: String },
}

/// A texture-feature extractor with a file-based contract.
///
/// Implementations are shared across worker threads for the whole run.
pub trait RadiomicExtractor: Send + Sync {
    fn execute(&self, image: &Path, mask: &Path, label: u8)
        -> Result<FeatureMap, ExtractorError>;
}

pub fn is_texture_feature(name: &str) -> bool {
    let name = name.to_lowercase();
    TEXTURE_FAMILIES.iter().any(|family| name.contains(family))
}

/// Keep only texture family entries, preserving order.
pub fn texture_features(features: FeatureMap) -> FeatureMap {
    features
        .into_iter()
        .filter(|(name, _)| is_texture_feature(name))
        .collect()
}

/// A mask written to a uniquely named PNG for the duration of one extractor call.
///
/// The file is removed by [`TransientMask::release`], or on drop if release is never reached.
struct TransientMask {
    file: tempfile::NamedTempFile,
}

impl TransientMask {
    fn write(mask: &BinaryMask, label: u8, dir: Option<&Path>) -> Result<Self, ExtractorError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("mask-").suffix(".png");
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context(CreateTransientSnafu)?;

        let path = file.path().to_path_buf();
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            mask.to_image_with_label(label)
                .write_to(&mut writer, ImageFormat::Png)
                .context(WriteTransientSnafu { path: &path })?;
            writer.flush().context(FlushTransientSnafu { path: &path })?;
        }
        Ok(Self { file })
    }

    fn path(&self) -> &Path {
        self.file.path()
    }

    fn release(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!("Failed to remove transient mask {}: {}", path.display(), e);
        }
    }
}

/// Runs an injected extractor on one region and keeps its texture features.
#[derive(Clone)]
pub struct RadiomicAdapter {
    extractor: Arc<dyn RadiomicExtractor>,
    label: u8,
    scratch_dir: Option<PathBuf>,
}

impl std::fmt::Debug for RadiomicAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadiomicAdapter")
            .field("label", &self.label)
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

impl RadiomicAdapter {
    pub fn new(extractor: Arc<dyn RadiomicExtractor>) -> Self {
        Self {
            extractor,
            label: REGION_LABEL,
            scratch_dir: None,
        }
    }

    pub fn with_label(mut self, label: u8) -> Self {
        self.label = label;
        self
    }

    /// Write transient masks into `dir` instead of the system temp directory.
    pub fn with_scratch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn extract(&self, image: &Path, mask: &BinaryMask) -> Result<FeatureMap, ExtractorError> {
        let transient = TransientMask::write(mask, self.label, self.scratch_dir.as_deref())?;
        tracing::debug!(
            "Running extractor on {} with mask {}",
            image.display(),
            transient.path().display()
        );
        let result = self.extractor.execute(image, transient.path(), self.label);
        transient.release();
        Ok(texture_features(result?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};
    use rstest::rstest;
    use std::sync::Mutex;

    /// Records the mask it was handed and returns a fixed set of features.
    struct RecordingExtractor {
        seen: Mutex<Vec<(PathBuf, GrayImage, u8)>>,
        fail: bool,
    }

    impl RecordingExtractor {
        fn new(fail: bool) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    impl RadiomicExtractor for RecordingExtractor {
        fn execute(
            &self,
            _image: &Path,
            mask: &Path,
            label: u8,
        ) -> Result<FeatureMap, ExtractorError> {
            let decoded = image::open(mask).unwrap().to_luma8();
            self.seen
                .lock()
                .unwrap()
                .push((mask.to_path_buf(), decoded, label));
            if self.fail {
                return FailedSnafu {
                    message: "extractor exploded",
                }
                .fail();
            }
            Ok(vec![
                ("diagnostics_Mask-original_VoxelNum".to_string(), 4.0),
                ("original_firstorder_Mean".to_string(), 1.0),
                ("original_glcm_Contrast".to_string(), 2.0),
                ("original_shape2D_Perimeter".to_string(), 3.0),
                ("original_GLRLM_RunEntropy".to_string(), 4.0),
                ("original_ngtdm_Busyness".to_string(), 5.0),
            ])
        }
    }

    fn square_mask() -> BinaryMask {
        BinaryMask::from_image(&DynamicImage::ImageLuma8(GrayImage::from_fn(4, 4, |x, y| {
            Luma([if (1..3).contains(&x) && (1..3).contains(&y) { 255 } else { 0 }])
        })))
    }

    #[rstest]
    #[case("original_glcm_Contrast", true)]
    #[case("original_GLSZM_ZoneEntropy", true)]
    #[case("original_gldm_DependenceEntropy", true)]
    #[case("original_ngtdm_Strength", true)]
    #[case("original_glrlm_RunPercentage", true)]
    #[case("original_firstorder_Mean", false)]
    #[case("original_shape2D_Elongation", false)]
    #[case("diagnostics_Versions_PyRadiomics", false)]
    fn test_texture_filter(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_texture_feature(name), expected);
    }

    #[test]
    fn test_extract_filters_and_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor = Arc::new(RecordingExtractor::new(false));
        let adapter = RadiomicAdapter::new(extractor.clone()).with_scratch_dir(scratch.path());

        let features = adapter
            .extract(Path::new("7.png"), &square_mask())
            .unwrap();
        let names: Vec<_> = features.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "original_glcm_Contrast",
                "original_GLRLM_RunEntropy",
                "original_ngtdm_Busyness"
            ]
        );

        let seen = extractor.seen.lock().unwrap();
        let (path, mask, label) = &seen[0];
        assert_eq!(*label, REGION_LABEL);
        assert_eq!(mask.get_pixel(1, 1)[0], 1);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert!(mask.pixels().all(|p| p[0] <= 1));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_extract_failure_still_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor = Arc::new(RecordingExtractor::new(true));
        let adapter = RadiomicAdapter::new(extractor.clone()).with_scratch_dir(scratch.path());

        let result = adapter.extract(Path::new("7.png"), &square_mask());
        assert!(matches!(result, Err(ExtractorError::Failed { .. })));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    /// Panics mid-extraction after confirming the mask exists.
    struct PanickingExtractor {
        seen: Mutex<Option<PathBuf>>,
    }

    impl RadiomicExtractor for PanickingExtractor {
        fn execute(
            &self,
            _image: &Path,
            mask: &Path,
            _label: u8,
        ) -> Result<FeatureMap, ExtractorError> {
            assert!(mask.exists());
            *self.seen.lock().unwrap() = Some(mask.to_path_buf());
            panic!("extractor crashed");
        }
    }

    #[test]
    fn test_extract_panic_still_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor = Arc::new(PanickingExtractor {
            seen: Mutex::new(None),
        });
        let adapter = RadiomicAdapter::new(extractor.clone()).with_scratch_dir(scratch.path());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            adapter.extract(Path::new("7.png"), &square_mask())
        }));
        assert!(result.is_err());
        let seen = extractor.seen.lock().unwrap_or_else(|e| e.into_inner());
        assert!(!seen.as_ref().unwrap().exists());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_transient_paths_are_unique() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor = Arc::new(RecordingExtractor::new(false));
        let adapter = RadiomicAdapter::new(extractor.clone()).with_scratch_dir(scratch.path());
        for _ in 0..3 {
            adapter.extract(Path::new("1.png"), &square_mask()).unwrap();
        }
        let seen = extractor.seen.lock().unwrap();
        let mut paths: Vec<_> = seen.iter().map(|(p, _, _)| p.clone()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn test_custom_label_is_written() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor = Arc::new(RecordingExtractor::new(false));
        let adapter = RadiomicAdapter::new(extractor.clone())
            .with_label(2)
            .with_scratch_dir(scratch.path());
        adapter.extract(Path::new("1.png"), &square_mask()).unwrap();
        let seen = extractor.seen.lock().unwrap();
        assert_eq!(seen[0].2, 2);
        assert_eq!(seen[0].1.get_pixel(2, 2)[0], 2);
    }
}
