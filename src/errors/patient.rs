pub use snafu::Snafu;
use std::path::PathBuf;

use crate::radiomics::ExtractorError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
/// Reasons a single patient contributes no row to the dataset
pub enum PatientError {
    #[snafu(display("no mask found for {} (tried {})", id, candidates.join(", ")))]
    MissingMask { id: String, candidates: Vec<String> },

    #[snafu(display("patient id '{}' from {} is not an integer", id, path.display()))]
    InvalidId { id: String, path: PathBuf },

    #[snafu(display("patient id {} from {} was already seen", id, path.display()))]
    DuplicateId { id: i64, path: PathBuf },

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
    DimensionMismatch {
        image_width: u32,
        image_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    #[snafu(display("mask {} has no foreground pixels", path.display()))]
    EmptyRegion { path: PathBuf },

    #[snafu(display("radiomic extraction failed: {}", source))]
    Extractor {
        #[snafu(source(from(ExtractorError, Box::new)))]
        source: Box<ExtractorError>,
    },
}

/// Coarse grouping used for the run summary and the failure policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    MissingMask,
    InvalidId,
    Unreadable,
    EmptyRegion,
    ExtractorFailure,
}

impl PatientError {
    pub fn reason(&self) -> SkipReason {
        match self {
            PatientError::MissingMask { .. } => SkipReason::MissingMask,
            PatientError::InvalidId { .. } | PatientError::DuplicateId { .. } => {
                SkipReason::InvalidId
            }
            PatientError::ReadImage { .. }
            | PatientError::ReadMask { .. }
            | PatientError::DimensionMismatch { .. } => SkipReason::Unreadable,
            PatientError::EmptyRegion { .. } => SkipReason::EmptyRegion,
            PatientError::Extractor { .. } => SkipReason::ExtractorFailure,
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            SkipReason::MissingMask => "missing mask",
            SkipReason::InvalidId => "invalid id",
            SkipReason::Unreadable => "unreadable input",
            SkipReason::EmptyRegion => "empty region",
            SkipReason::ExtractorFailure => "extractor failure",
        };
        write!(f, "{}", reason)
    }
}
