use super::{mean_over_directions, FeatureClass, LevelSizeMatrix, NamedValues, DIRECTIONS};
use crate::radiomics::params::FeatureClassKind;
use crate::radiomics::roi::Roi;
use crate::radiomics::{DegenerateMatrixSnafu, ExtractorError};

/// Run-length counts along one direction.
pub fn run_lengths(roi: &Roi, (dr, dc): (isize, isize)) -> LevelSizeMatrix {
    let mut matrix = LevelSizeMatrix::new(roi.n_levels(), roi.rows().max(roi.cols()));
    for (r, c, level) in roi.pixels() {
        // Only start counting at the first pixel of a run
        if roi.level_at(r - dr, c - dc) == Some(level) {
            continue;
        }
        let mut length = 1;
        while roi.level_at(r + dr * length as isize, c + dc * length as isize) == Some(level) {
            length += 1;
        }
        matrix.add(level, length);
    }
    matrix
}

/// Gray level run length features, averaged over the four 2D directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Glrlm;

impl FeatureClass for Glrlm {
    fn kind(&self) -> FeatureClassKind {
        FeatureClassKind::Glrlm
    }

    fn compute(&self, roi: &Roi) -> Result<NamedValues, ExtractorError> {
        let pixel_count = roi.pixel_count() as f64;
        let per_direction: Vec<NamedValues> = DIRECTIONS
            .iter()
            .filter_map(|&direction| run_lengths(roi, direction).stats())
            .map(|s| {
                vec![
                    ("ShortRunEmphasis", s.small_emphasis),
                    ("LongRunEmphasis", s.large_emphasis),
                    ("GrayLevelNonUniformity", s.level_non_uniformity),
                    (
                        "GrayLevelNonUniformityNormalized",
                        s.level_non_uniformity_normalized,
                    ),
                    ("RunLengthNonUniformity", s.size_non_uniformity),
                    (
                        "RunLengthNonUniformityNormalized",
                        s.size_non_uniformity_normalized,
                    ),
                    ("RunPercentage", s.total / pixel_count),
                    ("GrayLevelVariance", s.level_variance),
                    ("RunVariance", s.size_variance),
                    ("RunEntropy", s.entropy),
                    ("LowGrayLevelRunEmphasis", s.low_level_emphasis),
                    ("HighGrayLevelRunEmphasis", s.high_level_emphasis),
                    ("ShortRunLowGrayLevelEmphasis", s.small_low_level_emphasis),
                    ("ShortRunHighGrayLevelEmphasis", s.small_high_level_emphasis),
                    ("LongRunLowGrayLevelEmphasis", s.large_low_level_emphasis),
                    ("LongRunHighGrayLevelEmphasis", s.large_high_level_emphasis),
                ]
            })
            .collect();
        if per_direction.is_empty() {
            return DegenerateMatrixSnafu { class: self.kind() }.fail();
        }
        Ok(mean_over_directions(&per_direction))
    }
}
