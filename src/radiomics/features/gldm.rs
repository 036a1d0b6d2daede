use super::{FeatureClass, LevelSizeMatrix, NamedValues, NEIGHBOURS};
use crate::radiomics::params::FeatureClassKind;
use crate::radiomics::roi::Roi;
use crate::radiomics::{DegenerateMatrixSnafu, ExtractorError};

/// Dependence counts: each pixel counts itself plus the 8-neighbours in the region whose
/// level differs from its own by at most `alpha`.
pub fn dependences(roi: &Roi, alpha: u32) -> LevelSizeMatrix {
    let mut matrix = LevelSizeMatrix::new(roi.n_levels(), NEIGHBOURS.len() + 1);
    for (r, c, level) in roi.pixels() {
        let dependent = NEIGHBOURS
            .iter()
            .filter_map(|&(dr, dc)| roi.level_at(r + dr, c + dc))
            .filter(|&other| (other as i64 - level as i64).unsigned_abs() <= alpha as u64)
            .count();
        matrix.add(level, dependent + 1);
    }
    matrix
}

/// Gray level dependence features.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gldm {
    pub alpha: u32,
}

impl FeatureClass for Gldm {
    fn kind(&self) -> FeatureClassKind {
        FeatureClassKind::Gldm
    }

    fn compute(&self, roi: &Roi) -> Result<NamedValues, ExtractorError> {
        let Some(s) = dependences(roi, self.alpha).stats() else {
            return DegenerateMatrixSnafu { class: self.kind() }.fail();
        };
        Ok(vec![
            ("SmallDependenceEmphasis", s.small_emphasis),
            ("LargeDependenceEmphasis", s.large_emphasis),
            ("GrayLevelNonUniformity", s.level_non_uniformity),
            ("DependenceNonUniformity", s.size_non_uniformity),
            (
                "DependenceNonUniformityNormalized",
                s.size_non_uniformity_normalized,
            ),
            ("GrayLevelVariance", s.level_variance),
            ("DependenceVariance", s.size_variance),
            ("DependenceEntropy", s.entropy),
            ("LowGrayLevelEmphasis", s.low_level_emphasis),
            ("HighGrayLevelEmphasis", s.high_level_emphasis),
            (
                "SmallDependenceLowGrayLevelEmphasis",
                s.small_low_level_emphasis,
            ),
            (
                "SmallDependenceHighGrayLevelEmphasis",
                s.small_high_level_emphasis,
            ),
            (
                "LargeDependenceLowGrayLevelEmphasis",
                s.large_low_level_emphasis,
            ),
            (
                "LargeDependenceHighGrayLevelEmphasis",
                s.large_high_level_emphasis,
            ),
        ])
    }
}
