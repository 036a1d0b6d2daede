use image::{ImageBuffer, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::{FeatureClass, LevelSizeMatrix, NamedValues};
use crate::radiomics::params::FeatureClassKind;
use crate::radiomics::roi::Roi;
use crate::radiomics::{DegenerateMatrixSnafu, ExtractorError};

/// Size-zone counts: 8-connected zones of equal gray level.
pub fn size_zones(roi: &Roi) -> LevelSizeMatrix {
    let levels = roi.levels();
    let image: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(roi.cols() as u32, roi.rows() as u32, |x, y| {
            Luma([levels[[y as usize, x as usize]]])
        });
    // Adjacent pixels only join a component when their values are equal
    let labels = connected_components(&image, Connectivity::Eight, Luma([0u16]));

    let zone_count = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut zones: Vec<(u16, usize)> = vec![(0, 0); zone_count + 1];
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        zones[label].0 = levels[[y as usize, x as usize]];
        zones[label].1 += 1;
    }

    let mut matrix = LevelSizeMatrix::new(roi.n_levels(), roi.pixel_count());
    for &(level, size) in zones.iter().filter(|(_, size)| *size > 0) {
        matrix.add(level, size);
    }
    matrix
}

/// Gray level size zone features.
#[derive(Debug, Clone, Copy, Default)]
pub struct Glszm;

impl FeatureClass for Glszm {
    fn kind(&self) -> FeatureClassKind {
        FeatureClassKind::Glszm
    }

    fn compute(&self, roi: &Roi) -> Result<NamedValues, ExtractorError> {
        let Some(s) = size_zones(roi).stats() else {
            return DegenerateMatrixSnafu { class: self.kind() }.fail();
        };
        Ok(vec![
            ("SmallAreaEmphasis", s.small_emphasis),
            ("LargeAreaEmphasis", s.large_emphasis),
            ("GrayLevelNonUniformity", s.level_non_uniformity),
            (
                "GrayLevelNonUniformityNormalized",
                s.level_non_uniformity_normalized,
            ),
            ("SizeZoneNonUniformity", s.size_non_uniformity),
            (
                "SizeZoneNonUniformityNormalized",
                s.size_non_uniformity_normalized,
            ),
            ("ZonePercentage", s.total / roi.pixel_count() as f64),
            ("GrayLevelVariance", s.level_variance),
            ("ZoneVariance", s.size_variance),
            ("ZoneEntropy", s.entropy),
            ("LowGrayLevelZoneEmphasis", s.low_level_emphasis),
            ("HighGrayLevelZoneEmphasis", s.high_level_emphasis),
            ("SmallAreaLowGrayLevelEmphasis", s.small_low_level_emphasis),
            ("SmallAreaHighGrayLevelEmphasis", s.small_high_level_emphasis),
            ("LargeAreaLowGrayLevelEmphasis", s.large_low_level_emphasis),
            ("LargeAreaHighGrayLevelEmphasis", s.large_high_level_emphasis),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{roi_from_levels, value_of, TOLERANCE};
    use super::*;

    #[test]
    fn test_zones_split_by_level() {
        #[rustfmt::skip]
        let roi = roi_from_levels(3, 3, &[
            1, 1, 2,
            1, 2, 2,
            3, 3, 2,
        ]);
        let counts = size_zones(&roi).counts().clone();
        assert_eq!(counts[[0, 2]], 1.0);
        assert_eq!(counts[[1, 3]], 1.0);
        assert_eq!(counts[[2, 1]], 1.0);
        assert_eq!(counts.sum(), 3.0);
    }

    #[test]
    fn test_diagonal_pixels_join() {
        let roi = roi_from_levels(2, 2, &[1, 0, 0, 1]);
        let counts = size_zones(&roi).counts().clone();
        assert_eq!(counts[[0, 1]], 1.0);
        assert_eq!(counts.sum(), 1.0);
    }

    #[test]
    fn test_single_zone_features() {
        let roi = roi_from_levels(2, 3, &[1; 6]);
        let values = Glszm.compute(&roi).unwrap();
        assert!((value_of(&values, "ZonePercentage") - 1.0 / 6.0).abs() < TOLERANCE);
        assert!((value_of(&values, "LargeAreaEmphasis") - 36.0).abs() < TOLERANCE);
        assert!((value_of(&values, "SmallAreaEmphasis") - 1.0 / 36.0).abs() < TOLERANCE);
        assert_eq!(value_of(&values, "ZoneVariance"), 0.0);
    }
}
