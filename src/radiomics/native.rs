use ndarray::Array2;
use snafu::ResultExt;
use std::path::Path;

use super::features::{FeatureClass, FirstOrder, Glcm, Gldm, Glrlm, Glszm, Ngtdm, Shape2D};
use super::params::{FeatureClassKind, RadiomicsParams};
use super::roi::{Discretization, Roi};
use super::{
    ExtractorError, FeatureMap, RadiomicExtractor, ReadImageSnafu, ReadMaskSnafu,
    ShapeMismatchSnafu,
};
use crate::color::{gray_to_array, to_intensity};

/// Built-in 2D radiomics extractor.
///
/// Emits `<image_type>_<class>_<Feature>` keys for every enabled feature class, preceded by
/// a few numeric `diagnostics_*` entries describing the inputs.
pub struct NativeExtractor {
    params: RadiomicsParams,
    classes: Vec<Box<dyn FeatureClass>>,
}

impl std::fmt::Debug for NativeExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeExtractor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl NativeExtractor {
    pub fn new(params: RadiomicsParams) -> Self {
        let classes = FeatureClassKind::ALL
            .iter()
            .filter(|&&kind| params.is_enabled(kind))
            .map(|&kind| -> Box<dyn FeatureClass> {
                match kind {
                    FeatureClassKind::FirstOrder => Box::new(FirstOrder),
                    FeatureClassKind::Shape2D => Box::new(Shape2D),
                    FeatureClassKind::Glcm => Box::new(Glcm {
                        distance: params.glcm_distance,
                    }),
                    FeatureClassKind::Glrlm => Box::new(Glrlm),
                    FeatureClassKind::Glszm => Box::new(Glszm),
                    FeatureClassKind::Gldm => Box::new(Gldm {
                        alpha: params.gldm_alpha,
                    }),
                    FeatureClassKind::Ngtdm => Box::new(Ngtdm),
                }
            })
            .collect();
        Self { params, classes }
    }

    pub fn params(&self) -> &RadiomicsParams {
        &self.params
    }

    /// Features of the pixels where `mask == label`, both arrays shaped `(height, width)`.
    pub fn extract_arrays(
        &self,
        intensity: &Array2<f64>,
        mask: &Array2<u8>,
        label: u8,
    ) -> Result<FeatureMap, ExtractorError> {
        if intensity.dim() != mask.dim() {
            let (image_height, image_width) = intensity.dim();
            let (mask_height, mask_width) = mask.dim();
            return ShapeMismatchSnafu {
                image_width,
                image_height,
                mask_width,
                mask_height,
            }
            .fail();
        }

        let roi = Roi::new(
            intensity,
            mask,
            label,
            Discretization::from_params(&self.params),
        )?;

        let n = intensity.len() as f64;
        let mut features: FeatureMap = vec![
            ("diagnostics_Image-original_Dimensionality".to_string(), 2.0),
            (
                "diagnostics_Image-original_Mean".to_string(),
                intensity.sum() / n,
            ),
            (
                "diagnostics_Image-original_Minimum".to_string(),
                intensity.iter().cloned().fold(f64::INFINITY, f64::min),
            ),
            (
                "diagnostics_Image-original_Maximum".to_string(),
                intensity.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            ),
            (
                "diagnostics_Mask-original_VoxelNum".to_string(),
                roi.pixel_count() as f64,
            ),
            (
                "diagnostics_Mask-original_GrayLevels".to_string(),
                roi.n_levels() as f64,
            ),
        ];

        for class in &self.classes {
            let values = class.compute(&roi)?;
            features.extend(values.into_iter().map(|(name, value)| {
                (
                    format!("{}_{}_{}", self.params.image_type, class.kind(), name),
                    value,
                )
            }));
        }
        Ok(features)
    }
}

impl RadiomicExtractor for NativeExtractor {
    fn execute(&self, image: &Path, mask: &Path, label: u8) -> Result<FeatureMap, ExtractorError> {
        let intensity = to_intensity(&image::open(image).context(ReadImageSnafu { path: image })?);
        let mask_image = image::open(mask).context(ReadMaskSnafu { path: mask })?;
        let mask = gray_to_array(&mask_image.to_luma8());
        self.extract_arrays(&intensity, &mask, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radiomics::{is_texture_feature, TEXTURE_FAMILIES};
    use image::{GrayImage, Luma};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_intensity(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_simple_fn((rows, cols), || rng.gen_range(0..=255) as f64)
    }

    #[test]
    fn test_all_families_present() {
        let intensity = random_intensity(16, 16, 11);
        let mask = Array2::from_elem((16, 16), 1u8);
        let features = NativeExtractor::new(RadiomicsParams::default())
            .extract_arrays(&intensity, &mask, 1)
            .unwrap();

        for family in TEXTURE_FAMILIES {
            assert!(
                features.iter().any(|(name, _)| name.contains(family)),
                "missing family {}",
                family
            );
        }
        assert!(features
            .iter()
            .any(|(name, _)| name == "original_firstorder_Mean"));
        assert!(features
            .iter()
            .any(|(name, _)| name == "original_shape2D_PixelSurface"));
        assert!(features.iter().all(|(_, value)| value.is_finite()));
    }

    #[test]
    fn test_enabled_classes_only() {
        let params = RadiomicsParams {
            feature_classes: vec![FeatureClassKind::Glcm],
            ..Default::default()
        };
        let intensity = random_intensity(8, 8, 5);
        let mask = Array2::from_elem((8, 8), 1u8);
        let features = NativeExtractor::new(params)
            .extract_arrays(&intensity, &mask, 1)
            .unwrap();
        let texture: Vec<_> = features
            .iter()
            .filter(|(name, _)| is_texture_feature(name))
            .collect();
        assert!(!texture.is_empty());
        assert!(texture
            .iter()
            .all(|(name, _)| name.starts_with("original_glcm_")));
    }

    #[test]
    fn test_label_selects_region() {
        let intensity = random_intensity(6, 6, 2);
        let mut mask = Array2::<u8>::zeros((6, 6));
        mask.slice_mut(ndarray::s![0..3, ..]).fill(1);
        mask.slice_mut(ndarray::s![3..6, ..]).fill(2);
        let extractor = NativeExtractor::new(RadiomicsParams::default());
        let features = extractor.extract_arrays(&intensity, &mask, 2).unwrap();
        let voxels = features
            .iter()
            .find(|(name, _)| name == "diagnostics_Mask-original_VoxelNum")
            .unwrap()
            .1;
        assert_eq!(voxels, 18.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let intensity = random_intensity(4, 4, 1);
        let mask = Array2::from_elem((4, 5), 1u8);
        let result = NativeExtractor::new(RadiomicsParams::default())
            .extract_arrays(&intensity, &mask, 1);
        assert!(matches!(result, Err(ExtractorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_missing_label() {
        let intensity = random_intensity(4, 4, 1);
        let mask = Array2::zeros((4, 4));
        let result = NativeExtractor::new(RadiomicsParams::default())
            .extract_arrays(&intensity, &mask, 1);
        assert!(matches!(result, Err(ExtractorError::RegionTooSmall { .. })));
    }

    #[test]
    fn test_execute_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("3.png");
        let mask_path = dir.path().join("3_mask.png");
        GrayImage::from_fn(10, 10, |x, y| Luma([(x * 20 + y) as u8]))
            .save(&image_path)
            .unwrap();
        GrayImage::from_fn(10, 10, |x, _| Luma([(x < 5) as u8]))
            .save(&mask_path)
            .unwrap();

        let features = NativeExtractor::new(RadiomicsParams::default())
            .execute(&image_path, &mask_path, 1)
            .unwrap();
        let voxels = features
            .iter()
            .find(|(name, _)| name == "diagnostics_Mask-original_VoxelNum")
            .unwrap()
            .1;
        assert_eq!(voxels, 50.0);
    }

    #[test]
    fn test_execute_unreadable_image() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("3.png");
        std::fs::write(&image_path, "not a png").unwrap();
        let result = NativeExtractor::new(RadiomicsParams::default()).execute(
            &image_path,
            &dir.path().join("missing.png"),
            1,
        );
        assert!(matches!(result, Err(ExtractorError::ReadImage { .. })));
    }
}
