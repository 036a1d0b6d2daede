use super::{FeatureClass, NamedValues, NEIGHBOURS};
use crate::radiomics::params::FeatureClassKind;
use crate::radiomics::roi::Roi;
use crate::radiomics::{DegenerateMatrixSnafu, ExtractorError};

/// Coarseness reported for a region without any gray tone difference.
pub const MAX_COARSENESS: f64 = 1e6;

/// Per gray level: number of pixels with at least one region neighbour, and the summed
/// absolute difference to their neighbourhood mean.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneDifferences {
    pub counts: Vec<f64>,
    pub sums: Vec<f64>,
}

pub fn tone_differences(roi: &Roi) -> ToneDifferences {
    let mut counts = vec![0.0; roi.n_levels()];
    let mut sums = vec![0.0; roi.n_levels()];
    for (r, c, level) in roi.pixels() {
        let neighbours: Vec<f64> = NEIGHBOURS
            .iter()
            .filter_map(|&(dr, dc)| roi.level_at(r + dr, c + dc))
            .map(|l| l as f64)
            .collect();
        if neighbours.is_empty() {
            continue;
        }
        let average = neighbours.iter().sum::<f64>() / neighbours.len() as f64;
        let idx = level as usize - 1;
        counts[idx] += 1.0;
        sums[idx] += (level as f64 - average).abs();
    }
    ToneDifferences { counts, sums }
}

/// Neighbouring gray tone difference features.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ngtdm;

impl FeatureClass for Ngtdm {
    fn kind(&self) -> FeatureClassKind {
        FeatureClassKind::Ngtdm
    }

    fn compute(&self, roi: &Roi) -> Result<NamedValues, ExtractorError> {
        let ToneDifferences { counts, sums } = tone_differences(roi);
        let valid: f64 = counts.iter().sum();
        if valid <= 0.0 {
            return DegenerateMatrixSnafu { class: self.kind() }.fail();
        }

        // (gray level, probability, difference sum) for the levels present
        let present: Vec<(f64, f64, f64)> = counts
            .iter()
            .zip(sums.iter())
            .enumerate()
            .filter(|(_, (&n, _))| n > 0.0)
            .map(|(idx, (&n, &s))| ((idx + 1) as f64, n / valid, s))
            .collect();
        let levels_present = present.len() as f64;
        let weighted: f64 = present.iter().map(|&(_, p, s)| p * s).sum();
        let total_difference: f64 = present.iter().map(|&(_, _, s)| s).sum();

        let mut spread = 0.0;
        let mut busyness_denominator = 0.0;
        let mut complexity = 0.0;
        let mut strength = 0.0;
        for &(i, pi, si) in &present {
            for &(j, pj, sj) in &present {
                spread += pi * pj * (i - j).powi(2);
                busyness_denominator += (i * pi - j * pj).abs();
                complexity += (i - j).abs() * (pi * si + pj * sj) / (pi + pj);
                strength += (pi + pj) * (i - j).powi(2);
            }
        }

        let coarseness = if weighted > 0.0 {
            1.0 / weighted
        } else {
            MAX_COARSENESS
        };
        let contrast = if levels_present > 1.0 {
            spread / (levels_present * (levels_present - 1.0)) * total_difference / valid
        } else {
            0.0
        };
        let busyness = if busyness_denominator > 0.0 {
            weighted / busyness_denominator
        } else {
            0.0
        };
        let strength = if total_difference > 0.0 {
            strength / total_difference
        } else {
            0.0
        };

        Ok(vec![
            ("Coarseness", coarseness),
            ("Contrast", contrast),
            ("Busyness", busyness),
            ("Complexity", complexity / valid),
            ("Strength", strength),
        ])
    }
}
