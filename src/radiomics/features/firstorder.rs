use super::{entropy_of, FeatureClass, NamedValues};
use crate::radiomics::params::FeatureClassKind;
use crate::radiomics::roi::Roi;
use crate::radiomics::ExtractorError;

/// Linear-interpolated percentile of sorted values, `q` in [0, 100].
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

fn average(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn central_moment(values: &[f64], mean: f64, order: i32) -> f64 {
    values.iter().map(|&v| (v - mean).powi(order)).sum::<f64>() / values.len() as f64
}

/// Intensity distribution statistics of the region.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstOrder;

impl FeatureClass for FirstOrder {
    fn kind(&self) -> FeatureClassKind {
        FeatureClassKind::FirstOrder
    }

    fn compute(&self, roi: &Roi) -> Result<NamedValues, ExtractorError> {
        let values = roi.values();
        let n = values.len() as f64;
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = average(values);
        let m2 = central_moment(values, mean, 2);
        let m3 = central_moment(values, mean, 3);
        let m4 = central_moment(values, mean, 4);
        let skewness = if m2 > 0.0 { m3 / m2.powf(1.5) } else { 0.0 };
        let kurtosis = if m2 > 0.0 { m4 / (m2 * m2) } else { 0.0 };

        let p10 = percentile(&sorted, 10.0);
        let p90 = percentile(&sorted, 90.0);
        let robust: Vec<f64> = values
            .iter()
            .cloned()
            .filter(|&v| v >= p10 && v <= p90)
            .collect();
        // Two-valued regions can leave nothing between the 10th and 90th percentiles
        let robust_mad = if robust.is_empty() {
            0.0
        } else {
            let robust_mean = average(&robust);
            robust.iter().map(|&v| (v - robust_mean).abs()).sum::<f64>() / robust.len() as f64
        };

        let mut level_counts = vec![0.0; roi.n_levels()];
        for level in roi.region_levels() {
            level_counts[level as usize - 1] += 1.0;
        }
        let level_probabilities: Vec<f64> = level_counts.iter().map(|&c| c / n).collect();

        let energy = values.iter().map(|&v| v * v).sum::<f64>();
        let minimum = sorted[0];
        let maximum = sorted[sorted.len() - 1];

        Ok(vec![
            ("Energy", energy),
            ("TotalEnergy", energy),
            ("Entropy", entropy_of(level_probabilities.iter().cloned())),
            ("Minimum", minimum),
            ("10Percentile", p10),
            ("90Percentile", p90),
            ("Maximum", maximum),
            ("Mean", mean),
            ("Median", percentile(&sorted, 50.0)),
            (
                "InterquartileRange",
                percentile(&sorted, 75.0) - percentile(&sorted, 25.0),
            ),
            ("Range", maximum - minimum),
            (
                "MeanAbsoluteDeviation",
                values.iter().map(|&v| (v - mean).abs()).sum::<f64>() / n,
            ),
            ("RobustMeanAbsoluteDeviation", robust_mad),
            ("RootMeanSquared", (energy / n).sqrt()),
            ("Skewness", skewness),
            ("Kurtosis", kurtosis),
            ("Variance", m2),
            (
                "Uniformity",
                level_probabilities.iter().map(|p| p * p).sum::<f64>(),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{roi_from_levels, value_of, TOLERANCE};
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(50.0, 2.5)]
    #[case(100.0, 4.0)]
    #[case(10.0, 1.3)]
    fn test_percentile(#[case] q: f64, #[case] expected: f64) {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&sorted, q) - expected).abs() < TOLERANCE);
    }

    #[test]
    fn test_first_order_values() {
        let roi = roi_from_levels(2, 2, &[1, 2, 3, 4]);
        let values = FirstOrder.compute(&roi).unwrap();
        assert_eq!(value_of(&values, "Mean"), 2.5);
        assert_eq!(value_of(&values, "Minimum"), 1.0);
        assert_eq!(value_of(&values, "Maximum"), 4.0);
        assert_eq!(value_of(&values, "Range"), 3.0);
        assert_eq!(value_of(&values, "Energy"), 30.0);
        assert!((value_of(&values, "Variance") - 1.25).abs() < TOLERANCE);
        assert!((value_of(&values, "Entropy") - 2.0).abs() < 1e-9);
        assert!((value_of(&values, "Uniformity") - 0.25).abs() < TOLERANCE);
        assert!(value_of(&values, "Skewness").abs() < TOLERANCE);
        assert!((value_of(&values, "MeanAbsoluteDeviation") - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_flat_region_moments() {
        let roi = roi_from_levels(1, 3, &[1, 1, 1]);
        let values = FirstOrder.compute(&roi).unwrap();
        assert_eq!(value_of(&values, "Skewness"), 0.0);
        assert_eq!(value_of(&values, "Kurtosis"), 0.0);
        assert_eq!(value_of(&values, "Variance"), 0.0);
        assert!(value_of(&values, "Entropy").abs() < 1e-9);
    }
}
