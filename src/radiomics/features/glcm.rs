use ndarray::Array2;

use super::{entropy_of, mean_over_directions, FeatureClass, NamedValues, DIRECTIONS, EPS};
use crate::radiomics::params::FeatureClassKind;
use crate::radiomics::roi::Roi;
use crate::radiomics::{DegenerateMatrixSnafu, ExtractorError};

/// Symmetric co-occurrence counts for one displacement, `None` if no pair lies in the region.
pub fn cooccurrence(roi: &Roi, offset: (isize, isize)) -> Option<Array2<f64>> {
    let n = roi.n_levels();
    let mut counts = Array2::<f64>::zeros((n, n));
    for (r, c, level) in roi.pixels() {
        if let Some(other) = roi.level_at(r + offset.0, c + offset.1) {
            let (i, j) = (level as usize - 1, other as usize - 1);
            counts[[i, j]] += 1.0;
            counts[[j, i]] += 1.0;
        }
    }
    if counts.sum() > 0.0 {
        Some(counts)
    } else {
        None
    }
}

fn glcm_features(counts: &Array2<f64>) -> NamedValues {
    let ng = counts.nrows();
    let p = counts / counts.sum();
    let px = p.sum_axis(ndarray::Axis(1));
    let py = p.sum_axis(ndarray::Axis(0));

    let level = |idx: usize| (idx + 1) as f64;
    let mu_x: f64 = px.iter().enumerate().map(|(i, &v)| level(i) * v).sum();
    let mu_y: f64 = py.iter().enumerate().map(|(j, &v)| level(j) * v).sum();
    let sigma_x = px
        .iter()
        .enumerate()
        .map(|(i, &v)| (level(i) - mu_x).powi(2) * v)
        .sum::<f64>()
        .sqrt();
    let sigma_y = py
        .iter()
        .enumerate()
        .map(|(j, &v)| (level(j) - mu_y).powi(2) * v)
        .sum::<f64>()
        .sqrt();

    // p_{x+y}(k) for k = 2..=2Ng at index k - 2, p_{x-y}(k) for k = 0..Ng
    let mut sum_dist = vec![0.0; 2 * ng - 1];
    let mut diff_dist = vec![0.0; ng];

    let mut autocorrelation = 0.0;
    let mut cluster_prominence = 0.0;
    let mut cluster_shade = 0.0;
    let mut cluster_tendency = 0.0;
    let mut contrast = 0.0;
    let mut joint_energy = 0.0;
    let mut idm = 0.0;
    let mut idmn = 0.0;
    let mut id = 0.0;
    let mut idn = 0.0;
    let mut sum_squares = 0.0;
    let mut maximum_probability: f64 = 0.0;
    let mut hxy1 = 0.0;
    let mut hxy2 = 0.0;
    let ng2 = (ng * ng) as f64;

    for ((a, b), &pij) in p.indexed_iter() {
        let (i, j) = (level(a), level(b));
        let pxy = px[a] * py[b];
        hxy2 -= pxy * (pxy + EPS).log2();
        if pij == 0.0 {
            continue;
        }
        let diff = (i - j).abs();
        let centred = i + j - mu_x - mu_y;
        sum_dist[a + b] += pij;
        diff_dist[a.abs_diff(b)] += pij;

        autocorrelation += i * j * pij;
        cluster_prominence += centred.powi(4) * pij;
        cluster_shade += centred.powi(3) * pij;
        cluster_tendency += centred.powi(2) * pij;
        contrast += diff * diff * pij;
        joint_energy += pij * pij;
        idm += pij / (1.0 + diff * diff);
        idmn += pij / (1.0 + diff * diff / ng2);
        id += pij / (1.0 + diff);
        idn += pij / (1.0 + diff / ng as f64);
        sum_squares += (i - mu_x).powi(2) * pij;
        maximum_probability = maximum_probability.max(pij);
        hxy1 -= pij * (pxy + EPS).log2();
    }

    let hx = entropy_of(px.iter().cloned());
    let hy = entropy_of(py.iter().cloned());
    let hxy = entropy_of(p.iter().cloned());

    let correlation = if sigma_x * sigma_y > 0.0 {
        (autocorrelation - mu_x * mu_y) / (sigma_x * sigma_y)
    } else {
        1.0
    };
    let imc1 = if hx.max(hy) > 0.0 {
        (hxy - hxy1) / hx.max(hy)
    } else {
        0.0
    };
    let imc2 = (1.0 - (-2.0 * (hxy2 - hxy)).exp()).max(0.0).sqrt();

    let difference_average: f64 = diff_dist.iter().enumerate().map(|(k, &v)| k as f64 * v).sum();
    let difference_variance: f64 = diff_dist
        .iter()
        .enumerate()
        .map(|(k, &v)| (k as f64 - difference_average).powi(2) * v)
        .sum();
    let inverse_variance: f64 = diff_dist
        .iter()
        .enumerate()
        .skip(1)
        .map(|(k, &v)| v / (k * k) as f64)
        .sum();
    let sum_average: f64 = sum_dist
        .iter()
        .enumerate()
        .map(|(k, &v)| (k + 2) as f64 * v)
        .sum();

    vec![
        ("Autocorrelation", autocorrelation),
        ("JointAverage", mu_x),
        ("ClusterProminence", cluster_prominence),
        ("ClusterShade", cluster_shade),
        ("ClusterTendency", cluster_tendency),
        ("Contrast", contrast),
        ("Correlation", correlation),
        ("DifferenceAverage", difference_average),
        ("DifferenceEntropy", entropy_of(diff_dist.iter().cloned())),
        ("DifferenceVariance", difference_variance),
        ("JointEnergy", joint_energy),
        ("JointEntropy", hxy),
        ("Imc1", imc1),
        ("Imc2", imc2),
        ("Idm", idm),
        ("Idmn", idmn),
        ("Id", id),
        ("Idn", idn),
        ("InverseVariance", inverse_variance),
        ("MaximumProbability", maximum_probability),
        ("SumAverage", sum_average),
        ("SumEntropy", entropy_of(sum_dist.iter().cloned())),
        ("SumSquares", sum_squares),
    ]
}

/// Gray level co-occurrence features, averaged over the four 2D directions.
#[derive(Debug, Clone, Copy)]
pub struct Glcm {
    pub distance: usize,
}

impl Default for Glcm {
    fn default() -> Self {
        Self { distance: 1 }
    }
}

impl FeatureClass for Glcm {
    fn kind(&self) -> FeatureClassKind {
        FeatureClassKind::Glcm
    }

    fn compute(&self, roi: &Roi) -> Result<NamedValues, ExtractorError> {
        let d = self.distance as isize;
        let per_direction: Vec<NamedValues> = DIRECTIONS
            .iter()
            .filter_map(|&(dr, dc)| cooccurrence(roi, (dr * d, dc * d)))
            .map(|counts| glcm_features(&counts))
            .collect();
        if per_direction.is_empty() {
            return DegenerateMatrixSnafu { class: self.kind() }.fail();
        }
        Ok(mean_over_directions(&per_direction))
    }
}
