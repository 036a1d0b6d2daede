pub mod firstorder;
pub mod glcm;
pub mod gldm;
pub mod glrlm;
pub mod glszm;
pub mod ngtdm;
pub mod shape;

pub use firstorder::*;
pub use glcm::*;
pub use gldm::*;
pub use glrlm::*;
pub use glszm::*;
pub use ngtdm::*;
pub use shape::*;

use ndarray::Array2;

use super::params::FeatureClassKind;
use super::roi::Roi;
use super::ExtractorError;

/// Machine epsilon, added inside logarithms of probabilities.
pub const EPS: f64 = f64::EPSILON;

/// The four unique 2D directions `(row, col)` at unit distance.
pub const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 1), (1, 0), (1, -1)];

/// The 8-neighbourhood offsets `(row, col)`.
pub const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

pub type NamedValues = Vec<(&'static str, f64)>;

pub trait FeatureClass: Send + Sync {
    fn kind(&self) -> FeatureClassKind;

    /// Named feature values for one region, in a fixed order.
    fn compute(&self, roi: &Roi) -> Result<NamedValues, ExtractorError>;
}

/// Average features computed per direction, position by position.
pub fn mean_over_directions(per_direction: &[NamedValues]) -> NamedValues {
    let Some(first) = per_direction.first() else {
        return Vec::new();
    };
    let n = per_direction.len() as f64;
    first
        .iter()
        .enumerate()
        .map(|(i, &(name, _))| {
            let total: f64 = per_direction.iter().map(|values| values[i].1).sum();
            (name, total / n)
        })
        .collect()
}

pub fn entropy_of(probabilities: impl Iterator<Item = f64>) -> f64 {
    -probabilities
        .filter(|&p| p > 0.0)
        .map(|p| p * (p + EPS).log2())
        .sum::<f64>()
}

/// A gray level by size count matrix, shared by run-length, size-zone and dependence
/// statistics.
///
/// Row `i - 1` holds gray level `i`, column `j - 1` holds size `j`.
#[derive(Debug, Clone)]
pub struct LevelSizeMatrix {
    counts: Array2<f64>,
}

/// The emphasis and non-uniformity family computed from a [`LevelSizeMatrix`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSizeStats {
    pub total: f64,
    pub small_emphasis: f64,
    pub large_emphasis: f64,
    pub level_non_uniformity: f64,
    pub level_non_uniformity_normalized: f64,
    pub size_non_uniformity: f64,
    pub size_non_uniformity_normalized: f64,
    pub level_variance: f64,
    pub size_variance: f64,
    pub entropy: f64,
    pub low_level_emphasis: f64,
    pub high_level_emphasis: f64,
    pub small_low_level_emphasis: f64,
    pub small_high_level_emphasis: f64,
    pub large_low_level_emphasis: f64,
    pub large_high_level_emphasis: f64,
}

impl LevelSizeMatrix {
    pub fn new(n_levels: usize, max_size: usize) -> Self {
        Self {
            counts: Array2::zeros((n_levels, max_size.max(1))),
        }
    }

    pub fn add(&mut self, level: u16, size: usize) {
        let (rows, cols) = self.counts.dim();
        let row = (level as usize).clamp(1, rows) - 1;
        let col = size.clamp(1, cols) - 1;
        self.counts[[row, col]] += 1.0;
    }

    pub fn counts(&self) -> &Array2<f64> {
        &self.counts
    }

    pub fn total(&self) -> f64 {
        self.counts.sum()
    }

    /// `None` when the matrix holds no entries.
    pub fn stats(&self) -> Option<LevelSizeStats> {
        let total = self.total();
        if total <= 0.0 {
            return None;
        }

        let level_sums = self.counts.sum_axis(ndarray::Axis(1));
        let size_sums = self.counts.sum_axis(ndarray::Axis(0));

        let mut small = 0.0;
        let mut large = 0.0;
        let mut low = 0.0;
        let mut high = 0.0;
        let mut small_low = 0.0;
        let mut small_high = 0.0;
        let mut large_low = 0.0;
        let mut large_high = 0.0;
        let mut level_mean = 0.0;
        let mut size_mean = 0.0;
        for ((row, col), &count) in self.counts.indexed_iter() {
            if count == 0.0 {
                continue;
            }
            let i2 = ((row + 1) as f64).powi(2);
            let j2 = ((col + 1) as f64).powi(2);
            small += count / j2;
            large += count * j2;
            low += count / i2;
            high += count * i2;
            small_low += count / (i2 * j2);
            small_high += count * i2 / j2;
            large_low += count * j2 / i2;
            large_high += count * i2 * j2;
            level_mean += count / total * (row + 1) as f64;
            size_mean += count / total * (col + 1) as f64;
        }

        let mut level_variance = 0.0;
        let mut size_variance = 0.0;
        for ((row, col), &count) in self.counts.indexed_iter() {
            let p = count / total;
            level_variance += p * ((row + 1) as f64 - level_mean).powi(2);
            size_variance += p * ((col + 1) as f64 - size_mean).powi(2);
        }

        let level_nu = level_sums.iter().map(|s| s * s).sum::<f64>() / total;
        let size_nu = size_sums.iter().map(|s| s * s).sum::<f64>() / total;

        Some(LevelSizeStats {
            total,
            small_emphasis: small / total,
            large_emphasis: large / total,
            level_non_uniformity: level_nu,
            level_non_uniformity_normalized: level_nu / total,
            size_non_uniformity: size_nu,
            size_non_uniformity_normalized: size_nu / total,
            level_variance,
            size_variance,
            entropy: entropy_of(self.counts.iter().map(|&c| c / total)),
            low_level_emphasis: low / total,
            high_level_emphasis: high / total,
            small_low_level_emphasis: small_low / total,
            small_high_level_emphasis: small_high / total,
            large_low_level_emphasis: large_low / total,
            large_high_level_emphasis: large_high / total,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_over_directions() {
        let values = vec![vec![("A", 1.0), ("B", 4.0)], vec![("A", 3.0), ("B", 0.0)]];
        assert_eq!(mean_over_directions(&values), vec![("A", 2.0), ("B", 2.0)]);
        assert!(mean_over_directions(&[]).is_empty());
    }

    #[test]
    fn test_entropy_of_uniform() {
        let entropy = entropy_of([0.25; 4].into_iter());
        assert!((entropy - 2.0).abs() < 1e-9);
        assert!(entropy_of([1.0, 0.0].into_iter()).abs() < 1e-12);
    }

    #[test]
    fn test_level_size_stats() {
        // Two entries: level 1 size 1, level 2 size 2
        let mut matrix = LevelSizeMatrix::new(2, 2);
        matrix.add(1, 1);
        matrix.add(2, 2);
        let stats = matrix.stats().unwrap();
        assert_eq!(stats.total, 2.0);
        assert!((stats.small_emphasis - (1.0 + 0.25) / 2.0).abs() < 1e-12);
        assert!((stats.large_emphasis - (1.0 + 4.0) / 2.0).abs() < 1e-12);
        assert!((stats.level_non_uniformity - 1.0).abs() < 1e-12);
        assert!((stats.level_non_uniformity_normalized - 0.5).abs() < 1e-12);
        assert!((stats.level_variance - 0.25).abs() < 1e-12);
        assert!((stats.entropy - 1.0).abs() < 1e-9);
        assert!((stats.large_high_level_emphasis - (1.0 + 16.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_matrix_has_no_stats() {
        assert!(LevelSizeMatrix::new(3, 3).stats().is_none());
    }
}
