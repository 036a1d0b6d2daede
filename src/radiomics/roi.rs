use ndarray::Array2;

use super::params::RadiomicsParams;
use super::{ExtractorError, RegionTooSmallSnafu, TooManyLevelsSnafu};

/// Regions with fewer pixels than this have no usable texture.
pub const MIN_REGION_PIXELS: usize = 2;

/// Upper bound on discretized gray levels, keeps the co-occurrence matrices bounded.
pub const MAX_GRAY_LEVELS: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Discretization {
    /// Fixed bin width, edges anchored at the largest multiple of the width below the minimum
    BinWidth(f64),
    /// Fixed number of equally wide bins between minimum and maximum
    BinCount(usize),
}

impl Discretization {
    pub fn from_params(params: &RadiomicsParams) -> Self {
        match params.bin_count {
            Some(count) => Discretization::BinCount(count),
            None => Discretization::BinWidth(params.bin_width),
        }
    }

    /// One-based gray level of `value`, given the region's intensity range.
    pub fn level(&self, value: f64, min: f64, max: f64) -> f64 {
        match *self {
            Discretization::BinWidth(width) => {
                let low = min - min.rem_euclid(width);
                ((value - low) / width).floor() + 1.0
            }
            Discretization::BinCount(count) => {
                if max <= min {
                    return 1.0;
                }
                let width = (max - min) / count as f64;
                (((value - min) / width).floor() + 1.0).min(count as f64)
            }
        }
    }
}

/// The region of interest cropped to its bounding box.
///
/// `levels` holds the discretized gray level of every region pixel and 0 everywhere else,
/// so `levels[[r, c]] > 0` doubles as the region indicator.
#[derive(Debug, Clone)]
pub struct Roi {
    levels: Array2<u16>,
    values: Vec<f64>,
    n_levels: usize,
}

impl Roi {
    /// Select `mask == label` on `intensity` and discretize the selected values.
    pub fn new(
        intensity: &Array2<f64>,
        mask: &Array2<u8>,
        label: u8,
        discretization: Discretization,
    ) -> Result<Self, ExtractorError> {
        let selected: Vec<(usize, usize)> = mask
            .indexed_iter()
            .filter(|(_, &m)| m == label)
            .map(|(idx, _)| idx)
            .collect();
        if selected.len() < MIN_REGION_PIXELS {
            return RegionTooSmallSnafu {
                count: selected.len(),
                minimum: MIN_REGION_PIXELS,
            }
            .fail();
        }

        let row_min = selected.iter().map(|&(r, _)| r).min().unwrap_or(0);
        let row_max = selected.iter().map(|&(r, _)| r).max().unwrap_or(0);
        let col_min = selected.iter().map(|&(_, c)| c).min().unwrap_or(0);
        let col_max = selected.iter().map(|&(_, c)| c).max().unwrap_or(0);

        let values: Vec<f64> = selected.iter().map(|&idx| intensity[idx]).collect();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let mut levels = Array2::<u16>::zeros((row_max - row_min + 1, col_max - col_min + 1));
        let mut n_levels = 0usize;
        for (&(r, c), &value) in selected.iter().zip(values.iter()) {
            let level = discretization.level(value, min, max);
            if level > MAX_GRAY_LEVELS as f64 {
                return TooManyLevelsSnafu {
                    levels: level as usize,
                    maximum: MAX_GRAY_LEVELS,
                }
                .fail();
            }
            let level = level.max(1.0) as u16;
            n_levels = n_levels.max(level as usize);
            levels[[r - row_min, c - col_min]] = level;
        }

        Ok(Self {
            levels,
            values,
            n_levels,
        })
    }

    /// Gray levels of the bounding box, 0 outside the region.
    pub fn levels(&self) -> &Array2<u16> {
        &self.levels
    }

    /// Raw intensities of the region pixels in row-major order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Highest gray level present, gray levels run from 1 to this value.
    pub fn n_levels(&self) -> usize {
        self.n_levels
    }

    pub fn pixel_count(&self) -> usize {
        self.values.len()
    }

    pub fn contains(&self, row: isize, col: isize) -> bool {
        self.level_at(row, col).is_some()
    }

    /// Gray level at a bounding-box position, `None` outside the region.
    pub fn level_at(&self, row: isize, col: isize) -> Option<u16> {
        if row < 0 || col < 0 {
            return None;
        }
        match self.levels.get((row as usize, col as usize)) {
            Some(&level) if level > 0 => Some(level),
            _ => None,
        }
    }

    /// Positions and gray levels of every region pixel.
    pub fn pixels(&self) -> impl Iterator<Item = (isize, isize, u16)> + '_ {
        self.levels
            .indexed_iter()
            .filter(|(_, &level)| level > 0)
            .map(|((r, c), &level)| (r as isize, c as isize, level))
    }

    /// Discretized levels of the region pixels in row-major order.
    pub fn region_levels(&self) -> Vec<u16> {
        self.levels.iter().cloned().filter(|&l| l > 0).collect()
    }

    pub fn rows(&self) -> usize {
        self.levels.nrows()
    }

    pub fn cols(&self) -> usize {
        self.levels.ncols()
    }
}
