//! Local binary pattern texture statistics restricted to a mask region.
//!
//! The code map follows the usual circular-sampling definition: `P` neighbours at radius `R`,
//! sampled with bilinear interpolation, where samples falling outside the image read as zero.
//! Neighbour `p` sits at `(-R sin(2πp/P), R cos(2πp/P))` relative to the centre, with the
//! offsets rounded to five decimals.

use image::GrayImage;
use ndarray::{Array2, Zip};
use snafu::{ensure, Snafu};
use std::f64::consts::PI;
use std::fmt;

use crate::color::gray_to_array;
use crate::mask::BinaryMask;

pub const DEFAULT_RADIUS: u32 = 2;
pub const ENTROPY_EPSILON: f64 = 1e-10;

/// Sampling points a code can hold.
pub const MAX_POINTS: usize = 64;
/// Sampling points allowed for the `default` and `ror` codes, which span `2^P` bins.
pub const MAX_CODE_BITS: usize = 16;

pub const LBP_PREFIX: &str = "LBP_";
pub const HIST_BIN_PREFIX: &str = "LBP_hist_bin_";
pub const MEAN_KEY: &str = "LBP_mean";
pub const STD_KEY: &str = "LBP_std";
pub const ENTROPY_KEY: &str = "LBP_entropy";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LbpMethod {
    /// Plain binary code, `sum(s_p * 2^p)`
    Default,
    /// Minimum of the plain code over all circular bit rotations
    Ror,
    /// Number of set bits for patterns with at most two 0/1 transitions, `P + 1` otherwise
    #[default]
    Uniform,
}

impl fmt::Display for LbpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method_str = match self {
            LbpMethod::Default => "default",
            LbpMethod::Ror => "ror",
            LbpMethod::Uniform => "uniform",
        };
        write!(f, "{}", method_str)
    }
}

#[derive(Debug, Snafu)]
pub enum LbpParamsError {
    #[snafu(display("LBP radius must be positive and finite, got {}", radius))]
    InvalidRadius { radius: f64 },

    #[snafu(display("LBP needs 1 to {} sampling points, got {}", maximum, points))]
    InvalidPoints { points: usize, maximum: usize },

    #[snafu(display(
        "{} LBP codes support at most {} sampling points, got {}",
        method,
        maximum,
        points
    ))]
    TooManyCodeBits {
        method: LbpMethod,
        points: usize,
        maximum: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LbpParams {
    pub radius: f64,
    pub points: usize,
    pub method: LbpMethod,
}

impl Default for LbpParams {
    fn default() -> Self {
        Self::with_radius(DEFAULT_RADIUS)
    }
}

impl LbpParams {
    /// Codes are built in a `u64`, and the plain and rotation-minimal codes need a histogram
    /// bin per possible value.
    pub fn validate(&self) -> Result<(), LbpParamsError> {
        ensure!(
            self.radius.is_finite() && self.radius > 0.0,
            InvalidRadiusSnafu {
                radius: self.radius
            }
        );
        ensure!(
            (1..=MAX_POINTS).contains(&self.points),
            InvalidPointsSnafu {
                points: self.points,
                maximum: MAX_POINTS,
            }
        );
        ensure!(
            self.method == LbpMethod::Uniform || self.points <= MAX_CODE_BITS,
            TooManyCodeBitsSnafu {
                method: self.method,
                points: self.points,
                maximum: MAX_CODE_BITS,
            }
        );
        Ok(())
    }

    /// Radius `r` with the conventional `8 * r` sampling points and the uniform method.
    pub fn with_radius(radius: u32) -> Self {
        Self {
            radius: radius as f64,
            points: 8 * radius as usize,
            method: LbpMethod::Uniform,
        }
    }

    fn offsets(&self) -> Vec<(f64, f64)> {
        let round5 = |v: f64| (v * 1e5).round() / 1e5;
        (0..self.points)
            .map(|p| {
                let angle = 2.0 * PI * p as f64 / self.points as f64;
                (
                    round5(-self.radius * angle.sin()),
                    round5(self.radius * angle.cos()),
                )
            })
            .collect()
    }
}

fn pixel_or_zero(image: &Array2<f64>, row: f64, col: f64) -> f64 {
    let (rows, cols) = image.dim();
    if row < 0.0 || col < 0.0 || row >= rows as f64 || col >= cols as f64 {
        return 0.0;
    }
    image[[row as usize, col as usize]]
}

fn bilinear(image: &Array2<f64>, row: f64, col: f64) -> f64 {
    let (min_r, min_c) = (row.floor(), col.floor());
    let (max_r, max_c) = (row.ceil(), col.ceil());
    let dr = row - min_r;
    let dc = col - min_c;
    let top =
        (1.0 - dc) * pixel_or_zero(image, min_r, min_c) + dc * pixel_or_zero(image, min_r, max_c);
    let bottom =
        (1.0 - dc) * pixel_or_zero(image, max_r, min_c) + dc * pixel_or_zero(image, max_r, max_c);
    (1.0 - dr) * top + dr * bottom
}

fn rotate_right(value: u64, bits: usize) -> u64 {
    (value >> 1) | ((value & 1) << (bits - 1))
}

fn encode(signs: &[bool], method: LbpMethod) -> f64 {
    let points = signs.len();
    let plain = || {
        signs
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s)
            .fold(0u64, |acc, (i, _)| acc | (1 << i))
    };
    match method {
        LbpMethod::Default => plain() as f64,
        LbpMethod::Ror => {
            let mut code = plain();
            let mut best = code;
            for _ in 1..points {
                code = rotate_right(code, points);
                best = best.min(code);
            }
            best as f64
        }
        LbpMethod::Uniform => {
            // Transitions are counted along the chain, not around the circle
            let changes = signs.windows(2).filter(|w| w[0] != w[1]).count();
            if changes <= 2 {
                signs.iter().filter(|&&s| s).count() as f64
            } else {
                (points + 1) as f64
            }
        }
    }
}

/// Per-pixel LBP codes over the whole image, shaped `(height, width)`.
pub fn lbp_map(image: &GrayImage, params: &LbpParams) -> Array2<f64> {
    let pixels = gray_to_array(image).mapv(|v| v as f64);
    let offsets = params.offsets();
    let mut codes = Array2::<f64>::zeros(pixels.dim());

    Zip::indexed(&mut codes).par_for_each(|(r, c), code| {
        let center = pixels[[r, c]];
        let signs: Vec<bool> = offsets
            .iter()
            .map(|&(dr, dc)| bilinear(&pixels, r as f64 + dr, c as f64 + dc) - center >= 0.0)
            .collect();
        *code = encode(&signs, params.method);
    });
    codes
}

/// Histogram and moment statistics of the LBP codes inside a region.
#[derive(Debug, Clone, PartialEq)]
pub struct LbpFeatures {
    /// Density over `[0, n_bins)`, summing to one over the region
    pub histogram: Vec<f64>,
    pub mean: f64,
    pub std: f64,
    pub entropy: f64,
}

impl LbpFeatures {
    /// Statistics of `codes` at the foreground pixels of `mask`.
    /// Returns `None` for an empty region, where none of them are defined.
    pub fn from_region(codes: &Array2<f64>, mask: &BinaryMask) -> Option<Self> {
        let region: Vec<f64> = codes
            .iter()
            .zip(mask.as_array().iter())
            .filter(|(_, &m)| m == crate::mask::FOREGROUND)
            .map(|(&code, _)| code)
            .collect();
        if region.is_empty() {
            return None;
        }

        let n = region.len() as f64;
        let max_code = region.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let n_bins = max_code.floor() as usize + 1;

        let mut counts = vec![0u64; n_bins];
        for &code in &region {
            counts[(code.floor() as usize).min(n_bins - 1)] += 1;
        }
        let histogram: Vec<f64> = counts.iter().map(|&c| c as f64 / n).collect();

        let mean = region.iter().sum::<f64>() / n;
        let variance = region.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
        let entropy = -histogram
            .iter()
            .map(|&h| h * (h + ENTROPY_EPSILON).log2())
            .sum::<f64>();

        Some(Self {
            histogram,
            mean,
            std: variance.sqrt(),
            entropy,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.histogram.len()
    }

    /// Named values in column order: histogram bins, then mean, std and entropy.
    pub fn entries(&self) -> Vec<(String, f64)> {
        self.histogram
            .iter()
            .enumerate()
            .map(|(i, &h)| (format!("{HIST_BIN_PREFIX}{i}"), h))
            .chain([
                (MEAN_KEY.to_string(), self.mean),
                (STD_KEY.to_string(), self.std),
                (ENTROPY_KEY.to_string(), self.entropy),
            ])
            .collect()
    }
}

/// Computes region-restricted LBP features with a fixed parameter set.
#[derive(Debug, Clone, Default)]
pub struct LbpComputer {
    params: LbpParams,
}

impl LbpComputer {
    pub fn new(params: LbpParams) -> Result<Self, LbpParamsError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &LbpParams {
        &self.params
    }

    pub fn compute(&self, image: &GrayImage, mask: &BinaryMask) -> Option<LbpFeatures> {
        let codes = lbp_map(image, &self.params);
        LbpFeatures::from_region(&codes, mask)
    }
}
