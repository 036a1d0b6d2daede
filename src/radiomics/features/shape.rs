use std::f64::consts::PI;

use super::{FeatureClass, NamedValues};
use crate::radiomics::params::FeatureClassKind;
use crate::radiomics::roi::Roi;
use crate::radiomics::ExtractorError;

const EDGE_NEIGHBOURS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Eigenvalues of a symmetric 2x2 matrix, largest first.
fn eigenvalues(a: f64, b: f64, d: f64) -> (f64, f64) {
    let half_trace = (a + d) / 2.0;
    let spread = (((a - d) / 2.0).powi(2) + b * b).sqrt();
    (half_trace + spread, (half_trace - spread).max(0.0))
}

/// Pixel-grid shape descriptors of the region.
///
/// Area counts pixels and the perimeter counts pixel edges shared with the background.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shape2D;

impl FeatureClass for Shape2D {
    fn kind(&self) -> FeatureClassKind {
        FeatureClassKind::Shape2D
    }

    fn compute(&self, roi: &Roi) -> Result<NamedValues, ExtractorError> {
        let pixels: Vec<(f64, f64)> = roi.pixels().map(|(r, c, _)| (r as f64, c as f64)).collect();
        let area = pixels.len() as f64;

        let mut perimeter = 0.0;
        let mut boundary = Vec::new();
        for (r, c, _) in roi.pixels() {
            let exposed = EDGE_NEIGHBOURS
                .iter()
                .filter(|(dr, dc)| !roi.contains(r + dr, c + dc))
                .count();
            if exposed > 0 {
                boundary.push((r as f64, c as f64));
            }
            perimeter += exposed as f64;
        }

        let mut max_diameter: f64 = 0.0;
        for (i, &(r1, c1)) in boundary.iter().enumerate() {
            for &(r2, c2) in &boundary[i + 1..] {
                max_diameter = max_diameter.max(((r1 - r2).powi(2) + (c1 - c2).powi(2)).sqrt());
            }
        }

        let mean_r = pixels.iter().map(|p| p.0).sum::<f64>() / area;
        let mean_c = pixels.iter().map(|p| p.1).sum::<f64>() / area;
        let var_r = pixels.iter().map(|p| (p.0 - mean_r).powi(2)).sum::<f64>() / area;
        let var_c = pixels.iter().map(|p| (p.1 - mean_c).powi(2)).sum::<f64>() / area;
        let cov = pixels
            .iter()
            .map(|p| (p.0 - mean_r) * (p.1 - mean_c))
            .sum::<f64>()
            / area;
        let (major, minor) = eigenvalues(var_r, cov, var_c);
        let elongation = if major > 0.0 { (minor / major).sqrt() } else { 0.0 };

        Ok(vec![
            ("PixelSurface", area),
            ("Perimeter", perimeter),
            ("PerimeterSurfaceRatio", perimeter / area),
            ("Sphericity", 2.0 * (PI * area).sqrt() / perimeter),
            ("MaximumDiameter", max_diameter),
            ("MajorAxisLength", 4.0 * major.sqrt()),
            ("MinorAxisLength", 4.0 * minor.sqrt()),
            ("Elongation", elongation),
        ])
    }
}
