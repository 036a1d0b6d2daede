use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const DEFAULT_BIN_WIDTH: f64 = 25.0;
pub const DEFAULT_LABEL: u8 = 1;
pub const DEFAULT_IMAGE_TYPE: &str = "original";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ParamsError {
    #[snafu(display("error opening parameter profile {}", path.display()))]
    OpenParams {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("error parsing parameter profile {}", path.display()))]
    ParseParams {
        path: PathBuf,
        #[snafu(source(from(serde_json::Error, Box::new)))]
        source: Box<serde_json::Error>,
    },

    #[snafu(display("invalid parameter '{}': {}", name, reason))]
    InvalidParam { name: &'static str, reason: String },
}

/// Feature classes the built-in extractor knows how to compute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureClassKind {
    #[serde(rename = "firstorder")]
    FirstOrder,
    #[serde(rename = "shape2D")]
    Shape2D,
    #[serde(rename = "glcm")]
    Glcm,
    #[serde(rename = "glrlm")]
    Glrlm,
    #[serde(rename = "glszm")]
    Glszm,
    #[serde(rename = "gldm")]
    Gldm,
    #[serde(rename = "ngtdm")]
    Ngtdm,
}

impl FeatureClassKind {
    pub const ALL: [FeatureClassKind; 7] = [
        FeatureClassKind::FirstOrder,
        FeatureClassKind::Shape2D,
        FeatureClassKind::Glcm,
        FeatureClassKind::Glrlm,
        FeatureClassKind::Glszm,
        FeatureClassKind::Gldm,
        FeatureClassKind::Ngtdm,
    ];
}

impl fmt::Display for FeatureClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureClassKind::FirstOrder => "firstorder",
            FeatureClassKind::Shape2D => "shape2D",
            FeatureClassKind::Glcm => "glcm",
            FeatureClassKind::Glrlm => "glrlm",
            FeatureClassKind::Glszm => "glszm",
            FeatureClassKind::Gldm => "gldm",
            FeatureClassKind::Ngtdm => "ngtdm",
        };
        write!(f, "{}", name)
    }
}

/// Extractor parameter profile, loaded once per run.
///
/// Every field is optional in the JSON document, missing ones take the values of
/// [`RadiomicsParams::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RadiomicsParams {
    /// Width of one gray-level bin in intensity units
    pub bin_width: f64,
    /// Fixed number of bins; takes precedence over `bin_width` when set
    pub bin_count: Option<usize>,
    /// Mask value selecting the region of interest
    pub label: u8,
    /// Pixel distance used for co-occurrence pairs
    pub glcm_distance: usize,
    /// Coarseness tolerance for gray-level dependence
    pub gldm_alpha: u32,
    pub feature_classes: Vec<FeatureClassKind>,
    /// Prefix of every emitted feature key
    pub image_type: String,
}

impl Default for RadiomicsParams {
    fn default() -> Self {
        Self {
            bin_width: DEFAULT_BIN_WIDTH,
            bin_count: None,
            label: DEFAULT_LABEL,
            glcm_distance: 1,
            gldm_alpha: 0,
            feature_classes: FeatureClassKind::ALL.to_vec(),
            image_type: DEFAULT_IMAGE_TYPE.to_string(),
        }
    }
}

impl RadiomicsParams {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ParamsError> {
        let path = path.as_ref();
        let file = File::open(path).context(OpenParamsSnafu { path })?;
        let params: Self =
            serde_json::from_reader(BufReader::new(file)).context(ParseParamsSnafu { path })?;
        params.validate()?;
        tracing::debug!("Loaded parameter profile {}: {:?}", path.display(), params);
        Ok(params)
    }

    /// Load a profile if one was given, otherwise use the defaults.
    pub fn from_optional_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ParamsError> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.bin_width.is_finite() && self.bin_width > 0.0) {
            return InvalidParamSnafu {
                name: "bin_width",
                reason: format!("must be a positive number, got {}", self.bin_width),
            }
            .fail();
        }
        if self.bin_count == Some(0) {
            return InvalidParamSnafu {
                name: "bin_count",
                reason: "must be at least 1".to_string(),
            }
            .fail();
        }
        if self.glcm_distance == 0 {
            return InvalidParamSnafu {
                name: "glcm_distance",
                reason: "must be at least 1".to_string(),
            }
            .fail();
        }
        if self.label == 0 {
            return InvalidParamSnafu {
                name: "label",
                reason: "0 is the background value".to_string(),
            }
            .fail();
        }
        Ok(())
    }

    pub fn is_enabled(&self, class: FeatureClassKind) -> bool {
        self.feature_classes.contains(&class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn write_profile(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let params = RadiomicsParams::default();
        assert_eq!(params.bin_width, 25.0);
        assert_eq!(params.label, 1);
        assert_eq!(params.feature_classes.len(), 7);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_partial_profile() {
        let file = write_profile(r#"{"bin_width": 10, "feature_classes": ["glcm", "shape2D"]}"#);
        let params = RadiomicsParams::from_json_file(file.path()).unwrap();
        assert_eq!(params.bin_width, 10.0);
        assert_eq!(params.label, 1);
        assert_eq!(
            params.feature_classes,
            vec![FeatureClassKind::Glcm, FeatureClassKind::Shape2D]
        );
        assert!(!params.is_enabled(FeatureClassKind::Ngtdm));
    }

    #[test]
    fn test_missing_profile_uses_defaults() {
        let params = RadiomicsParams::from_optional_file(None::<PathBuf>).unwrap();
        assert_eq!(params, RadiomicsParams::default());
    }

    #[rstest]
    #[case::zero_width(r#"{"bin_width": 0}"#)]
    #[case::zero_count(r#"{"bin_count": 0}"#)]
    #[case::zero_distance(r#"{"glcm_distance": 0}"#)]
    #[case::background_label(r#"{"label": 0}"#)]
    fn test_invalid_values(#[case] contents: &str) {
        let file = write_profile(contents);
        let result = RadiomicsParams::from_json_file(file.path());
        assert!(matches!(result, Err(ParamsError::InvalidParam { .. })));
    }

    #[rstest]
    #[case::unknown_field(r#"{"binwidth": 5}"#)]
    #[case::unknown_class(r#"{"feature_classes": ["glcmx"]}"#)]
    #[case::not_json("bin_width: 5")]
    fn test_malformed_profile(#[case] contents: &str) {
        let file = write_profile(contents);
        let result = RadiomicsParams::from_json_file(file.path());
        assert!(matches!(result, Err(ParamsError::ParseParams { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = RadiomicsParams::from_json_file("/nonexistent/params.json");
        assert!(matches!(result, Err(ParamsError::OpenParams { .. })));
    }

    #[rstest]
    #[case(FeatureClassKind::FirstOrder, "firstorder")]
    #[case(FeatureClassKind::Shape2D, "shape2D")]
    #[case(FeatureClassKind::Ngtdm, "ngtdm")]
    fn test_class_names(#[case] class: FeatureClassKind, #[case] expected: &str) {
        assert_eq!(class.to_string(), expected);
        let json = serde_json::to_string(&class).unwrap();
        assert_eq!(json, format!("\"{}\"", expected));
    }
}
