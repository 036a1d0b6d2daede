use std::path::{Path, PathBuf};

/// Placeholder substituted with the patient id in mask patterns
pub const ID_PLACEHOLDER: &str = "{id}";

/// Mask naming conventions tried in order: annotated masks first, then model predictions.
pub const DEFAULT_MASK_PATTERNS: [&str; 2] = ["{id}_mask.png", "{id}_pred_mask.png"];

/// Locates the mask file belonging to a patient among a fixed, ordered set of names.
#[derive(Debug, Clone)]
pub struct MaskResolver {
    mask_dir: PathBuf,
    patterns: Vec<String>,
}

impl MaskResolver {
    pub fn new<P: AsRef<Path>>(mask_dir: P) -> Self {
        Self::with_patterns(mask_dir, DEFAULT_MASK_PATTERNS.iter().map(|p| p.to_string()))
    }

    pub fn with_patterns<P, I>(mask_dir: P, patterns: I) -> Self
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = String>,
    {
        Self {
            mask_dir: mask_dir.as_ref().to_path_buf(),
            patterns: patterns.into_iter().collect(),
        }
    }

    /// Candidate file names for a patient, in lookup order.
    pub fn candidates(&self, id: &str) -> Vec<String> {
        self.patterns
            .iter()
            .map(|pattern| pattern.replace(ID_PLACEHOLDER, id))
            .collect()
    }

    /// Path of the first candidate that exists, or `None` when the patient has no mask.
    pub fn resolve(&self, id: &str) -> Option<PathBuf> {
        self.candidates(id)
            .into_iter()
            .map(|name| self.mask_dir.join(name))
            .find(|path| path.is_file())
    }
}
