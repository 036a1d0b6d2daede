use indicatif::ParallelProgressIterator;
use itertools::Itertools;
use rayon::prelude::*;
use snafu::{OptionExt, Report, ResultExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::color::to_gray8;
use crate::dataset::{parse_id, FeatureRecord};
use crate::errors::patient::{
    DimensionMismatchSnafu, DuplicateIdSnafu, EmptyRegionSnafu, ExtractorSnafu, InvalidIdSnafu,
    MissingMaskSnafu, ReadImageSnafu, ReadMaskSnafu,
};
use crate::errors::pipeline::{AbortedSnafu, MajorityFailedSnafu};
use crate::errors::{PatientError, PipelineError, SkipReason};
use crate::file::{default_bar, ImageFileOperations};
use crate::lbp::LbpComputer;
use crate::mask::{BinaryMask, MaskResolver};
use crate::radiomics::RadiomicAdapter;

/// An image whose file stem parsed as a patient id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientInput {
    pub id: i64,
    pub stem: String,
    pub path: PathBuf,
}

impl PatientInput {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PatientError> {
        let path = path.as_ref();
        let stem = path.patient_stem().unwrap_or_default();
        let id = parse_id(&stem).context(InvalidIdSnafu {
            id: &stem,
            path,
        })?;
        Ok(Self {
            id,
            stem,
            path: path.to_path_buf(),
        })
    }
}

/// Split images into admissible patients and rejected paths.
/// Ids that do not parse, or repeat an earlier image's id, are rejected.
pub fn admit(images: &[PathBuf]) -> (Vec<PatientInput>, Vec<(PathBuf, PatientError)>) {
    let mut seen = HashSet::new();
    let mut admitted = Vec::with_capacity(images.len());
    let mut rejected = Vec::new();
    for path in images {
        match PatientInput::from_path(path) {
            Ok(input) if !seen.insert(input.id) => {
                let error = DuplicateIdSnafu {
                    id: input.id,
                    path: &input.path,
                }
                .build();
                rejected.push((input.path, error));
            }
            Ok(input) => admitted.push(input),
            Err(e) => rejected.push((path.clone(), e)),
        }
    }
    (admitted, rejected)
}

fn log_skip(path: &Path, e: &PatientError) {
    match e.reason() {
        SkipReason::InvalidId => error!(
            "Rejecting {}: {}",
            path.display(),
            Report::from_error(e)
        ),
        reason => warn!(
            "Skipping {} ({}): {}",
            path.display(),
            reason,
            Report::from_error(e)
        ),
    }
}

/// Results of one batch: the complete records and the patients that contributed nothing.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub records: Vec<FeatureRecord>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.records.len() + self.skipped.len()
    }

    pub fn skipped_by_reason(&self) -> Vec<(SkipReason, usize)> {
        self.skipped
            .iter()
            .map(|(_, reason)| *reason)
            .counts()
            .into_iter()
            .sorted()
            .collect()
    }

    pub fn log(&self) {
        info!(
            "Processed {} of {} patients, skipped {}",
            self.records.len(),
            self.total(),
            self.skipped.len()
        );
        for (reason, count) in self.skipped_by_reason() {
            info!("  {}: {}", reason, count);
        }
    }
}

/// Per-patient feature extraction: mask lookup, binarization, radiomic and LBP features.
///
/// The collaborators are built once by the caller and shared by every worker.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    resolver: MaskResolver,
    radiomics: RadiomicAdapter,
    lbp: LbpComputer,
}

impl FeaturePipeline {
    pub fn new(resolver: MaskResolver, radiomics: RadiomicAdapter, lbp: LbpComputer) -> Self {
        Self {
            resolver,
            radiomics,
            lbp,
        }
    }

    /// Compute the complete record of one patient, or the reason there is none.
    pub fn process_patient(&self, input: &PatientInput) -> Result<FeatureRecord, PatientError> {
        let mask_path = self
            .resolver
            .resolve(&input.stem)
            .with_context(|| MissingMaskSnafu {
                id: &input.stem,
                candidates: self.resolver.candidates(&input.stem),
            })?;
        tracing::debug!(
            "Patient {}: image {}, mask {}",
            input.id,
            input.path.display(),
            mask_path.display()
        );

        let image = image::open(&input.path).context(ReadImageSnafu { path: &input.path })?;
        let raw_mask = image::open(&mask_path).context(ReadMaskSnafu { path: &mask_path })?;
        if (image.width(), image.height()) != (raw_mask.width(), raw_mask.height()) {
            return DimensionMismatchSnafu {
                image_width: image.width(),
                image_height: image.height(),
                mask_width: raw_mask.width(),
                mask_height: raw_mask.height(),
            }
            .fail();
        }

        let mask = BinaryMask::from_image(&raw_mask);
        if mask.is_empty() {
            return EmptyRegionSnafu { path: mask_path }.fail();
        }

        let radiomic = self
            .radiomics
            .extract(&input.path, &mask)
            .context(ExtractorSnafu)?;
        let lbp = self
            .lbp
            .compute(&to_gray8(&image), &mask)
            .context(EmptyRegionSnafu { path: &mask_path })?;

        let values = radiomic.into_iter().chain(lbp.entries()).collect();
        Ok(FeatureRecord::new(input.id, values))
    }

    /// Process a single image path.
    pub fn process<P: AsRef<Path>>(&self, image: P) -> Result<FeatureRecord, PatientError> {
        self.process_patient(&PatientInput::from_path(image)?)
    }

    /// Process a batch across the rayon pool, records in input order.
    ///
    /// Failed patients are logged and skipped. With `strict` the first failure aborts the
    /// batch. Otherwise the batch aborts when radiomic extraction fails for more than half
    /// of the patients that reached it.
    pub fn run(&self, images: &[PathBuf], strict: bool) -> Result<RunSummary, PipelineError> {
        let (inputs, rejected) = admit(images);
        for (path, e) in &rejected {
            log_skip(path, e);
        }
        let mut skipped: Vec<(PathBuf, SkipReason)> = Vec::with_capacity(rejected.len());
        for (path, e) in rejected {
            if strict {
                return Err(e).context(AbortedSnafu);
            }
            skipped.push((path, e.reason()));
        }
        info!("Extracting features for {} patients", inputs.len());

        let pb = default_bar(inputs.len() as u64);
        pb.set_message("Extracting features");
        let par_func = |input: &PatientInput| {
            let result = self.process_patient(input);
            if let Err(e) = &result {
                log_skip(&input.path, e);
            }
            result
        };

        let outcomes: Vec<Result<FeatureRecord, PatientError>> = if strict {
            // Abort on first error
            inputs
                .par_iter()
                .progress_with(pb)
                .map(par_func)
                .collect::<Result<Vec<_>, _>>()
                .context(AbortedSnafu)?
                .into_iter()
                .map(Ok)
                .collect()
        } else {
            inputs.par_iter().progress_with(pb).map(par_func).collect()
        };

        let mut records = Vec::with_capacity(outcomes.len());
        for (input, outcome) in inputs.into_iter().zip(outcomes) {
            match outcome {
                Ok(record) => records.push(record),
                Err(e) => skipped.push((input.path, e.reason())),
            }
        }

        let failed = skipped
            .iter()
            .filter(|(_, reason)| *reason == SkipReason::ExtractorFailure)
            .count();
        let attempted = records.len() + failed;
        if failed * 2 > attempted {
            return MajorityFailedSnafu { failed, attempted }.fail();
        }

        Ok(RunSummary { records, skipped })
    }
}
