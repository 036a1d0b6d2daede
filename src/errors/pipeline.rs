pub use snafu::Snafu;

use super::PatientError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
/// Conditions that stop a batch before anything is merged
pub enum PipelineError {
    #[snafu(display("aborted on {}", source))]
    Aborted {
        #[snafu(source(from(PatientError, Box::new)))]
        source: Box<PatientError>,
    },

    #[snafu(display(
        "radiomic extraction failed for {} of {} patients, check the extractor configuration",
        failed,
        attempted
    ))]
    MajorityFailed { failed: usize, attempted: usize },
}
