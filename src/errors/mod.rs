pub mod dataset;
pub mod patient;
pub mod pipeline;

pub use dataset::DatasetError;
pub use patient::{PatientError, SkipReason};
pub use pipeline::PipelineError;
