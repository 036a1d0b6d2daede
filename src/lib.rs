pub mod color;
pub mod dataset;
pub mod errors;
pub mod file;
pub mod lbp;
pub mod mask;
pub mod pipeline;
pub mod radiomics;

pub use dataset::{update_dataset, FeatureRecord};
pub use lbp::{LbpComputer, LbpMethod, LbpParams};
pub use mask::{BinaryMask, MaskResolver};
pub use pipeline::FeaturePipeline;
pub use radiomics::{NativeExtractor, RadiomicAdapter, RadiomicExtractor, RadiomicsParams};
