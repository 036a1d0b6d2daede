pub mod binarize;
pub mod resolve;

pub use binarize::*;
pub use resolve::*;
