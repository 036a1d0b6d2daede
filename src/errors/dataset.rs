pub use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
/// Errors that can occur when reading, merging or writing the dataset CSV
pub enum DatasetError {
    #[snafu(display("error reading dataset {}", path.display()))]
    ReadCsv {
        path: PathBuf,
        #[snafu(source(from(csv::Error, Box::new)))]
        source: Box<csv::Error>,
    },

    #[snafu(display("error writing dataset {}", path.display()))]
    WriteCsv {
        path: PathBuf,
        #[snafu(source(from(csv::Error, Box::new)))]
        source: Box<csv::Error>,
    },

    #[snafu(display("IO error on dataset {}", path.display()))]
    IOError {
        path: PathBuf,
        #[snafu(source(from(std::io::Error, Box::new)))]
        source: Box<std::io::Error>,
    },

    #[snafu(display("could not replace dataset {}", path.display()))]
    Persist {
        path: PathBuf,
        #[snafu(source(from(tempfile::PersistError, Box::new)))]
        source: Box<tempfile::PersistError>,
    },

    #[snafu(display("dataset {} has no 'id' column", path.display()))]
    MissingIdColumn { path: PathBuf },

    #[snafu(display("invalid id '{}' in {}", value, origin))]
    InvalidId { value: String, origin: String },

    #[snafu(display("duplicate id {} in {}", id, origin))]
    DuplicateId { id: i64, origin: String },
}
