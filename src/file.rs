use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use rust_search::SearchBuilder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

type IOResult<T> = Result<T, std::io::Error>;

/// Extensions accepted as patient images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif"];

pub fn default_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec})",
            )
            .unwrap(),
    );
    pb
}

pub trait SourceFileOperations
where
    Self: AsRef<Path>,
{
    /// Read a file containing a list of paths and return an iterator of results.
    /// Blank lines are ignored.
    fn read_paths(&self) -> IOResult<impl Iterator<Item = IOResult<PathBuf>>> {
        let reader = BufReader::new(File::open(self.as_ref())?);
        let result = reader.lines().filter_map(|s| match s {
            Ok(s) if s.trim().is_empty() => None,
            Ok(s) => Some(
                PathBuf::from_str(s.trim())
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e)),
            ),
            Err(e) => Some(Err(e)),
        });
        Ok(result)
    }
}

impl<P: AsRef<Path>> SourceFileOperations for P {}

pub trait ImageFileOperations
where
    Self: AsRef<Path>,
{
    /// Check if a file has an image extension.
    fn has_image_extension(&self) -> bool {
        match self.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) => IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known)),
            None => false,
        }
    }

    /// Check if a path is an existing image file.
    fn is_image_file(&self) -> bool {
        self.as_ref().is_file() && self.has_image_extension()
    }

    /// The patient id carried by an image path, i.e. its file stem.
    fn patient_stem(&self) -> Option<String> {
        self.as_ref()
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
    }

    /// Find all images directly inside a directory, sorted by file name.
    fn find_images(&self) -> IOResult<Vec<PathBuf>> {
        let dir = self.as_ref();
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Not a directory",
            ));
        }
        let result = SearchBuilder::default()
            .location(dir)
            .depth(1)
            .build()
            .map(PathBuf::from)
            .filter(|file| file.is_image_file())
            .sorted_by(|a, b| a.file_name().cmp(&b.file_name()))
            .collect();
        Ok(result)
    }

    /// Read image paths from a text file. Paths that are not existing image files are dropped
    /// with a warning; errors opening the list itself are propagated.
    fn read_image_paths(&self) -> IOResult<Vec<PathBuf>>
    where
        Self: SourceFileOperations,
    {
        let mut paths = Vec::new();
        for path in self.read_paths()? {
            let path = path?;
            if path.is_image_file() {
                paths.push(path);
            } else {
                tracing::warn!("Ignoring listed path {}: not an image file", path.display());
            }
        }
        Ok(paths)
    }
}

impl<P: AsRef<Path>> ImageFileOperations for P {}
