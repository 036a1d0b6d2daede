//! The persistent per-patient dataset: computed feature rows left-joined onto a label table.
use itertools::Itertools;
use snafu::{OptionExt, ResultExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::dataset::{
    DatasetError, DuplicateIdSnafu, IOSnafu, InvalidIdSnafu, MissingIdColumnSnafu, PersistSnafu,
    ReadCsvSnafu, WriteCsvSnafu,
};
use crate::lbp::LBP_PREFIX;
use crate::radiomics::is_texture_feature;

pub const ID_COLUMN: &str = "id";

/// Parse a patient id. Integers and integral floats such as `7.0` are accepted.
pub fn parse_id(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(id) = value.parse::<i64>() {
        return Some(id);
    }
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Some(v as i64),
        _ => None,
    }
}

/// Text of a feature value as written to the CSV. Missing and non-finite values are empty fields.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:?}", v),
        _ => String::new(),
    }
}

/// Whether a dataset column holds computed features rather than labels.
pub fn is_feature_column(name: &str) -> bool {
    name.starts_with(LBP_PREFIX) || is_texture_feature(name)
}

/// All named values computed for one patient.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub id: i64,
    pub values: Vec<(String, f64)>,
}

impl FeatureRecord {
    pub fn new(id: i64, values: Vec<(String, f64)>) -> Self {
        Self { id, values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// Feature rows of one run, with the column union in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    columns: Vec<String>,
    ids: Vec<i64>,
    rows: HashMap<i64, HashMap<String, f64>>,
}

impl FeatureTable {
    pub fn from_records(records: &[FeatureRecord]) -> Result<Self, DatasetError> {
        let columns = records
            .iter()
            .flat_map(|record| record.values.iter().map(|(name, _)| name.clone()))
            .filter(|name| name != ID_COLUMN)
            .unique()
            .collect();

        let mut ids = Vec::with_capacity(records.len());
        let mut rows = HashMap::with_capacity(records.len());
        for record in records {
            let values: HashMap<String, f64> = record.values.iter().cloned().collect();
            if rows.insert(record.id, values).is_some() {
                return DuplicateIdSnafu {
                    id: record.id,
                    origin: "computed features",
                }
                .fail();
            }
            ids.push(record.id);
        }
        Ok(Self { columns, ids, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Patient ids in record order.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn get(&self, id: i64, column: &str) -> Option<f64> {
        self.rows.get(&id).and_then(|row| row.get(column)).copied()
    }
}

/// A dataset read from CSV. Cells other than the id are kept as their original text.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<(i64, Vec<String>)>,
}

impl Dataset {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path).context(ReadCsvSnafu { path })?;
        let headers = reader.headers().context(ReadCsvSnafu { path })?.clone();
        let id_index = headers
            .iter()
            .position(|h| h.trim() == ID_COLUMN)
            .context(MissingIdColumnSnafu { path })?;
        let columns = headers
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != id_index)
            .map(|(_, h)| h.to_string())
            .collect();

        let origin = path.display().to_string();
        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.context(ReadCsvSnafu { path })?;
            let raw_id = record.get(id_index).unwrap_or_default();
            let id = parse_id(raw_id).context(InvalidIdSnafu {
                value: raw_id,
                origin: &origin,
            })?;
            if !seen.insert(id) {
                return DuplicateIdSnafu { id, origin }.fail();
            }
            let cells = record
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != id_index)
                .map(|(_, cell)| cell.to_string())
                .collect();
            rows.push((id, cells));
        }
        Ok(Self { columns, rows })
    }

    /// Non-id columns in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.rows.iter().map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: i64, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|(row_id, _)| *row_id == id)
            .map(|(_, cells)| cells[index].as_str())
    }

    /// Left join `features` onto this table by id.
    ///
    /// The label rows define the row set. Feature columns of earlier runs are dropped, as are
    /// columns named like a fresh feature, so `features` alone defines the feature set.
    /// Patients without features get empty cells.
    pub fn left_join(&self, features: &FeatureTable) -> Dataset {
        let fresh: HashSet<&str> = features.columns().iter().map(String::as_str).collect();
        let kept: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !fresh.contains(c.as_str()) && !is_feature_column(c))
            .map(|(i, _)| i)
            .collect();

        let columns = kept
            .iter()
            .map(|&i| self.columns[i].clone())
            .chain(features.columns().iter().cloned())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|(id, cells)| {
                let row = kept
                    .iter()
                    .map(|&i| cells[i].clone())
                    .chain(
                        features
                            .columns()
                            .iter()
                            .map(|c| format_value(features.get(*id, c))),
                    )
                    .collect();
                (*id, row)
            })
            .collect();
        Dataset { columns, rows }
    }

    /// A dataset holding exactly the computed features, in record order.
    pub fn from_features(features: &FeatureTable) -> Dataset {
        let rows = features
            .ids()
            .iter()
            .map(|&id| {
                let row = features
                    .columns()
                    .iter()
                    .map(|c| format_value(features.get(id, c)))
                    .collect();
                (id, row)
            })
            .collect();
        Dataset {
            columns: features.columns().to_vec(),
            rows,
        }
    }

    /// Write the table with `id` first, replacing `path` atomically.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), DatasetError> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(&parent).context(IOSnafu { path })?;
        {
            let mut writer = csv::Writer::from_writer(temp.as_file_mut());
            let header = std::iter::once(ID_COLUMN).chain(self.columns.iter().map(String::as_str));
            writer.write_record(header).context(WriteCsvSnafu { path })?;
            for (id, cells) in &self.rows {
                let row = std::iter::once(id.to_string()).chain(cells.iter().cloned());
                writer.write_record(row).context(WriteCsvSnafu { path })?;
            }
            writer.flush().context(IOSnafu { path })?;
        }
        temp.persist(path).context(PersistSnafu { path })?;
        Ok(())
    }
}

/// Outcome of one dataset update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub rows: usize,
    pub feature_columns: usize,
    /// Label rows that received computed features
    pub matched: usize,
    /// Computed patients absent from the label table, hence not written
    pub unlabeled: usize,
    /// Whether the dataset already existed
    pub updated: bool,
}

/// Merge the run's records into the dataset at `path`, creating it if absent.
pub fn update_dataset<P: AsRef<Path>>(
    path: P,
    records: &[FeatureRecord],
) -> Result<MergeSummary, DatasetError> {
    let path = path.as_ref();
    let features = FeatureTable::from_records(records)?;

    let (merged, matched, updated) = if path.is_file() {
        let labels = Dataset::read(path)?;
        info!(
            "Merging {} feature rows onto {} label rows from {}",
            features.len(),
            labels.len(),
            path.display()
        );
        let matched = labels.ids().filter(|&id| features.contains(id)).count();
        (labels.left_join(&features), matched, true)
    } else {
        info!("Creating dataset {}", path.display());
        (Dataset::from_features(&features), features.len(), false)
    };

    let unlabeled = features.len() - matched;
    if unlabeled > 0 {
        tracing::warn!(
            "{} patients with computed features have no label row and were not written",
            unlabeled
        );
    }
    merged.write(path)?;

    Ok(MergeSummary {
        rows: merged.len(),
        feature_columns: features.columns().len(),
        matched,
        unlabeled,
        updated,
    })
}
