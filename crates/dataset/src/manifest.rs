//! Loading tabular manifests into an ordered sample list.

use crate::types::{DatasetError, DatasetResult, Sample};
use std::path::Path;

/// Ordered mapping from sample index to (image path, label).
///
/// Column 1 of the source table holds filenames relative to a base directory,
/// column 2 holds labels. Paths are joined at construction; the manifest is
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct Manifest {
    samples: Vec<Sample>,
}

impl Manifest {
    /// Read a manifest from a CSV file with a header row and at least two
    /// columns (filename, label). Filenames are resolved against `base_dir`.
    pub fn from_csv(manifest_path: &Path, base_dir: &Path) -> DatasetResult<Self> {
        let mut reader =
            csv::Reader::from_path(manifest_path).map_err(|e| DatasetError::Csv {
                path: manifest_path.to_path_buf(),
                source: e,
            })?;

        let mut samples = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| DatasetError::Csv {
                path: manifest_path.to_path_buf(),
                source: e,
            })?;
            let filename = record.get(0).ok_or_else(|| DatasetError::Manifest {
                path: manifest_path.to_path_buf(),
                msg: format!("row {row} has no filename column"),
            })?;
            let label = record.get(1).ok_or_else(|| DatasetError::Manifest {
                path: manifest_path.to_path_buf(),
                msg: format!("row {row} has no label column (need at least 2 columns)"),
            })?;
            let label: f32 = label.trim().parse().map_err(|_| DatasetError::Manifest {
                path: manifest_path.to_path_buf(),
                msg: format!("row {row} label {label:?} is not numeric"),
            })?;
            samples.push(Sample {
                path: base_dir.join(filename),
                label,
            });
        }
        Ok(Self { samples })
    }

    /// Build a manifest from separately supplied parallel columns. Fails with
    /// a manifest error if the column lengths disagree.
    pub fn from_columns(
        filenames: Vec<String>,
        labels: Vec<f32>,
        base_dir: &Path,
    ) -> DatasetResult<Self> {
        if filenames.len() != labels.len() {
            return Err(DatasetError::Manifest {
                path: base_dir.to_path_buf(),
                msg: format!(
                    "filename and label columns disagree: {} vs {}",
                    filenames.len(),
                    labels.len()
                ),
            });
        }
        let samples = filenames
            .into_iter()
            .zip(labels)
            .map(|(name, label)| Sample {
                path: base_dir.join(name),
                label,
            })
            .collect();
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample(&self, index: usize) -> &Sample {
        &self.samples[index]
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}
