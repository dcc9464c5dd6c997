//! Core types and error definitions for the dataset crate.

use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("manifest error at {path}: {msg}")]
    Manifest { path: PathBuf, msg: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv parse error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(
        "image size mismatch at {path}: got {actual_width}x{actual_height}, \
         expected {expected_width}x{expected_height}"
    )]
    ShapeMismatch {
        path: PathBuf,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("batch index {index} out of range for {len} samples")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("{0}")]
    Other(String),
}

/// One manifest row: an image path and its scalar label.
#[derive(Debug, Clone)]
pub struct Sample {
    pub path: PathBuf,
    pub label: f32,
}
