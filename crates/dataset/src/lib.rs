//! Manifest loading, splitting, and Burn-compatible batch materialization.
//!
//! This crate provides:
//! - Tabular (CSV) manifest loading into an ordered sample list
//! - Fixed train/val index splits
//! - On-demand batch materialization from image files, with no decode cache

pub mod container;
pub mod manifest;
pub mod splits;
pub mod types;

pub use container::{BatchContainer, ImageBatch};
pub use manifest::Manifest;
pub use splits::IndexSplit;
pub use types::{DatasetError, DatasetResult, Sample};
