//! Core types and error definitions for fer_dataset.

use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, BurnDatasetError>;

#[derive(Debug, Error)]
pub enum BurnDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("label '{label}' at {path} was not seen in the training split")]
    UnknownLabel { label: String, path: PathBuf },
    #[error("no samples found under {root}")]
    EmptyDataset { root: PathBuf },
    #[error("sample {index} has {actual} values, expected {expected} for a {channels}x{height}x{width} image")]
    ShapeMismatch {
        index: usize,
        actual: usize,
        expected: usize,
        channels: usize,
        height: u32,
        width: u32,
    },
    #[error("{0}")]
    Other(String),
}

/// An image file paired with the directory name it was found under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LabeledPath {
    pub path: PathBuf,
    pub class_name: String,
}

/// An image file paired with its encoded class index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleIndex {
    pub path: PathBuf,
    pub label: usize,
}

#[derive(Debug, Clone)]
pub struct DatasetSample {
    /// Image in CHW layout (3 channels), scaled to [0, 1] and optionally normalized.
    pub image_chw: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub label: usize,
}

impl DatasetSample {
    pub const CHANNELS: usize = 3;

    pub fn expected_len(&self) -> usize {
        Self::CHANNELS * self.width as usize * self.height as usize
    }
}
