use std::path::PathBuf;

use fer_dataset::BurnDatasetError;
use thiserror::Error;

pub type TrainingResult<T> = Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid distillation loss settings: {0}")]
    InvalidLoss(String),
    #[error("cannot evaluate or train on an empty split")]
    EmptySplit,
    #[error("class index {index} out of range for {num_classes} classes")]
    ClassOutOfRange { index: usize, num_classes: usize },
    #[error("training history is full ({capacity} epochs)")]
    HistoryFull { capacity: usize },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to serialize history to {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Dataset(#[from] BurnDatasetError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint not found at {path}")]
    Missing { path: PathBuf },
    #[error("failed to create checkpoint directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint record error at {path}: {message}")]
    Record { path: PathBuf, message: String },
    #[error("checkpoint at {path} does not match the model architecture: {detail}")]
    ArchitectureMismatch { path: PathBuf, detail: String },
}
