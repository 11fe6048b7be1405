//! Read-only state shared by every stage of a run.

use std::path::{Path, PathBuf};

use fer_dataset::LabelEncoder;

use crate::config::PathSettings;

/// Output and input files a run touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub checkpoint: PathBuf,
    pub teacher_checkpoint: PathBuf,
    pub plot: PathBuf,
    pub history: PathBuf,
}

impl RunPaths {
    /// Default file names placed under one directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            checkpoint: dir.join("student.bin"),
            teacher_checkpoint: dir.join("teacher.bin"),
            plot: dir.join("training_curves.png"),
            history: dir.join("history.json"),
        }
    }
}

impl From<&PathSettings> for RunPaths {
    fn from(paths: &PathSettings) -> Self {
        Self {
            checkpoint: paths.checkpoint.clone(),
            teacher_checkpoint: paths.teacher_checkpoint.clone(),
            plot: paths.plot.clone(),
            history: paths.history.clone(),
        }
    }
}

/// Device, label encoding and paths, built once and passed by reference.
///
/// Generic over the device type rather than the backend so the autodiff
/// student and its inner-backend evaluation copy share one context.
#[derive(Debug, Clone)]
pub struct RunContext<D> {
    pub device: D,
    pub labels: LabelEncoder,
    pub paths: RunPaths,
}

impl<D> RunContext<D> {
    pub fn new(device: D, labels: LabelEncoder, paths: RunPaths) -> Self {
        Self {
            device,
            labels,
            paths,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn class_name(&self, index: usize) -> &str {
        self.labels.name_of(index).unwrap_or("?")
    }
}
