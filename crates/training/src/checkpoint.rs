//! Save/load of model parameters as burn binary records.
//!
//! One file per role, overwritten in place. Loading never falls back to a
//! fresh initialisation: a missing, unreadable or mismatched file is an error.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;

use crate::error::CheckpointError;

pub type CheckpointRecorder = BinFileRecorder<FullPrecisionSettings>;

/// Extension `BinFileRecorder` forces onto every file it writes.
pub const CHECKPOINT_EXTENSION: &str = "bin";

/// On-disk location for `path`.
pub fn checkpoint_file(path: &Path) -> PathBuf {
    path.with_extension(CHECKPOINT_EXTENSION)
}

pub fn save_checkpoint<B: Backend, M: Module<B>>(
    model: &M,
    path: &Path,
) -> Result<PathBuf, CheckpointError> {
    let file = checkpoint_file(path);
    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| CheckpointError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    model
        .clone()
        .save_file(file.clone(), &CheckpointRecorder::new())
        .map_err(|e| CheckpointError::Record {
            path: file.clone(),
            message: e.to_string(),
        })?;
    Ok(file)
}

/// Load parameters into `model`, which fixes the expected architecture.
pub fn load_checkpoint<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    device: &B::Device,
) -> Result<M, CheckpointError> {
    let file = checkpoint_file(path);
    if !file.is_file() {
        return Err(CheckpointError::Missing { path: file });
    }
    let expected = model.num_params();
    // burn asserts instead of erroring when the record has a different
    // number of layers than the module.
    let loaded = panic::catch_unwind(AssertUnwindSafe(|| {
        model.load_file(file.clone(), &CheckpointRecorder::new(), device)
    }))
    .map_err(|payload| CheckpointError::ArchitectureMismatch {
        path: file.clone(),
        detail: panic_message(payload.as_ref()),
    })?
    .map_err(|e| CheckpointError::Record {
        path: file.clone(),
        message: e.to_string(),
    })?;
    let found = loaded.num_params();
    if found != expected {
        return Err(CheckpointError::ArchitectureMismatch {
            path: file,
            detail: format!("expected {expected} parameters, found {found}"),
        });
    }
    tracing::debug!(path = %file.display(), params = found, "loaded checkpoint");
    Ok(loaded)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "record layout differs from the module".to_string()
    }
}
