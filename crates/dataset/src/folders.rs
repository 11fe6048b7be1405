//! Indexing of `<root>/<class>/<image>` dataset trees.

use crate::types::{BurnDatasetError, DatasetResult, LabeledPath};
use std::fs;
use std::path::Path;

/// Formats the `image` features enabled in this workspace can decode.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

fn is_image_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    if hidden {
        return false;
    }
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn read_dir(path: &Path) -> DatasetResult<fs::ReadDir> {
    fs::read_dir(path).map_err(|e| BurnDatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// List every image under `root`, labelled by its parent directory name.
///
/// Output is sorted by path so downstream seeded shuffles are reproducible.
/// Loose files at the top level are ignored; an empty tree is an error.
pub fn index_class_folders(root: &Path) -> DatasetResult<Vec<LabeledPath>> {
    let mut entries = Vec::new();
    for class_dir in read_dir(root)? {
        let class_dir = class_dir.map_err(|e| BurnDatasetError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        let class_path = class_dir.path();
        if !class_path.is_dir() {
            continue;
        }
        let Some(class_name) = class_path.file_name().and_then(|n| n.to_str()) else {
            return Err(BurnDatasetError::Other(format!(
                "class directory name is not valid UTF-8: {}",
                class_path.display()
            )));
        };
        if class_name.starts_with('.') {
            continue;
        }
        let class_name = class_name.to_string();
        for file in read_dir(&class_path)? {
            let file = file.map_err(|e| BurnDatasetError::Io {
                path: class_path.clone(),
                source: e,
            })?;
            let path = file.path();
            if path.is_file() && is_image_file(&path) {
                entries.push(LabeledPath {
                    path,
                    class_name: class_name.clone(),
                });
            }
        }
    }
    if entries.is_empty() {
        return Err(BurnDatasetError::EmptyDataset {
            root: root.to_path_buf(),
        });
    }
    entries.sort();
    tracing::debug!(root = %root.display(), files = entries.len(), "indexed class folders");
    Ok(entries)
}
