//! String label to class index encoding.

use crate::types::{BurnDatasetError, DatasetResult, LabeledPath, SampleIndex};
use std::collections::BTreeSet;

/// Fixed mapping from class names to indices.
///
/// Fitted once from the training split: distinct names sorted
/// alphabetically, index = position. Validation and test files are encoded
/// with the same mapping; a name absent from training is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: BTreeSet<&str> = names.into_iter().collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn fit_paths(entries: &[LabeledPath]) -> Self {
        Self::fit(entries.iter().map(|e| e.class_name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(name))
            .ok()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn encode(&self, entry: &LabeledPath) -> DatasetResult<SampleIndex> {
        let label = self
            .index_of(&entry.class_name)
            .ok_or_else(|| BurnDatasetError::UnknownLabel {
                label: entry.class_name.clone(),
                path: entry.path.clone(),
            })?;
        Ok(SampleIndex {
            path: entry.path.clone(),
            label,
        })
    }

    pub fn encode_all(&self, entries: &[LabeledPath]) -> DatasetResult<Vec<SampleIndex>> {
        entries.iter().map(|e| self.encode(e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(name: &str) -> LabeledPath {
        LabeledPath {
            path: PathBuf::from(format!("{name}/img.png")),
            class_name: name.to_string(),
        }
    }

    #[test]
    fn classes_are_sorted_and_deduplicated() {
        let enc = LabelEncoder::fit(["sad", "angry", "happy", "sad"]);
        assert_eq!(enc.classes(), ["angry", "happy", "sad"]);
        assert_eq!(enc.index_of("happy"), Some(1));
        assert_eq!(enc.name_of(2), Some("sad"));
    }

    #[test]
    fn unseen_label_is_rejected() {
        let enc = LabelEncoder::fit_paths(&[entry("angry"), entry("happy")]);
        assert_eq!(enc.encode(&entry("happy")).map(|s| s.label).ok(), Some(1));
        let err = enc.encode(&entry("surprise")).unwrap_err();
        assert!(matches!(err, BurnDatasetError::UnknownLabel { ref label, .. } if label == "surprise"));
    }
}
