//! Dataset loading, label encoding, splitting and Burn batching for
//! class-folder image datasets (`<root>/<class>/<image>`).
//!
//! This crate provides utilities for:
//! - Indexing class-folder trees on disk
//! - Fitting a fixed label encoding on the training split
//! - Seeded train/validation splitting
//! - Image decoding with light augmentation
//! - Burn-compatible batch iteration

pub mod aug;
pub mod batch;
pub mod folders;
pub mod labels;
pub mod splits;
pub mod types;

pub use aug::{DatasetConfig, Normalization, TransformPipeline};
pub use batch::{BatchIter, ClassBatch, ClassSplit, DEFAULT_BATCH_SIZE};
pub use folders::index_class_folders;
pub use labels::LabelEncoder;
pub use splits::{split_train_val, DEFAULT_SPLIT_SEED, DEFAULT_VAL_RATIO};
pub use types::*;
