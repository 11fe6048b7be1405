//! Integration tests for the class-folder workflow:
//! index → encode → split → batch.

use burn_ndarray::NdArray;
use fer_dataset::{
    index_class_folders, split_train_val, BurnDatasetError, ClassSplit, DatasetConfig,
    LabelEncoder, DEFAULT_SPLIT_SEED, DEFAULT_VAL_RATIO,
};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;

type Backend = NdArray<f32>;

/// Write `count` tiny RGB images under `root/<class_name>/`.
fn write_class(root: &Path, class_name: &str, count: usize, shade: u8) -> anyhow::Result<()> {
    let dir = root.join(class_name);
    fs::create_dir_all(&dir)?;
    for i in 0..count {
        let img = RgbImage::from_pixel(6, 6, Rgb([shade, (i * 10) as u8, 0]));
        img.save(dir.join(format!("img_{i:03}.png")))?;
    }
    Ok(())
}

fn small_config() -> DatasetConfig {
    DatasetConfig {
        image_size: 4,
        normalize: None,
        seed: Some(7),
        ..Default::default()
    }
}

#[test]
fn indexes_encodes_and_splits_class_tree() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_class(tmp.path(), "sad", 5, 10)?;
    write_class(tmp.path(), "angry", 5, 200)?;
    write_class(tmp.path(), "happy", 5, 120)?;
    fs::write(tmp.path().join("README.txt"), "not a class")?;
    fs::write(tmp.path().join("happy").join("notes.txt"), "skip me")?;

    let entries = index_class_folders(tmp.path())?;
    assert_eq!(entries.len(), 15);

    let encoder = LabelEncoder::fit_paths(&entries);
    assert_eq!(encoder.classes(), ["angry", "happy", "sad"]);

    let (train, val) = split_train_val(entries.clone(), DEFAULT_VAL_RATIO, DEFAULT_SPLIT_SEED);
    assert_eq!(train.len(), 12);
    assert_eq!(val.len(), 3);
    let (train_again, _) = split_train_val(entries, DEFAULT_VAL_RATIO, DEFAULT_SPLIT_SEED);
    assert_eq!(train, train_again);

    let val_indices = encoder.encode_all(&val)?;
    assert!(val_indices.iter().all(|s| s.label < 3));
    Ok(())
}

#[test]
fn batches_cover_split_with_smaller_tail() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_class(tmp.path(), "angry", 3, 200)?;
    write_class(tmp.path(), "happy", 4, 120)?;
    let entries = index_class_folders(tmp.path())?;
    let encoder = LabelEncoder::fit_paths(&entries);
    let indices = encoder.encode_all(&entries)?;

    let split = ClassSplit::from_indices(indices, small_config().for_eval(), 3);
    assert_eq!(split.num_batches(), 3);

    let device = Default::default();
    let mut iter = split.iter(0);
    let mut sizes = Vec::new();
    let mut labels = Vec::new();
    while let Some(batch) = iter.next_batch::<Backend>(&device)? {
        assert_eq!(batch.images.dims(), [batch.len(), 3, 4, 4]);
        sizes.push(batch.len());
        labels.extend(batch.labels.into_data().iter::<i64>().map(|v| v as usize));
    }
    assert_eq!(sizes, vec![3, 3, 1]);
    // Evaluation splits keep storage order.
    assert_eq!(labels, split.labels());
    Ok(())
}

#[test]
fn shuffled_epochs_are_reproducible_permutations() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_class(tmp.path(), "angry", 8, 200)?;
    write_class(tmp.path(), "happy", 8, 120)?;
    let entries = index_class_folders(tmp.path())?;
    let indices = LabelEncoder::fit_paths(&entries).encode_all(&entries)?;
    let cfg = DatasetConfig {
        flip_horizontal_prob: 0.0,
        color_jitter_prob: 0.0,
        ..small_config()
    };
    let split = ClassSplit::from_indices(indices, cfg, 16);
    let device = Default::default();

    let epoch_labels = |epoch: usize| -> anyhow::Result<Vec<i64>> {
        let mut iter = split.iter(epoch);
        let batch = iter
            .next_batch::<Backend>(&device)?
            .ok_or_else(|| anyhow::anyhow!("expected one batch"))?;
        Ok(batch.labels.into_data().iter::<i64>().collect())
    };
    assert_eq!(epoch_labels(0)?, epoch_labels(0)?);
    let mut sorted = epoch_labels(1)?;
    sorted.sort();
    assert_eq!(sorted, [vec![0; 8], vec![1; 8]].concat());
    Ok(())
}

#[test]
fn unseen_test_label_is_fatal() -> anyhow::Result<()> {
    let train_root = tempfile::tempdir()?;
    let test_root = tempfile::tempdir()?;
    write_class(train_root.path(), "angry", 2, 200)?;
    write_class(test_root.path(), "angry", 1, 200)?;
    write_class(test_root.path(), "contempt", 1, 90)?;

    let encoder = LabelEncoder::fit_paths(&index_class_folders(train_root.path())?);
    let test_entries = index_class_folders(test_root.path())?;
    let err = encoder.encode_all(&test_entries).unwrap_err();
    assert!(matches!(err, BurnDatasetError::UnknownLabel { .. }));
    Ok(())
}

#[test]
fn corrupt_image_aborts_the_batch() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_class(tmp.path(), "angry", 1, 200)?;
    fs::write(tmp.path().join("angry").join("broken.png"), b"not a png")?;
    let entries = index_class_folders(tmp.path())?;
    let indices = LabelEncoder::fit_paths(&entries).encode_all(&entries)?;
    let split = ClassSplit::from_indices(indices, small_config().for_eval(), 8);

    let device = Default::default();
    let result = split.iter(0).next_batch::<Backend>(&device);
    assert!(matches!(result, Err(BurnDatasetError::Image { .. })));
    Ok(())
}

#[test]
fn empty_tree_is_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    fs::create_dir_all(tmp.path().join("angry"))?;
    let err = index_class_folders(tmp.path()).unwrap_err();
    assert!(matches!(err, BurnDatasetError::EmptyDataset { .. }));
    Ok(())
}
