//! Shared fixtures: a synthetic three-class image set where class `k` lights
//! up channel `k`, and an oracle classifier that reads the channel means.
#![allow(dead_code)]

use std::path::Path;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use fer_dataset::{ClassSplit, DatasetConfig, DatasetSample, LabelEncoder};
use training::{Classifier, RunContext, RunPaths};

pub type B = NdArray<f32>;
pub type AD = burn::backend::Autodiff<B>;
pub type Device = <B as Backend>::Device;

pub const SIZE: u32 = 4;
pub const CLASSES: [&str; 3] = ["angry", "happy", "sad"];

/// Logits = 10 x per-channel mean, so the brightest channel wins.
pub struct ChannelOracle;

impl<BE: Backend> Classifier<BE> for ChannelOracle {
    fn forward(&self, images: Tensor<BE, 4>) -> Tensor<BE, 2> {
        images
            .mean_dim(3)
            .mean_dim(2)
            .flatten::<2>(1, 3)
            .mul_scalar(10.0)
    }
}

pub fn sample(label: usize, variant: usize) -> DatasetSample {
    let plane = (SIZE * SIZE) as usize;
    let mut image_chw = vec![0.0f32; plane * DatasetSample::CHANNELS];
    let level = 0.8 + 0.05 * (variant % 5) as f32;
    for (i, v) in image_chw[label * plane..(label + 1) * plane].iter_mut().enumerate() {
        *v = level - 0.01 * (i % 3) as f32;
    }
    DatasetSample {
        image_chw,
        width: SIZE,
        height: SIZE,
        label,
    }
}

/// `counts[k]` samples of class `k`, grouped by class.
pub fn samples(counts: &[usize]) -> Vec<DatasetSample> {
    counts
        .iter()
        .enumerate()
        .flat_map(|(label, &n)| (0..n).map(move |v| sample(label, v)))
        .collect()
}

pub fn eval_config() -> DatasetConfig {
    DatasetConfig {
        image_size: SIZE,
        normalize: None,
        ..Default::default()
    }
    .for_eval()
}

pub fn split(counts: &[usize], batch_size: usize) -> ClassSplit {
    ClassSplit::from_samples(samples(counts), eval_config(), batch_size)
        .expect("synthetic samples share one shape")
}

pub fn context(dir: &Path) -> RunContext<Device> {
    RunContext::new(
        Default::default(),
        LabelEncoder::fit(CLASSES),
        RunPaths::in_dir(dir),
    )
}
