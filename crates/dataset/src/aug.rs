//! Image decoding and light augmentation pipeline.

use crate::types::{BurnDatasetError, DatasetResult, DatasetSample, SampleIndex};
use image::imageops::FilterType;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Per-channel normalization applied after scaling pixels to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalization {
    /// Statistics most pretrained vision backbones expect.
    pub const IMAGENET: Normalization = Normalization {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };
}

#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Every image is resized to `image_size x image_size`.
    pub image_size: u32,
    /// Optional mean/std normalization; `None` keeps [0, 1] pixels.
    pub normalize: Option<Normalization>,
    /// Probability of a horizontal flip.
    pub flip_horizontal_prob: f32,
    /// Probability of a brightness/contrast jitter.
    pub color_jitter_prob: f32,
    /// Max jitter scale for brightness/contrast.
    pub color_jitter_strength: f32,
    /// Shuffle sample order each epoch.
    pub shuffle: bool,
    /// Seed for reproducible shuffling and augmentation.
    pub seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            image_size: 48,
            normalize: Some(Normalization::IMAGENET),
            flip_horizontal_prob: 0.5,
            color_jitter_prob: 0.2,
            color_jitter_strength: 0.1,
            shuffle: true,
            seed: None,
        }
    }
}

impl DatasetConfig {
    /// Same geometry and normalization with shuffling and augmentation off.
    pub fn for_eval(&self) -> Self {
        Self {
            flip_horizontal_prob: 0.0,
            color_jitter_prob: 0.0,
            shuffle: false,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformPipeline {
    pub image_size: u32,
    pub normalize: Option<Normalization>,
    pub flip_horizontal_prob: f32,
    pub color_jitter_prob: f32,
    pub color_jitter_strength: f32,
    pub seed: Option<u64>,
}

impl TransformPipeline {
    pub fn from_config(cfg: &DatasetConfig) -> Self {
        Self {
            image_size: cfg.image_size.max(1),
            normalize: cfg.normalize,
            flip_horizontal_prob: cfg.flip_horizontal_prob,
            color_jitter_prob: cfg.color_jitter_prob,
            color_jitter_strength: cfg.color_jitter_strength,
            seed: cfg.seed,
        }
    }

    /// Decode one file from disk. `sample_key` decorrelates per-sample augmentation.
    pub fn load(&self, idx: &SampleIndex, sample_key: u64) -> DatasetResult<DatasetSample> {
        let img = image::open(&idx.path).map_err(|e| match e {
            image::ImageError::IoError(source) => BurnDatasetError::Io {
                path: idx.path.clone(),
                source,
            },
            other => BurnDatasetError::Image {
                path: idx.path.clone(),
                source: other,
            },
        })?;
        Ok(self.apply(img.to_rgb8(), idx.label, sample_key))
    }

    pub fn apply(&self, img: image::RgbImage, label: usize, sample_key: u64) -> DatasetSample {
        let mut rng_local;
        let mut seeded_rng;
        let rng: &mut dyn rand::RngCore = if let Some(seed) = self.seed {
            seeded_rng = rand::rngs::StdRng::seed_from_u64(seed ^ sample_key);
            &mut seeded_rng
        } else {
            rng_local = rand::rng();
            &mut rng_local
        };

        let size = self.image_size;
        let mut img = if img.dimensions() == (size, size) {
            img
        } else {
            image::imageops::resize(&img, size, size, FilterType::Triangle)
        };
        maybe_hflip(&mut img, self.flip_horizontal_prob, rng);
        maybe_jitter(
            &mut img,
            self.color_jitter_prob,
            self.color_jitter_strength,
            rng,
        );
        build_sample_from_image(&img, label, self.normalize)
    }
}

fn build_sample_from_image(
    img: &image::RgbImage,
    label: usize,
    normalize: Option<Normalization>,
) -> DatasetSample {
    let (width, height) = img.dimensions();
    let plane = (width * height) as usize;
    let mut image_chw = vec![0.0f32; plane * DatasetSample::CHANNELS];
    for (x, y, pixel) in img.enumerate_pixels() {
        let base = (y * width + x) as usize;
        for c in 0..DatasetSample::CHANNELS {
            let mut v = pixel[c] as f32 / 255.0;
            if let Some(norm) = normalize {
                v = (v - norm.mean[c]) / norm.std[c];
            }
            image_chw[c * plane + base] = v;
        }
    }
    DatasetSample {
        image_chw,
        width,
        height,
        label,
    }
}

pub(crate) fn maybe_hflip(img: &mut image::RgbImage, prob: f32, rng: &mut dyn rand::RngCore) {
    if prob <= 0.0 {
        return;
    }
    if rng.random_range(0.0..1.0) < prob {
        image::imageops::flip_horizontal_in_place(img);
    }
}

pub(crate) fn maybe_jitter(
    img: &mut image::RgbImage,
    prob: f32,
    strength: f32,
    rng: &mut dyn rand::RngCore,
) {
    if prob <= 0.0 || strength <= 0.0 {
        return;
    }
    if rng.random_range(0.0..1.0) >= prob {
        return;
    }
    let bright = 1.0 + rng.random_range(-strength..strength);
    let contrast = 1.0 + rng.random_range(-strength..strength);
    for pixel in img.pixels_mut() {
        for c in 0..3 {
            let v = pixel[c] as f32 / 255.0;
            let mut v = (v - 0.5) * contrast + 0.5;
            v *= bright;
            pixel[c] = (v.clamp(0.0, 1.0) * 255.0) as u8;
        }
    }
}
