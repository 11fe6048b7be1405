//! Batch iteration for training, validation and test splits.

use crate::aug::{DatasetConfig, TransformPipeline};
use crate::types::{BurnDatasetError, DatasetResult, DatasetSample, SampleIndex};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Default number of samples per batch for every split.
pub const DEFAULT_BATCH_SIZE: usize = 32;

pub struct ClassBatch<B: Backend> {
    /// `[batch, 3, height, width]`.
    pub images: Tensor<B, 4>,
    /// `[batch]` class indices.
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> ClassBatch<B> {
    pub fn len(&self) -> usize {
        self.images.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum SplitSource {
    Files(Vec<SampleIndex>),
    Decoded(Vec<DatasetSample>),
}

/// One dataset split (train, validation or test).
///
/// File-backed splits decode images lazily, one batch at a time. Decoded
/// splits hold ready tensors' worth of data and skip augmentation.
pub struct ClassSplit {
    source: SplitSource,
    cfg: DatasetConfig,
    pipeline: TransformPipeline,
    batch_size: usize,
}

impl ClassSplit {
    pub fn from_indices(indices: Vec<SampleIndex>, cfg: DatasetConfig, batch_size: usize) -> Self {
        let pipeline = TransformPipeline::from_config(&cfg);
        Self {
            source: SplitSource::Files(indices),
            cfg,
            pipeline,
            batch_size: batch_size.max(1),
        }
    }

    /// Wrap already decoded samples; all must share one image shape.
    pub fn from_samples(
        samples: Vec<DatasetSample>,
        cfg: DatasetConfig,
        batch_size: usize,
    ) -> DatasetResult<Self> {
        if let Some(first) = samples.first() {
            let (width, height) = (first.width, first.height);
            for (index, s) in samples.iter().enumerate() {
                let expected = DatasetSample::CHANNELS * width as usize * height as usize;
                if s.width != width || s.height != height || s.image_chw.len() != expected {
                    return Err(BurnDatasetError::ShapeMismatch {
                        index,
                        actual: s.image_chw.len(),
                        expected,
                        channels: DatasetSample::CHANNELS,
                        height,
                        width,
                    });
                }
            }
        }
        let pipeline = TransformPipeline::from_config(&cfg);
        Ok(Self {
            source: SplitSource::Decoded(samples),
            cfg,
            pipeline,
            batch_size: batch_size.max(1),
        })
    }

    pub fn len(&self) -> usize {
        match &self.source {
            SplitSource::Files(v) => v.len(),
            SplitSource::Decoded(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }

    /// Class index of every sample, in storage order.
    pub fn labels(&self) -> Vec<usize> {
        match &self.source {
            SplitSource::Files(v) => v.iter().map(|s| s.label).collect(),
            SplitSource::Decoded(v) => v.iter().map(|s| s.label).collect(),
        }
    }

    /// Same samples regrouped with a different batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Fresh pass over the split. `epoch` varies the shuffle order and augmentation.
    pub fn iter(&self, epoch: usize) -> BatchIter<'_> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        if self.cfg.shuffle {
            let mut rng = match self.cfg.seed {
                Some(seed) => rand::rngs::StdRng::seed_from_u64(seed.wrapping_add(epoch as u64)),
                None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
            };
            order.shuffle(&mut rng);
        }
        BatchIter {
            split: self,
            order,
            cursor: 0,
            epoch,
            processed_samples: 0,
            processed_batches: 0,
            started: Instant::now(),
            total_load_time: Duration::ZERO,
        }
    }
}

pub struct BatchIter<'a> {
    split: &'a ClassSplit,
    order: Vec<usize>,
    cursor: usize,
    epoch: usize,
    processed_samples: usize,
    processed_batches: usize,
    started: Instant,
    total_load_time: Duration,
}

impl BatchIter<'_> {
    pub fn next_batch<B: Backend>(
        &mut self,
        device: &B::Device,
    ) -> DatasetResult<Option<ClassBatch<B>>> {
        if self.cursor >= self.order.len() {
            if self.processed_batches > 0 {
                self.log_summary();
            }
            return Ok(None);
        }
        let split = self.split;
        let end = (self.cursor + split.batch_size).min(self.order.len());
        let positions = &self.order[self.cursor..end];

        let t_load = Instant::now();
        let samples: Vec<DatasetSample> = match &split.source {
            SplitSource::Files(indices) => {
                let epoch_key = (self.epoch as u64) << 32;
                let mut loaded: Vec<(usize, DatasetResult<DatasetSample>)> = positions
                    .par_iter()
                    .enumerate()
                    .map(|(i, &pos)| {
                        let key = epoch_key ^ pos as u64;
                        (i, split.pipeline.load(&indices[pos], key))
                    })
                    .collect();
                loaded.sort_by_key(|(i, _)| *i);
                loaded
                    .into_iter()
                    .map(|(_, res)| res)
                    .collect::<DatasetResult<Vec<_>>>()?
            }
            SplitSource::Decoded(decoded) => {
                positions.iter().map(|&pos| decoded[pos].clone()).collect()
            }
        };
        self.cursor = end;
        self.total_load_time += t_load.elapsed();

        let batch = assemble::<B>(&samples, device)?;
        self.processed_samples += batch.len();
        self.processed_batches += 1;
        Ok(Some(batch))
    }

    fn log_summary(&self) {
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        tracing::debug!(
            epoch = self.epoch,
            batches = self.processed_batches,
            samples = self.processed_samples,
            elapsed_s = secs,
            rate = self.processed_samples as f32 / secs,
            avg_load_ms =
                self.total_load_time.as_secs_f64() * 1000.0 / self.processed_batches.max(1) as f64,
            "split pass complete"
        );
    }
}

fn assemble<B: Backend>(samples: &[DatasetSample], device: &B::Device) -> DatasetResult<ClassBatch<B>> {
    let Some(first) = samples.first() else {
        return Err(BurnDatasetError::Other("cannot assemble an empty batch".to_string()));
    };
    let (width, height) = (first.width, first.height);
    let mut images_buf = Vec::with_capacity(samples.len() * first.expected_len());
    let mut labels_buf = Vec::with_capacity(samples.len());
    for (index, s) in samples.iter().enumerate() {
        if s.width != width || s.height != height || s.image_chw.len() != first.expected_len() {
            return Err(BurnDatasetError::ShapeMismatch {
                index,
                actual: s.image_chw.len(),
                expected: first.expected_len(),
                channels: DatasetSample::CHANNELS,
                height,
                width,
            });
        }
        images_buf.extend_from_slice(&s.image_chw);
        labels_buf.push(s.label as i64);
    }
    let batch_len = samples.len();
    let images = Tensor::<B, 1>::from_floats(images_buf.as_slice(), device).reshape([
        batch_len,
        DatasetSample::CHANNELS,
        height as usize,
        width as usize,
    ]);
    let labels = Tensor::<B, 1, Int>::from_data(TensorData::new(labels_buf, [batch_len]), device);
    Ok(ClassBatch { images, labels })
}
