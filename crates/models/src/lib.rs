//! Burn image classifiers for the facial-expression distillation stack.
//!
//! This crate defines the network architectures handed to the trainer:
//! - `ConvClassifier`: conv blocks, global average pooling and a linear head.
//! - `ModelPreset`: named configurations acting as the model registry
//!   (`wide` teacher, `compact` student, `linear` for smoke tests and tooling).
//!
//! These are pure Burn modules. Training and evaluation code only sees them
//! through the [`Classifier`] trait, so any module producing `[batch, classes]`
//! logits from `[batch, channels, height, width]` images can be plugged in.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig, PaddingConfig2d};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Anything that maps an image batch to unnormalized class scores.
pub trait Classifier<B: Backend> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvClassifierConfig {
    pub in_channels: usize,
    pub num_classes: usize,
    /// Output channels of each conv block; empty means pool the raw input.
    pub widths: Vec<usize>,
    pub dropout: f64,
    /// Start the head at zero so every class scores equally before training.
    pub zero_init_head: bool,
}

impl Default for ConvClassifierConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            num_classes: 7,
            widths: vec![16, 32],
            dropout: 0.0,
            zero_init_head: false,
        }
    }
}

/// 3x3 conv, ReLU, 2x2 max-pool.
#[derive(Debug, Module)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        Self { conv, pool }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(relu(self.conv.forward(input)))
    }
}

#[derive(Debug, Module)]
pub struct ConvClassifier<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    pool: AdaptiveAvgPool2d,
    dropout: Dropout,
    head: Linear<B>,
}

impl<B: Backend> ConvClassifier<B> {
    pub fn new(cfg: ConvClassifierConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(cfg.widths.len());
        let mut channels = cfg.in_channels.max(1);
        for &width in &cfg.widths {
            let width = width.max(1);
            blocks.push(ConvBlock::new(channels, width, device));
            channels = width;
        }
        let pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let dropout = DropoutConfig::new(cfg.dropout).init();
        let mut head = LinearConfig::new(channels, cfg.num_classes.max(1));
        if cfg.zero_init_head {
            head = head.with_initializer(Initializer::Zeros);
        }
        Self {
            blocks,
            pool,
            dropout,
            head: head.init(device),
        }
    }

    /// Logits with shape `[batch, num_classes]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }
        let pooled = self.pool.forward(x).flatten::<2>(1, 3);
        self.head.forward(self.dropout.forward(pooled))
    }
}

impl<B: Backend> Classifier<B> for ConvClassifier<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        ConvClassifier::forward(self, images)
    }
}

/// Registry of named architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelPreset {
    /// Student: two narrow conv blocks.
    Compact,
    /// Teacher: three wider conv blocks with dropout before the head.
    Wide,
    /// Pooling plus a zero-initialised linear head.
    Linear,
}

impl ModelPreset {
    pub fn config(self, num_classes: usize) -> ConvClassifierConfig {
        let base = ConvClassifierConfig {
            num_classes,
            ..Default::default()
        };
        match self {
            ModelPreset::Compact => base,
            ModelPreset::Wide => ConvClassifierConfig {
                widths: vec![32, 64, 128],
                dropout: 0.3,
                ..base
            },
            ModelPreset::Linear => ConvClassifierConfig {
                widths: Vec::new(),
                zero_init_head: true,
                ..base
            },
        }
    }

    pub fn build<B: Backend>(self, num_classes: usize, device: &B::Device) -> ConvClassifier<B> {
        ConvClassifier::new(self.config(num_classes), device)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelPreset::Compact => "compact",
            ModelPreset::Wide => "wide",
            ModelPreset::Linear => "linear",
        }
    }
}

impl fmt::Display for ModelPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(ModelPreset::Compact),
            "wide" => Ok(ModelPreset::Wide),
            "linear" => Ok(ModelPreset::Linear),
            other => Err(format!("unknown model preset '{other}' (expected compact, wide or linear)")),
        }
    }
}
