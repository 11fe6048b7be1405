#![recursion_limit = "256"]
//! Knowledge distillation of a compact facial-expression classifier.
//!
//! - `distill`: the blended soft/hard objective.
//! - `trainer`: epoch loop with checkpointing, early stopping and step LR decay.
//! - `evaluate` / `report`: validation passes and the final test report.
//! - `run`: CLI entry points used by the `fer_distill` binary.

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod distill;
pub mod error;
pub mod evaluate;
pub mod history;
pub mod metrics;
pub mod plot;
pub mod report;
pub mod run;
pub mod schedule;
pub mod trainer;

pub use checkpoint::{load_checkpoint, save_checkpoint, CheckpointRecorder};
pub use config::{ExperimentConfig, OptimKind, TrainSettings};
pub use context::{RunContext, RunPaths};
pub use distill::DistillationLoss;
pub use error::{CheckpointError, TrainingError, TrainingResult};
pub use evaluate::evaluate;
pub use history::{EpochRecord, TrainingHistory};
pub use metrics::{ClassMetrics, ConfusionMatrix, EvalOutcome, MetricAccumulator};
pub use models::{Classifier, ConvClassifier, ModelPreset};
pub use report::{report, TestReport};
pub use run::{run, DistillArgs, Mode};
pub use schedule::StepLr;
pub use trainer::{train, EarlyStopping, StopReason, TrainOutcome};

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;

pub type ADBackend = burn::backend::Autodiff<TrainBackend>;
