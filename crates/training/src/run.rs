//! Command-line entry points: build the run context, then train, test or both.

use std::path::{Path, PathBuf};

use anyhow::Context;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, SgdConfig};
use burn::tensor::backend::Backend;
use clap::{Parser, ValueEnum};
use fer_dataset::{index_class_folders, split_train_val, ClassSplit, LabelEncoder};
use models::ConvClassifier;
use tracing::info;

use crate::checkpoint::{checkpoint_file, load_checkpoint};
use crate::config::{ExperimentConfig, OptimKind};
use crate::context::{RunContext, RunPaths};
use crate::distill::DistillationLoss;
use crate::report::report;
use crate::schedule::StepLr;
use crate::trainer::train;
use crate::{ADBackend, TrainBackend};

type Device = <TrainBackend as Backend>::Device;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Distil the teacher into the student and keep the best checkpoint.
    Train,
    /// Load the student checkpoint and report on the test split.
    Test,
    /// Train, then test the best checkpoint.
    Both,
}

#[derive(Parser, Debug)]
#[command(
    name = "fer_distill",
    about = "Distil a facial-expression teacher into a compact student classifier"
)]
pub struct DistillArgs {
    /// What to run.
    #[arg(long, value_enum, default_value_t = Mode::Both)]
    pub mode: Mode,
    /// TOML config (defaults to $FER_DISTILL_CONFIG or ./fer-distill.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Train and validation splits of the training tree, plus the label encoding fitted on them.
pub struct TrainingData {
    pub labels: LabelEncoder,
    pub train: ClassSplit,
    pub val: ClassSplit,
}

pub fn run(args: DistillArgs) -> anyhow::Result<()> {
    let cfg = ExperimentConfig::load(args.config.as_deref())?;
    let data = load_training_data(&cfg)?;
    let ctx = RunContext::new(
        Device::default(),
        data.labels.clone(),
        RunPaths::from(&cfg.paths),
    );
    info!(
        mode = ?args.mode,
        classes = ?ctx.labels.classes(),
        student = %cfg.model.student,
        teacher = %cfg.model.teacher,
        "run context ready"
    );
    match args.mode {
        Mode::Train => run_train(&cfg, &ctx, &data),
        Mode::Test => run_test(&cfg, &ctx),
        Mode::Both => {
            run_train(&cfg, &ctx, &data)?;
            run_test(&cfg, &ctx)
        }
    }
}

/// Index the training tree, split it 80/20 and fit the label encoding on the training part.
pub fn load_training_data(cfg: &ExperimentConfig) -> anyhow::Result<TrainingData> {
    let root = &cfg.data.train_root;
    let entries = index_class_folders(root)
        .with_context(|| format!("indexing training images under {}", root.display()))?;
    let (train_entries, val_entries) =
        split_train_val(entries, cfg.data.val_ratio, cfg.data.split_seed);
    let labels = LabelEncoder::fit_paths(&train_entries);
    if labels.len() != cfg.model.num_classes {
        anyhow::bail!(
            "training tree {} has {} classes ({:?}) but model.num_classes = {}",
            root.display(),
            labels.len(),
            labels.classes(),
            cfg.model.num_classes
        );
    }
    let train_indices = labels.encode_all(&train_entries)?;
    let val_indices = labels
        .encode_all(&val_entries)
        .context("encoding validation labels")?;
    info!(
        train = train_indices.len(),
        val = val_indices.len(),
        classes = labels.len(),
        "indexed training tree"
    );
    Ok(TrainingData {
        train: ClassSplit::from_indices(
            train_indices,
            cfg.data.train_config(cfg.train.shuffle_seed),
            cfg.data.batch_size,
        ),
        val: ClassSplit::from_indices(val_indices, cfg.data.eval_config(), cfg.data.batch_size),
        labels,
    })
}

pub fn load_test_split(cfg: &ExperimentConfig, labels: &LabelEncoder) -> anyhow::Result<ClassSplit> {
    let root = &cfg.data.test_root;
    let entries = index_class_folders(root)
        .with_context(|| format!("indexing test images under {}", root.display()))?;
    let indices = labels
        .encode_all(&entries)
        .context("encoding test labels")?;
    Ok(ClassSplit::from_indices(
        indices,
        cfg.data.eval_config(),
        cfg.data.batch_size,
    ))
}

pub fn run_train(
    cfg: &ExperimentConfig,
    ctx: &RunContext<Device>,
    data: &TrainingData,
) -> anyhow::Result<()> {
    let num_classes = ctx.num_classes();
    let teacher = load_checkpoint(
        cfg.model.teacher.build::<TrainBackend>(num_classes, &ctx.device),
        &ctx.paths.teacher_checkpoint,
        &ctx.device,
    )
    .context("loading teacher checkpoint")?;
    let student = cfg.model.student.build::<ADBackend>(num_classes, &ctx.device);
    let loss_fn = DistillationLoss::new(cfg.loss.temperature, cfg.loss.alpha)?;
    let mut schedule = StepLr::new(
        cfg.optim.learning_rate,
        cfg.schedule.step_size,
        cfg.schedule.gamma,
    );
    let weight_decay =
        (cfg.optim.weight_decay > 0.0).then(|| WeightDecayConfig::new(cfg.optim.weight_decay));

    let outcome = match cfg.optim.kind {
        OptimKind::Sgd => {
            let momentum = (cfg.optim.momentum > 0.0).then(|| {
                MomentumConfig::new()
                    .with_momentum(cfg.optim.momentum)
                    .with_dampening(0.0)
            });
            let mut optim = SgdConfig::new()
                .with_momentum(momentum)
                .with_weight_decay(weight_decay)
                .init::<ADBackend, ConvClassifier<ADBackend>>();
            train::<ADBackend, _, _>(
                ctx,
                &teacher,
                student,
                &loss_fn,
                &mut optim,
                &mut schedule,
                &data.train,
                &data.val,
                &cfg.train,
            )?
        }
        OptimKind::Adam => {
            let mut optim = AdamConfig::new()
                .with_weight_decay(weight_decay)
                .init::<ADBackend, ConvClassifier<ADBackend>>();
            train::<ADBackend, _, _>(
                ctx,
                &teacher,
                student,
                &loss_fn,
                &mut optim,
                &mut schedule,
                &data.train,
                &data.val,
                &cfg.train,
            )?
        }
    };

    println!(
        "Training finished after {} epochs ({:?}); best val loss {:.4} at epoch {}",
        outcome.history.len(),
        outcome.stop_reason,
        outcome.best_val_loss,
        outcome
            .best_epoch
            .map(|e| e.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    println!(
        "Best checkpoint: {}",
        checkpoint_file(&ctx.paths.checkpoint).display()
    );
    Ok(())
}

pub fn run_test(cfg: &ExperimentConfig, ctx: &RunContext<Device>) -> anyhow::Result<()> {
    let test_split = load_test_split(cfg, &ctx.labels)?;
    let student = load_student(cfg, ctx, &ctx.paths.checkpoint)?;
    let loss_fn = DistillationLoss::new(cfg.loss.temperature, cfg.loss.alpha)?;
    let test_report = report::<TrainBackend, _>(&student, &test_split, &loss_fn, ctx)?;
    println!("{test_report}");
    Ok(())
}

fn load_student(
    cfg: &ExperimentConfig,
    ctx: &RunContext<Device>,
    path: &Path,
) -> anyhow::Result<ConvClassifier<TrainBackend>> {
    let fresh = cfg
        .model
        .student
        .build::<TrainBackend>(ctx.num_classes(), &ctx.device);
    load_checkpoint(fresh, path, &ctx.device)
        .with_context(|| format!("loading student checkpoint {}", path.display()))
}
