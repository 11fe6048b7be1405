//! Distillation training loop with validation-driven checkpointing and early stopping.

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};
use fer_dataset::ClassSplit;
use models::Classifier;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::checkpoint::save_checkpoint;
use crate::config::TrainSettings;
use crate::context::RunContext;
use crate::distill::DistillationLoss;
use crate::error::{TrainingError, TrainingResult};
use crate::evaluate::evaluate;
use crate::history::{EpochRecord, TrainingHistory};
use crate::metrics::{argmax_classes, class_indices, MetricAccumulator};
use crate::plot::{render_history, write_history_json};
use crate::schedule::StepLr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Validation loss failed to improve for `patience` consecutive epochs.
    EarlyStopped,
    /// Ran the full epoch budget.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochDecision {
    /// New best validation loss; persist a checkpoint.
    Improved,
    NoImprovement { epochs_without_improvement: usize },
    Stop,
}

/// Patience-based stopping on validation loss.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best_val_loss: f32,
    best_epoch: Option<usize>,
    epochs_without_improvement: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best_val_loss: f32::INFINITY,
            best_epoch: None,
            epochs_without_improvement: 0,
        }
    }

    /// Only a strictly lower loss counts as improvement; NaN never does.
    pub fn observe(&mut self, epoch: usize, val_loss: f32) -> EpochDecision {
        if val_loss < self.best_val_loss {
            self.best_val_loss = val_loss;
            self.best_epoch = Some(epoch);
            self.epochs_without_improvement = 0;
            return EpochDecision::Improved;
        }
        self.epochs_without_improvement += 1;
        if self.epochs_without_improvement >= self.patience {
            EpochDecision::Stop
        } else {
            EpochDecision::NoImprovement {
                epochs_without_improvement: self.epochs_without_improvement,
            }
        }
    }

    pub fn best_val_loss(&self) -> f32 {
        self.best_val_loss
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn epochs_without_improvement(&self) -> usize {
        self.epochs_without_improvement
    }
}

pub struct TrainOutcome<S> {
    /// Student as of the last completed epoch (the checkpoint holds the best one).
    pub student: S,
    pub history: TrainingHistory,
    pub stop_reason: StopReason,
    pub best_epoch: Option<usize>,
    pub best_val_loss: f32,
}

/// Distil `teacher` into `student`.
///
/// The teacher lives on the inner backend, so its logits enter the graph as
/// constants. Each epoch trains on `train_split`, scores `val_split`, saves a
/// checkpoint to `ctx.paths.checkpoint` on a strictly better validation loss,
/// checks patience and only then advances `schedule`. The curve plot and the
/// history JSON are written once the loop ends; failures there are logged, not
/// returned.
#[allow(clippy::too_many_arguments)]
pub fn train<B, S, O>(
    ctx: &RunContext<B::Device>,
    teacher: &dyn Classifier<B::InnerBackend>,
    mut student: S,
    loss_fn: &DistillationLoss,
    optimizer: &mut O,
    schedule: &mut StepLr,
    train_split: &ClassSplit,
    val_split: &ClassSplit,
    settings: &TrainSettings,
) -> TrainingResult<TrainOutcome<S>>
where
    B: AutodiffBackend,
    S: AutodiffModule<B> + Classifier<B>,
    S::InnerModule: Classifier<B::InnerBackend>,
    O: Optimizer<S, B>,
{
    if train_split.is_empty() || val_split.is_empty() {
        return Err(TrainingError::EmptySplit);
    }
    let mut history = TrainingHistory::with_capacity(settings.max_epochs);
    let mut stopping = EarlyStopping::new(settings.patience);
    let mut stop_reason = StopReason::Exhausted;
    info!(
        train = train_split.len(),
        val = val_split.len(),
        max_epochs = settings.max_epochs,
        patience = settings.patience,
        alpha = loss_fn.alpha(),
        temperature = loss_fn.temperature(),
        "starting distillation"
    );

    for epoch in 0..settings.max_epochs {
        let lr = schedule.lr();
        let mut train_metrics = MetricAccumulator::new();
        let mut batches = train_split.iter(epoch);
        while let Some(batch) = batches.next_batch::<B>(&ctx.device)? {
            let teacher_logits =
                Tensor::<B, 2>::from_inner(teacher.forward(batch.images.clone().inner()));
            let logits = student.forward(batch.images);
            let loss = loss_fn.forward(logits.clone(), batch.labels.clone(), teacher_logits);
            let loss_value = loss.clone().into_scalar().elem::<f32>();
            if !loss_value.is_finite() {
                warn!(epoch, loss = loss_value, "non-finite training loss");
            }
            let grads = GradientsParams::from_grads(loss.backward(), &student);
            student = optimizer.step(lr, student, grads);

            let predictions = argmax_classes(logits.detach());
            let labels = class_indices(batch.labels);
            debug!(epoch, batch = labels.len(), loss = loss_value, "train step");
            train_metrics.record_batch(loss_value, &predictions, &labels);
        }
        let train_loss = train_metrics.mean_loss()?;
        let train_accuracy = train_metrics.accuracy()?;

        let val = evaluate::<B::InnerBackend, S::InnerModule>(
            &student.valid(),
            val_split,
            loss_fn,
            Some(teacher),
            ctx,
        )?;
        history.push(EpochRecord {
            epoch,
            learning_rate: lr,
            train_loss,
            train_accuracy,
            val_loss: val.mean_loss,
            val_accuracy: val.accuracy,
        })?;
        info!(
            epoch,
            lr,
            train_loss,
            train_acc = train_accuracy,
            val_loss = val.mean_loss,
            val_acc = val.accuracy,
            "epoch complete"
        );

        match stopping.observe(epoch, val.mean_loss) {
            EpochDecision::Improved => {
                let file = save_checkpoint(&student, &ctx.paths.checkpoint)?;
                info!(epoch, val_loss = val.mean_loss, path = %file.display(), "saved checkpoint");
            }
            EpochDecision::NoImprovement {
                epochs_without_improvement,
            } => {
                debug!(epoch, epochs_without_improvement, "no improvement");
            }
            EpochDecision::Stop => {
                stop_reason = StopReason::EarlyStopped;
                info!(epoch, patience = settings.patience, "early stopping");
                break;
            }
        }
        schedule.step();
    }

    info!(
        epochs = history.len(),
        best_epoch = ?stopping.best_epoch(),
        best_val_loss = stopping.best_val_loss(),
        stop_reason = ?stop_reason,
        "training finished"
    );
    if let Err(e) = render_history(&history, &ctx.paths.plot) {
        warn!("failed to render training curves: {e}");
    }
    if let Err(e) = write_history_json(&history, &ctx.paths.history) {
        warn!("failed to write training history: {e}");
    }

    Ok(TrainOutcome {
        student,
        history,
        stop_reason,
        best_epoch: stopping.best_epoch(),
        best_val_loss: stopping.best_val_loss(),
    })
}
