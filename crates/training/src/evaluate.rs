//! One inference pass over a split: loss, accuracy and confusion matrix.

use burn::tensor::backend::Backend;
use burn::tensor::ElementConversion;
use fer_dataset::ClassSplit;
use models::Classifier;

use crate::context::RunContext;
use crate::distill::DistillationLoss;
use crate::error::{TrainingError, TrainingResult};
use crate::metrics::{argmax_classes, class_indices, EvalOutcome, MetricAccumulator};

/// Score `model` on `split` in storage order.
///
/// Pass an inference copy of the model (`AutodiffModule::valid()`), so dropout
/// is off and nothing is tracked for gradients. The loss uses the same
/// distillation objective as training. Without a teacher the model's own
/// logits stand in for the teacher's, which makes the soft term exactly zero
/// and leaves `(1 - alpha) * CE`.
pub fn evaluate<B: Backend, M: Classifier<B> + ?Sized>(
    model: &M,
    split: &ClassSplit,
    loss_fn: &DistillationLoss,
    teacher: Option<&dyn Classifier<B>>,
    ctx: &RunContext<B::Device>,
) -> TrainingResult<EvalOutcome> {
    if split.is_empty() {
        return Err(TrainingError::EmptySplit);
    }
    let mut acc = MetricAccumulator::new();
    let mut batches = split.iter(0);
    while let Some(batch) = batches.next_batch::<B>(&ctx.device)? {
        let logits = model.forward(batch.images.clone());
        let teacher_logits = match teacher {
            Some(teacher) => teacher.forward(batch.images),
            None => logits.clone(),
        };
        let loss = loss_fn
            .forward(logits.clone(), batch.labels.clone(), teacher_logits)
            .into_scalar()
            .elem::<f32>();
        let predictions = argmax_classes(logits);
        let labels = class_indices(batch.labels);
        tracing::trace!(batch = predictions.len(), loss, "eval batch");
        acc.record_batch(loss, &predictions, &labels);
    }
    acc.finish(ctx.num_classes())
}
