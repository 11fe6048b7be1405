//! Final test-set report for a trained student.

use std::fmt;

use burn::tensor::backend::Backend;
use fer_dataset::ClassSplit;
use models::Classifier;
use serde::Serialize;

use crate::context::RunContext;
use crate::distill::DistillationLoss;
use crate::error::TrainingResult;
use crate::evaluate::evaluate;
use crate::metrics::{ClassMetrics, ConfusionMatrix};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassReport {
    pub name: String,
    #[serde(flatten)]
    pub metrics: ClassMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
    pub loss: f32,
    pub accuracy: f32,
    pub confusion: ConfusionMatrix,
    /// Support-weighted averages.
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub macro_avg: ClassMetrics,
    pub per_class: Vec<ClassReport>,
}

/// Score `model` on the test split. No teacher is involved, so the reported
/// loss is the hard-label part of the objective.
pub fn report<B: Backend, M: Classifier<B> + ?Sized>(
    model: &M,
    test_split: &ClassSplit,
    loss_fn: &DistillationLoss,
    ctx: &RunContext<B::Device>,
) -> TrainingResult<TestReport> {
    let outcome = evaluate::<B, M>(model, test_split, loss_fn, None, ctx)?;
    let confusion = outcome.confusion;
    let weighted = confusion.weighted_average();
    let per_class = confusion
        .class_metrics()
        .into_iter()
        .enumerate()
        .map(|(i, metrics)| ClassReport {
            name: ctx.class_name(i).to_string(),
            metrics,
        })
        .collect();
    Ok(TestReport {
        loss: outcome.mean_loss,
        accuracy: outcome.accuracy,
        precision: weighted.precision,
        recall: weighted.recall,
        f1: weighted.f1,
        macro_avg: confusion.macro_average(),
        per_class,
        confusion,
    })
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test loss: {:.4}", self.loss)?;
        writeln!(f, "Test accuracy: {:.4}", self.accuracy)?;
        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows = true, cols = predicted):")?;
        for (i, class) in self.per_class.iter().enumerate() {
            writeln!(f, "  {i}: {}", class.name)?;
        }
        write!(f, "{}", self.confusion)?;
        writeln!(f)?;
        let name_w = self
            .per_class
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max(12);
        writeln!(
            f,
            "{:<name_w$} {:>9} {:>9} {:>9} {:>9}",
            "class", "precision", "recall", "f1", "support"
        )?;
        for class in &self.per_class {
            let m = class.metrics;
            writeln!(
                f,
                "{:<name_w$} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                class.name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        let m = self.macro_avg;
        writeln!(
            f,
            "{:<name_w$} {:>9.4} {:>9.4} {:>9.4} {:>9}",
            "macro avg", m.precision, m.recall, m.f1, m.support
        )?;
        writeln!(
            f,
            "{:<name_w$} {:>9.4} {:>9.4} {:>9.4} {:>9}",
            "weighted avg",
            self.precision,
            self.recall,
            self.f1,
            self.confusion.total()
        )?;
        writeln!(f)?;
        writeln!(f, "F1 Score: {:.4}", self.f1)?;
        writeln!(f, "Precision: {:.4}", self.precision)?;
        write!(f, "Recall: {:.4}", self.recall)
    }
}
