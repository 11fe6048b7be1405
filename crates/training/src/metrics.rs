//! Loss/accuracy accumulation, confusion matrix and precision/recall/F1.

use std::fmt;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use serde::Serialize;

use crate::error::{TrainingError, TrainingResult};

/// Square count matrix indexed `[true][predicted]` by class index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    num_classes: usize,
    counts: Vec<usize>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            counts: vec![0; num_classes * num_classes],
        }
    }

    /// Build from parallel prediction/label slices.
    pub fn from_pairs(
        num_classes: usize,
        predictions: &[usize],
        labels: &[usize],
    ) -> TrainingResult<Self> {
        let mut matrix = Self::new(num_classes);
        for (&pred, &label) in predictions.iter().zip(labels) {
            matrix.record(label, pred)?;
        }
        Ok(matrix)
    }

    pub fn record(&mut self, label: usize, prediction: usize) -> TrainingResult<()> {
        for index in [label, prediction] {
            if index >= self.num_classes {
                return Err(TrainingError::ClassOutOfRange {
                    index,
                    num_classes: self.num_classes,
                });
            }
        }
        self.counts[label * self.num_classes + prediction] += 1;
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn get(&self, label: usize, prediction: usize) -> usize {
        self.counts[label * self.num_classes + prediction]
    }

    pub fn row(&self, label: usize) -> &[usize] {
        let start = label * self.num_classes;
        &self.counts[start..start + self.num_classes]
    }

    pub fn rows(&self) -> Vec<Vec<usize>> {
        (0..self.num_classes).map(|i| self.row(i).to_vec()).collect()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    /// Number of samples whose true class is `class`.
    pub fn support(&self, class: usize) -> usize {
        self.row(class).iter().sum()
    }

    /// Number of samples predicted as `class`.
    pub fn predicted(&self, class: usize) -> usize {
        (0..self.num_classes).map(|i| self.get(i, class)).sum()
    }

    pub fn is_diagonal(&self) -> bool {
        (0..self.num_classes)
            .all(|i| (0..self.num_classes).all(|j| i == j || self.get(i, j) == 0))
    }

    /// Per-class scores; an undefined ratio (no predictions or no support) counts as 0.
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..self.num_classes)
            .map(|c| {
                let tp = self.get(c, c) as f32;
                let support = self.support(c);
                let predicted = self.predicted(c);
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Support-weighted average of the per-class scores.
    pub fn weighted_average(&self) -> ClassMetrics {
        let per_class = self.class_metrics();
        let total = self.total();
        let mut avg = ClassMetrics {
            support: total,
            ..ClassMetrics::default()
        };
        if total == 0 {
            return avg;
        }
        for m in &per_class {
            let w = m.support as f32 / total as f32;
            avg.precision += w * m.precision;
            avg.recall += w * m.recall;
            avg.f1 += w * m.f1;
        }
        avg
    }

    /// Unweighted mean of the per-class scores.
    pub fn macro_average(&self) -> ClassMetrics {
        let per_class = self.class_metrics();
        let mut avg = ClassMetrics {
            support: self.total(),
            ..ClassMetrics::default()
        };
        if per_class.is_empty() {
            return avg;
        }
        let n = per_class.len() as f32;
        for m in &per_class {
            avg.precision += m.precision / n;
            avg.recall += m.recall / n;
            avg.f1 += m.f1 / n;
        }
        avg
    }
}

fn ratio(numerator: f32, denominator: usize) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f32
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .map(|c| c.to_string().len())
            .max()
            .unwrap_or(1)
            .max(3);
        write!(f, "{:>6}", "t\\p")?;
        for j in 0..self.num_classes {
            write!(f, " {j:>width$}")?;
        }
        writeln!(f)?;
        for i in 0..self.num_classes {
            write!(f, "{i:>6}")?;
            for c in self.row(i) {
                write!(f, " {c:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ClassMetrics {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub support: usize,
}

/// Result of one pass of the evaluation routine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalOutcome {
    pub mean_loss: f32,
    pub accuracy: f32,
    pub confusion: ConfusionMatrix,
    /// Predicted class per sample, in split iteration order.
    pub predictions: Vec<usize>,
    /// True class per sample, aligned with `predictions`.
    pub labels: Vec<usize>,
}

/// Running size-weighted loss and accuracy over a pass.
#[derive(Debug, Clone, Default)]
pub struct MetricAccumulator {
    loss_sum: f64,
    correct: usize,
    predictions: Vec<usize>,
    labels: Vec<usize>,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `batch_loss` is the batch mean; it is weighted by the batch size.
    pub fn record_batch(&mut self, batch_loss: f32, predictions: &[usize], labels: &[usize]) {
        let n = labels.len().min(predictions.len());
        self.loss_sum += batch_loss as f64 * n as f64;
        self.correct += predictions
            .iter()
            .zip(labels)
            .filter(|(p, l)| p == l)
            .count();
        self.predictions.extend_from_slice(&predictions[..n]);
        self.labels.extend_from_slice(&labels[..n]);
    }

    pub fn total(&self) -> usize {
        self.labels.len()
    }

    pub fn mean_loss(&self) -> TrainingResult<f32> {
        match self.total() {
            0 => Err(TrainingError::EmptySplit),
            n => Ok((self.loss_sum / n as f64) as f32),
        }
    }

    pub fn accuracy(&self) -> TrainingResult<f32> {
        match self.total() {
            0 => Err(TrainingError::EmptySplit),
            n => Ok(self.correct as f32 / n as f32),
        }
    }

    pub fn finish(self, num_classes: usize) -> TrainingResult<EvalOutcome> {
        let mean_loss = self.mean_loss()?;
        let accuracy = self.accuracy()?;
        let confusion = ConfusionMatrix::from_pairs(num_classes, &self.predictions, &self.labels)?;
        Ok(EvalOutcome {
            mean_loss,
            accuracy,
            confusion,
            predictions: self.predictions,
            labels: self.labels,
        })
    }
}

/// Row-wise argmax of `[batch, classes]` logits.
pub fn argmax_classes<B: Backend>(logits: Tensor<B, 2>) -> Vec<usize> {
    logits
        .argmax(1)
        .into_data()
        .iter::<i64>()
        .map(|v| v as usize)
        .collect()
}

pub fn class_indices<B: Backend>(labels: Tensor<B, 1, Int>) -> Vec<usize> {
    labels
        .into_data()
        .iter::<i64>()
        .map(|v| v as usize)
        .collect()
}
