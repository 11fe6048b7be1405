//! Knowledge-distillation objective.
//!
//! `loss = alpha * T^2 * KL(p_teacher || p_student) + (1 - alpha) * CE(student, labels)`
//! where both distributions are softened by the temperature `T`. The KL term is
//! computed in log space from `log_softmax` on both sides, so extreme logits stay finite.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor};

use crate::error::{TrainingError, TrainingResult};

pub const DEFAULT_ALPHA: f32 = 0.5;
pub const DEFAULT_TEMPERATURE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistillationLoss {
    temperature: f32,
    alpha: f32,
}

impl Default for DistillationLoss {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl DistillationLoss {
    /// `temperature` must be positive and `alpha` must lie in `[0, 1]`.
    pub fn new(temperature: f32, alpha: f32) -> TrainingResult<Self> {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(TrainingError::InvalidLoss(format!(
                "temperature must be > 0, got {temperature}"
            )));
        }
        if !(0.0..=1.0).contains(&alpha) {
            return Err(TrainingError::InvalidLoss(format!(
                "alpha must be in [0, 1], got {alpha}"
            )));
        }
        Ok(Self { temperature, alpha })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Combined loss as a single-element tensor; differentiable w.r.t. `student_logits`.
    ///
    /// `student_logits`/`teacher_logits` are `[batch, classes]`, `labels` is `[batch]`.
    pub fn forward<B: Backend>(
        &self,
        student_logits: Tensor<B, 2>,
        labels: Tensor<B, 1, Int>,
        teacher_logits: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let soft = self.soft_loss(student_logits.clone(), teacher_logits);
        let hard = self.hard_loss(student_logits, labels);
        let t2 = self.temperature * self.temperature;
        soft.mul_scalar(self.alpha * t2)
            .add(hard.mul_scalar(1.0 - self.alpha))
    }

    /// Same as [`forward`](Self::forward), read back as a host scalar.
    pub fn compute<B: Backend>(
        &self,
        student_logits: Tensor<B, 2>,
        labels: Tensor<B, 1, Int>,
        teacher_logits: Tensor<B, 2>,
    ) -> f32 {
        self.forward(student_logits, labels, teacher_logits)
            .into_scalar()
            .elem::<f32>()
    }

    /// Batch-mean `KL(softmax(teacher / T) || softmax(student / T))`, unscaled.
    pub fn soft_loss<B: Backend>(
        &self,
        student_logits: Tensor<B, 2>,
        teacher_logits: Tensor<B, 2>,
    ) -> Tensor<B, 1> {
        let student_log = log_softmax(student_logits.div_scalar(self.temperature), 1);
        let teacher_log = log_softmax(teacher_logits.div_scalar(self.temperature), 1);
        let teacher_prob = teacher_log.clone().exp();
        (teacher_prob * (teacher_log - student_log))
            .sum_dim(1)
            .mean()
    }

    /// Mean cross-entropy of the raw student logits against integer labels.
    pub fn hard_loss<B: Backend>(
        &self,
        student_logits: Tensor<B, 2>,
        labels: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        let device = student_logits.device();
        CrossEntropyLossConfig::new()
            .init(&device)
            .forward(student_logits, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn logits(rows: &[[f32; 3]]) -> Tensor<B, 2> {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::<B, 2>::from_data(TensorData::new(flat, [rows.len(), 3]), &Default::default())
    }

    fn labels(values: &[i64]) -> Tensor<B, 1, Int> {
        Tensor::<B, 1, Int>::from_data(
            TensorData::new(values.to_vec(), [values.len()]),
            &Default::default(),
        )
    }

    fn student() -> Tensor<B, 2> {
        logits(&[[2.0, -1.0, 0.5], [0.1, 0.2, 0.3], [-3.0, 4.0, 1.0], [0.0, 0.0, 0.0]])
    }

    fn teacher() -> Tensor<B, 2> {
        logits(&[[1.0, 0.0, -1.0], [5.0, -2.0, 0.0], [0.0, 3.0, 3.0], [-1.0, 2.0, 0.5]])
    }

    fn host_log_softmax(row: &[f32], t: f32) -> Vec<f32> {
        let scaled: Vec<f32> = row.iter().map(|v| v / t).collect();
        let max = scaled.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let lse = max + scaled.iter().map(|v| (v - max).exp()).sum::<f32>().ln();
        scaled.iter().map(|v| v - lse).collect()
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(DistillationLoss::new(0.0, 0.5).is_err());
        assert!(DistillationLoss::new(-1.0, 0.5).is_err());
        assert!(DistillationLoss::new(2.0, 1.5).is_err());
        assert!(DistillationLoss::new(2.0, -0.1).is_err());
        let loss = DistillationLoss::new(4.0, 0.25).unwrap();
        assert_eq!((loss.temperature(), loss.alpha()), (4.0, 0.25));
        assert_eq!(DistillationLoss::default().temperature(), DEFAULT_TEMPERATURE);
    }

    #[test]
    fn loss_is_non_negative() {
        for (t, alpha) in [(1.0, 0.0), (2.0, 0.5), (4.0, 1.0), (0.5, 0.9)] {
            let loss = DistillationLoss::new(t, alpha).unwrap();
            let value = loss.compute(student(), labels(&[0, 2, 1, 1]), teacher());
            assert!(value.is_finite());
            assert!(value >= 0.0, "t={t} alpha={alpha} loss={value}");
        }
    }

    #[test]
    fn alpha_zero_is_pure_cross_entropy_at_any_temperature() {
        let loss_fn = DistillationLoss::default();
        let hard = loss_fn
            .hard_loss(student(), labels(&[0, 2, 1, 1]))
            .into_scalar()
            .elem::<f32>();
        for t in [0.5, 1.0, 2.0, 8.0, 20.0] {
            let loss = DistillationLoss::new(t, 0.0).unwrap();
            let value = loss.compute(student(), labels(&[0, 2, 1, 1]), teacher());
            assert!((value - hard).abs() < 1e-6, "t={t}: {value} vs {hard}");
        }
    }

    #[test]
    fn alpha_one_ignores_labels() {
        let loss = DistillationLoss::new(3.0, 1.0).unwrap();
        let a = loss.compute(student(), labels(&[0, 2, 1, 1]), teacher());
        let b = loss.compute(student(), labels(&[1, 1, 0, 2]), teacher());
        assert!((a - b).abs() < 1e-6);
        let kl = loss.soft_loss(student(), teacher()).into_scalar().elem::<f32>();
        assert!((a - 9.0 * kl).abs() < 1e-5);
    }

    #[test]
    fn soft_term_vanishes_when_teacher_equals_student() {
        let loss = DistillationLoss::default();
        let kl = loss.soft_loss(student(), student()).into_scalar().elem::<f32>();
        assert!(kl.abs() < 1e-7);
    }

    #[test]
    fn matches_host_computation() {
        let (t, alpha) = (2.0f32, 0.5f32);
        let s = [[1.0f32, 0.0, -1.0]];
        let te = [[0.0f32, 1.0, 3.0]];
        let loss = DistillationLoss::new(t, alpha).unwrap();
        let value = loss.compute(logits(&s), labels(&[0]), logits(&te));

        let ls = host_log_softmax(&s[0], t);
        let lt = host_log_softmax(&te[0], t);
        let kl: f32 = lt.iter().zip(&ls).map(|(q, p)| q.exp() * (q - p)).sum();
        let ce = -host_log_softmax(&s[0], 1.0)[0];
        let expected = alpha * t * t * kl + (1.0 - alpha) * ce;
        assert!((value - expected).abs() < 1e-5, "{value} vs {expected}");
    }

    #[test]
    fn extreme_logits_stay_finite() {
        let loss = DistillationLoss::new(1.0, 0.5).unwrap();
        let value = loss.compute(
            logits(&[[1000.0, -1000.0, 0.0]]),
            labels(&[1]),
            logits(&[[-1000.0, 1000.0, 0.0]]),
        );
        assert!(value.is_finite());
        assert!(value > 0.0);
    }

    #[test]
    fn gradient_reaches_student_logits() {
        use burn::backend::Autodiff;
        type AD = Autodiff<B>;
        let device = Default::default();
        let s = Tensor::<AD, 2>::from_data(
            TensorData::new(vec![0.5f32, -0.5, 0.0, 1.0, 1.0, 1.0], [2, 3]),
            &device,
        )
        .require_grad();
        let t = Tensor::<AD, 2>::from_data(
            TensorData::new(vec![3.0f32, 0.0, 0.0, 0.0, 0.0, 3.0], [2, 3]),
            &device,
        );
        let y = Tensor::<AD, 1, Int>::from_data(TensorData::new(vec![0i64, 2], [2]), &device);
        let grads = DistillationLoss::default().forward(s.clone(), y, t).backward();
        let grad = s.grad(&grads).expect("student logits carry a gradient");
        let norm: f32 = grad.into_data().iter::<f32>().map(|g| g.abs()).sum();
        assert!(norm > 0.0);
    }
}
