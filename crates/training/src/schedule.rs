//! Step learning-rate decay: `lr = initial * gamma^(steps / step_size)`.

/// Advanced once per completed epoch by the training loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLr {
    initial_lr: f64,
    step_size: usize,
    gamma: f64,
    steps: usize,
}

impl StepLr {
    pub const DEFAULT_STEP_SIZE: usize = 7;
    pub const DEFAULT_GAMMA: f64 = 0.1;

    pub fn new(initial_lr: f64, step_size: usize, gamma: f64) -> Self {
        Self {
            initial_lr,
            step_size: step_size.max(1),
            gamma,
            steps: 0,
        }
    }

    pub fn with_defaults(initial_lr: f64) -> Self {
        Self::new(initial_lr, Self::DEFAULT_STEP_SIZE, Self::DEFAULT_GAMMA)
    }

    /// Learning rate for the current epoch.
    pub fn lr(&self) -> f64 {
        let decays = (self.steps / self.step_size) as i32;
        self.initial_lr * self.gamma.powi(decays)
    }

    /// Advance one epoch and return the new learning rate.
    pub fn step(&mut self) -> f64 {
        self.steps += 1;
        self.lr()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}
