//! TOML experiment configuration.
//!
//! Every key is optional; anything left out falls back to the defaults below.
//! Paths accept `~` and `${VAR}` expansion.

use std::path::{Path, PathBuf};

use fer_dataset::{DatasetConfig, Normalization, DEFAULT_BATCH_SIZE, DEFAULT_SPLIT_SEED, DEFAULT_VAL_RATIO};
use models::ModelPreset;
use serde::Deserialize;

use crate::distill::{DEFAULT_ALPHA, DEFAULT_TEMPERATURE};
use crate::error::{TrainingError, TrainingResult};

const DEFAULT_CONFIG_NAME: &str = "fer-distill.toml";
const CONFIG_ENV: &str = "FER_DISTILL_CONFIG";

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub train_root: PathBuf,
    pub test_root: PathBuf,
    pub image_size: u32,
    pub batch_size: usize,
    pub val_ratio: f32,
    pub split_seed: u64,
    /// ImageNet mean/std normalization after scaling to [0, 1].
    pub normalize: bool,
    pub flip_prob: f32,
    pub jitter_prob: f32,
    pub jitter_strength: f32,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            train_root: PathBuf::from("data/train"),
            test_root: PathBuf::from("data/test"),
            image_size: 48,
            batch_size: DEFAULT_BATCH_SIZE,
            val_ratio: DEFAULT_VAL_RATIO,
            split_seed: DEFAULT_SPLIT_SEED,
            normalize: true,
            flip_prob: 0.5,
            jitter_prob: 0.2,
            jitter_strength: 0.1,
        }
    }
}

impl DataSettings {
    /// Loader settings for the training split; `shuffle_seed` drives order and augmentation.
    pub fn train_config(&self, shuffle_seed: Option<u64>) -> DatasetConfig {
        DatasetConfig {
            image_size: self.image_size,
            normalize: self.normalize.then_some(Normalization::IMAGENET),
            flip_horizontal_prob: self.flip_prob,
            color_jitter_prob: self.jitter_prob,
            color_jitter_strength: self.jitter_strength,
            shuffle: true,
            seed: shuffle_seed,
        }
    }

    /// Validation/test loader settings: no augmentation, storage order.
    pub fn eval_config(&self) -> DatasetConfig {
        self.train_config(None).for_eval()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossSettings {
    pub alpha: f32,
    pub temperature: f32,
}

impl Default for LossSettings {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimKind {
    Sgd,
    Adam,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimSettings {
    pub kind: OptimKind,
    pub learning_rate: f64,
    /// SGD only.
    pub momentum: f64,
    pub weight_decay: f32,
}

impl Default for OptimSettings {
    fn default() -> Self {
        Self {
            kind: OptimKind::Sgd,
            learning_rate: 1e-3,
            momentum: 0.9,
            weight_decay: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleSettings {
    pub step_size: usize,
    pub gamma: f64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            step_size: 7,
            gamma: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainSettings {
    pub max_epochs: usize,
    /// Consecutive non-improving epochs that end training. Must be at least 1.
    pub patience: usize,
    /// `None` draws a fresh shuffle order each run.
    pub shuffle_seed: Option<u64>,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            max_epochs: 250,
            patience: 20,
            shuffle_seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSettings {
    pub student: ModelPreset,
    pub teacher: ModelPreset,
    pub num_classes: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            student: ModelPreset::Compact,
            teacher: ModelPreset::Wide,
            num_classes: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSettings {
    pub checkpoint: PathBuf,
    pub teacher_checkpoint: PathBuf,
    pub plot: PathBuf,
    pub history: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        let checkpoints = PathBuf::from("checkpoints");
        let artifacts = PathBuf::from("artifacts");
        Self {
            checkpoint: checkpoints.join("student.bin"),
            teacher_checkpoint: checkpoints.join("teacher.bin"),
            plot: artifacts.join("training_curves.png"),
            history: artifacts.join("history.json"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentConfig {
    pub data: DataSettings,
    pub loss: LossSettings,
    pub optim: OptimSettings,
    pub schedule: ScheduleSettings,
    pub train: TrainSettings,
    pub model: ModelSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ExperimentConfigFile {
    data: Option<DataSection>,
    loss: Option<LossSection>,
    optim: Option<OptimSection>,
    schedule: Option<ScheduleSection>,
    train: Option<TrainSection>,
    model: Option<ModelSection>,
    paths: Option<PathsSection>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DataSection {
    train_root: Option<String>,
    test_root: Option<String>,
    image_size: Option<u32>,
    batch_size: Option<usize>,
    val_ratio: Option<f32>,
    split_seed: Option<u64>,
    normalize: Option<bool>,
    flip_prob: Option<f32>,
    jitter_prob: Option<f32>,
    jitter_strength: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct LossSection {
    alpha: Option<f32>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OptimSection {
    kind: Option<OptimKind>,
    learning_rate: Option<f64>,
    momentum: Option<f64>,
    weight_decay: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ScheduleSection {
    step_size: Option<usize>,
    gamma: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrainSection {
    max_epochs: Option<usize>,
    patience: Option<usize>,
    shuffle_seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelSection {
    student: Option<ModelPreset>,
    teacher: Option<ModelPreset>,
    num_classes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PathsSection {
    checkpoint: Option<String>,
    teacher_checkpoint: Option<String>,
    plot: Option<String>,
    history: Option<String>,
}

impl ExperimentConfig {
    /// Resolve the configuration file: `explicit`, then `$FER_DISTILL_CONFIG`,
    /// then `fer-distill.toml` in the working directory.
    ///
    /// An explicitly named file must exist. An implicit file that is absent
    /// yields the defaults.
    pub fn load(explicit: Option<&Path>) -> TrainingResult<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match std::env::var(CONFIG_ENV) {
                Ok(path) => (expand_path(&path), true),
                Err(_) => (PathBuf::from(DEFAULT_CONFIG_NAME), false),
            },
        };
        if !path.exists() {
            if required {
                return Err(TrainingError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            tracing::info!(path = %path.display(), "no config file; using defaults");
            let cfg = Self::default();
            cfg.validate()?;
            return Ok(cfg);
        }
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> TrainingResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| TrainingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml_str(&raw)
            .map_err(|e| TrainingError::Config(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> TrainingResult<Self> {
        let file: ExperimentConfigFile =
            toml::from_str(raw).map_err(|e| TrainingError::Config(e.to_string()))?;
        let cfg = Self::from_file(file);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ExperimentConfigFile) -> Self {
        let defaults = Self::default();

        let data = file.data.unwrap_or_default();
        let d = defaults.data;
        let data = DataSettings {
            train_root: data
                .train_root
                .map(|v| expand_path(&v))
                .unwrap_or(d.train_root),
            test_root: data
                .test_root
                .map(|v| expand_path(&v))
                .unwrap_or(d.test_root),
            image_size: data.image_size.unwrap_or(d.image_size),
            batch_size: data.batch_size.unwrap_or(d.batch_size),
            val_ratio: data.val_ratio.unwrap_or(d.val_ratio),
            split_seed: data.split_seed.unwrap_or(d.split_seed),
            normalize: data.normalize.unwrap_or(d.normalize),
            flip_prob: data.flip_prob.unwrap_or(d.flip_prob),
            jitter_prob: data.jitter_prob.unwrap_or(d.jitter_prob),
            jitter_strength: data.jitter_strength.unwrap_or(d.jitter_strength),
        };

        let loss = file.loss.unwrap_or_default();
        let loss = LossSettings {
            alpha: loss.alpha.unwrap_or(defaults.loss.alpha),
            temperature: loss.temperature.unwrap_or(defaults.loss.temperature),
        };

        let optim = file.optim.unwrap_or_default();
        let o = defaults.optim;
        let optim = OptimSettings {
            kind: optim.kind.unwrap_or(o.kind),
            learning_rate: optim.learning_rate.unwrap_or(o.learning_rate),
            momentum: optim.momentum.unwrap_or(o.momentum),
            weight_decay: optim.weight_decay.unwrap_or(o.weight_decay),
        };

        let schedule = file.schedule.unwrap_or_default();
        let schedule = ScheduleSettings {
            step_size: schedule.step_size.unwrap_or(defaults.schedule.step_size),
            gamma: schedule.gamma.unwrap_or(defaults.schedule.gamma),
        };

        let train = file.train.unwrap_or_default();
        let train = TrainSettings {
            max_epochs: train.max_epochs.unwrap_or(defaults.train.max_epochs),
            patience: train.patience.unwrap_or(defaults.train.patience),
            shuffle_seed: train.shuffle_seed.or(defaults.train.shuffle_seed),
        };

        let model = file.model.unwrap_or_default();
        let model = ModelSettings {
            student: model.student.unwrap_or(defaults.model.student),
            teacher: model.teacher.unwrap_or(defaults.model.teacher),
            num_classes: model.num_classes.unwrap_or(defaults.model.num_classes),
        };

        let paths = file.paths.unwrap_or_default();
        let p = defaults.paths;
        let paths = PathSettings {
            checkpoint: paths
                .checkpoint
                .map(|v| expand_path(&v))
                .unwrap_or(p.checkpoint),
            teacher_checkpoint: paths
                .teacher_checkpoint
                .map(|v| expand_path(&v))
                .unwrap_or(p.teacher_checkpoint),
            plot: paths.plot.map(|v| expand_path(&v)).unwrap_or(p.plot),
            history: paths.history.map(|v| expand_path(&v)).unwrap_or(p.history),
        };

        Self {
            data,
            loss,
            optim,
            schedule,
            train,
            model,
            paths,
        }
    }

    /// Reject settings the run cannot proceed with.
    pub fn validate(&self) -> TrainingResult<()> {
        let mut problems = Vec::new();
        if !(0.0..=1.0).contains(&self.loss.alpha) {
            problems.push(format!("loss.alpha must be in [0, 1], got {}", self.loss.alpha));
        }
        if !(self.loss.temperature.is_finite() && self.loss.temperature > 0.0) {
            problems.push(format!(
                "loss.temperature must be > 0, got {}",
                self.loss.temperature
            ));
        }
        if self.data.image_size == 0 {
            problems.push("data.image_size must be > 0".to_string());
        }
        if self.data.batch_size == 0 {
            problems.push("data.batch_size must be > 0".to_string());
        }
        if !(self.data.val_ratio > 0.0 && self.data.val_ratio < 1.0) {
            problems.push(format!(
                "data.val_ratio must be in (0, 1), got {}",
                self.data.val_ratio
            ));
        }
        for (name, p) in [
            ("data.flip_prob", self.data.flip_prob),
            ("data.jitter_prob", self.data.jitter_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                problems.push(format!("{name} must be in [0, 1], got {p}"));
            }
        }
        if !(self.optim.learning_rate.is_finite() && self.optim.learning_rate >= 0.0) {
            problems.push(format!(
                "optim.learning_rate must be >= 0, got {}",
                self.optim.learning_rate
            ));
        }
        if !(0.0..1.0).contains(&self.optim.momentum) {
            problems.push(format!(
                "optim.momentum must be in [0, 1), got {}",
                self.optim.momentum
            ));
        }
        if self.schedule.step_size == 0 {
            problems.push("schedule.step_size must be > 0".to_string());
        }
        if !(self.schedule.gamma > 0.0) {
            problems.push(format!("schedule.gamma must be > 0, got {}", self.schedule.gamma));
        }
        if self.train.max_epochs == 0 {
            problems.push("train.max_epochs must be > 0".to_string());
        }
        if self.train.patience == 0 {
            problems.push("train.patience must be > 0".to_string());
        }
        if self.model.num_classes < 2 {
            problems.push("model.num_classes must be >= 2".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(TrainingError::Config(problems.join("; ")))
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

/// Replace `${VAR}` with its value; unknown variables are left as written.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&rest[start..start + end + 3]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_run() {
        let cfg = ExperimentConfig::default();
        assert_eq!(cfg.loss.alpha, 0.5);
        assert_eq!(cfg.loss.temperature, 2.0);
        assert_eq!(cfg.data.batch_size, 32);
        assert_eq!(cfg.data.split_seed, 42);
        assert_eq!(cfg.schedule.step_size, 7);
        assert_eq!(cfg.train.max_epochs, 250);
        assert_eq!(cfg.train.patience, 20);
        assert_eq!(cfg.model.num_classes, 7);
        assert_eq!(cfg.optim.kind, OptimKind::Sgd);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let cfg = ExperimentConfig::from_toml_str(
            r#"
            [loss]
            alpha = 0.9

            [optim]
            kind = "adam"
            learning_rate = 0.01

            [model]
            student = "linear"

            [paths]
            plot = "out/curves.png"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.loss.alpha, 0.9);
        assert_eq!(cfg.loss.temperature, 2.0);
        assert_eq!(cfg.optim.kind, OptimKind::Adam);
        assert_eq!(cfg.optim.learning_rate, 0.01);
        assert_eq!(cfg.model.student, ModelPreset::Linear);
        assert_eq!(cfg.model.teacher, ModelPreset::Wide);
        assert_eq!(cfg.paths.plot, PathBuf::from("out/curves.png"));
        assert_eq!(cfg.paths.history, PathSettings::default().history);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ExperimentConfig::from_toml_str("[loss]\nalpha = 1.5\n").is_err());
        assert!(ExperimentConfig::from_toml_str("[loss]\ntemperature = 0.0\n").is_err());
        assert!(ExperimentConfig::from_toml_str("[data]\nbatch_size = 0\n").is_err());
        assert!(ExperimentConfig::from_toml_str("[optim]\nkind = \"rmsprop\"\n").is_err());
        assert!(ExperimentConfig::from_toml_str("[train]\nepochs = 3\n").is_err());
        assert!(ExperimentConfig::from_toml_str("[train]\npatience = 0\n").is_err());
        assert!(ExperimentConfig::from_toml_str("[train]\npatience = 1\n").is_ok());
        assert!(ExperimentConfig::from_toml_str("not toml at all [").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let missing = Path::new("/definitely/not/here/fer-distill.toml");
        assert!(matches!(
            ExperimentConfig::load(Some(missing)),
            Err(TrainingError::Config(_))
        ));
    }

    #[test]
    fn env_and_home_are_expanded() {
        std::env::set_var("FER_DISTILL_TEST_ROOT", "/srv/fer");
        assert_eq!(
            expand_path("${FER_DISTILL_TEST_ROOT}/train"),
            PathBuf::from("/srv/fer/train")
        );
        assert_eq!(expand_env("${FER_DISTILL_UNSET_VAR}/x"), "${FER_DISTILL_UNSET_VAR}/x");
        assert_eq!(expand_env("plain/${unterminated"), "plain/${unterminated");
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expand_path("~/data"), PathBuf::from(format!("{home}/data")));
        }
    }
}
