use crate::algorithms::initializer::InitializationMethod;
use crate::error::{MfError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub ratings_path: PathBuf,
    pub train_fraction: f64,
    pub validation_fraction: f64,
    pub split_seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of latent factors K shared by users and items.
    pub rank: usize,
    /// L2 coefficient applied to both full factor matrices.
    pub regularization: f64,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// May be fractional, e.g. half an epoch.
    pub epochs: f64,
    /// Number of evenly spaced checkpoints.
    pub log_steps: usize,
    /// Size of the training subsample evaluated at each checkpoint.
    pub train_eval_size: usize,
    pub seed: u64,
    pub init: InitializationMethod,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    /// Skip updates whose gradient holds NaN or infinity instead of applying them.
    pub skip_non_finite_updates: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ratings_path: PathBuf::from("data/ml-1m/ratings.dat"),
            train_fraction: 0.8,
            validation_fraction: 0.1,
            split_seed: 0,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            rank: 10,
            regularization: 0.0,
            batch_size: 512,
            learning_rate: 0.01,
            epochs: 1.0,
            log_steps: 20,
            train_eval_size: 10_000,
            seed: 0,
            init: InitializationMethod::Normal {
                mean: 0.0,
                std_dev: 0.1,
            },
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            skip_non_finite_updates: false,
        }
    }
}

impl DataConfig {
    pub fn validate(&self) -> Result<()> {
        let fractions = [self.train_fraction, self.validation_fraction];
        if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
            return Err(MfError::InvalidConfig(
                "split fractions must lie in [0, 1]".to_string(),
            ));
        }
        if self.train_fraction + self.validation_fraction > 1.0 {
            return Err(MfError::InvalidConfig(format!(
                "train ({}) and validation ({}) fractions exceed 1",
                self.train_fraction, self.validation_fraction
            )));
        }
        Ok(())
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rank == 0 {
            return Err(MfError::InvalidConfig("rank must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(MfError::InvalidConfig(
                "batch size must be positive".to_string(),
            ));
        }
        if self.log_steps == 0 {
            return Err(MfError::InvalidConfig(
                "at least one checkpoint is required".to_string(),
            ));
        }
        if self.train_eval_size == 0 {
            return Err(MfError::InvalidConfig(
                "train evaluation subsample must not be empty".to_string(),
            ));
        }
        if !(self.regularization >= 0.0 && self.regularization.is_finite()) {
            return Err(MfError::InvalidConfig(format!(
                "regularization must be finite and non-negative, got {}",
                self.regularization
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(MfError::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.epochs > 0.0 && self.epochs.is_finite()) {
            return Err(MfError::InvalidConfig(format!(
                "epochs must be positive, got {}",
                self.epochs
            )));
        }
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(MfError::InvalidConfig(format!(
                    "{name} must lie in [0, 1), got {beta}"
                )));
            }
        }
        if !(self.epsilon > 0.0) {
            return Err(MfError::InvalidConfig("epsilon must be positive".to_string()));
        }
        self.init.validate()
    }

    /// `round(epochs * train_size / batch_size)`.
    pub fn total_iterations(&self, train_size: usize) -> usize {
        (self.epochs * train_size as f64 / self.batch_size as f64).round() as usize
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("MFREC").separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        self.training.validate()
    }
}
