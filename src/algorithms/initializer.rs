use crate::error::{MfError, Result};
use crate::models::FactorPair;
use ndarray::Array2;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum InitializationMethod {
    Normal { mean: f64, std_dev: f64 },
    Uniform { low: f64, high: f64 },
}

impl InitializationMethod {
    pub fn validate(&self) -> Result<()> {
        match *self {
            InitializationMethod::Normal { mean, std_dev } => {
                if !(mean.is_finite() && std_dev.is_finite() && std_dev >= 0.0) {
                    return Err(MfError::InvalidConfig(format!(
                        "invalid normal initialization: mean {mean}, std_dev {std_dev}"
                    )));
                }
            }
            InitializationMethod::Uniform { low, high } => {
                if !(low.is_finite() && high.is_finite() && low < high) {
                    return Err(MfError::InvalidConfig(format!(
                        "uniform initialization needs low < high, got {low} / {high}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn initialize_matrix<R: Rng + ?Sized>(
        &self,
        rows: usize,
        cols: usize,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        self.validate()?;
        let matrix = match *self {
            InitializationMethod::Normal { mean, std_dev } => {
                let normal = Normal::new(mean, std_dev)
                    .map_err(|e| MfError::InvalidConfig(e.to_string()))?;
                Array2::random_using((rows, cols), normal, rng)
            }
            InitializationMethod::Uniform { low, high } => {
                Array2::random_using((rows, cols), Uniform::new(low, high), rng)
            }
        };
        Ok(matrix)
    }
}

/// Seeded factor initialization: the same seed always yields the same matrices.
#[derive(Debug, Clone)]
pub struct FactorInitializer {
    method: InitializationMethod,
    rank: usize,
    seed: u64,
}

impl FactorInitializer {
    pub fn new(method: InitializationMethod, rank: usize, seed: u64) -> Self {
        Self { method, rank, seed }
    }

    pub fn initialize(&self, n_users: usize, n_items: usize) -> Result<FactorPair> {
        if self.rank == 0 {
            return Err(MfError::InvalidConfig("rank must be positive".to_string()));
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let users = self.method.initialize_matrix(n_users, self.rank, &mut rng)?;
        let items = self.method.initialize_matrix(n_items, self.rank, &mut rng)?;
        FactorPair::new(users, items)
    }
}
