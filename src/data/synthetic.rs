use super::{Dataset, RawRating};
use crate::error::{MfError, Result};
use ndarray::Array2;
use ndarray_rand::rand_distr::{Distribution, Normal, StandardNormal};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Reproducible generator of integer ratings in `[1, 5]` drawn from
/// `round(mean + signal * u.v + noise * e)`, with `u`, `v` latent vectors of
/// unit expected dot-product variance and `e` standard normal.
#[derive(Debug, Clone)]
pub struct SyntheticRatings {
    pub n_users: usize,
    pub n_items: usize,
    pub rank: usize,
    /// Probability that a (user, item) pair is observed.
    pub density: f64,
    pub mean: f64,
    pub signal: f64,
    pub noise: f64,
    pub seed: u64,
}

impl Default for SyntheticRatings {
    fn default() -> Self {
        Self {
            n_users: 200,
            n_items: 100,
            rank: 3,
            density: 0.2,
            mean: 3.5,
            signal: 1.0,
            noise: 0.3,
            seed: 0,
        }
    }
}

impl SyntheticRatings {
    pub fn generate(&self) -> Result<Dataset> {
        if self.rank == 0 {
            return Err(MfError::InvalidConfig("rank must be positive".to_string()));
        }
        if !(self.density > 0.0 && self.density <= 1.0) {
            return Err(MfError::InvalidConfig(format!(
                "density must lie in (0, 1], got {}",
                self.density
            )));
        }
        let noise = Normal::new(0.0, self.noise.abs())
            .map_err(|e| MfError::InvalidConfig(e.to_string()))?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let scale = (self.rank as f64).powf(-0.25);
        let (user_shape, item_shape) = ((self.n_users, self.rank), (self.n_items, self.rank));
        let users = Array2::<f64>::random_using(user_shape, StandardNormal, &mut rng) * scale;
        let items = Array2::<f64>::random_using(item_shape, StandardNormal, &mut rng) * scale;

        let mut raw = Vec::new();
        let mut timestamp = 956_703_932;
        for u in 0..self.n_users {
            for i in 0..self.n_items {
                if rng.gen::<f64>() >= self.density {
                    continue;
                }
                let value = self.mean
                    + self.signal * users.row(u).dot(&items.row(i))
                    + noise.sample(&mut rng);
                raw.push(RawRating {
                    user_id: u as u64 + 1,
                    item_id: i as u64 + 1,
                    rating: value.round().clamp(1.0, 5.0),
                    timestamp,
                });
                timestamp += 1 + rng.gen_range(0..600);
            }
        }
        Ok(Dataset::from_raw(&raw))
    }
}
