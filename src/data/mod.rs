pub mod movielens;
pub mod synthetic;

use crate::config::DataConfig;
use crate::error::{MfError, Result};
use crate::models::{Rating, RatingSet};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// A rating keyed by the identifiers found in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawRating {
    pub user_id: u64,
    pub item_id: u64,
    pub rating: f64,
    pub timestamp: i64,
}

/// Maps external identifiers onto dense zero-based indices, numbered in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdIndex {
    ids: Vec<u64>,
    positions: BTreeMap<u64, usize>,
}

impl IdIndex {
    pub fn from_ids<I: IntoIterator<Item = u64>>(ids: I) -> Self {
        let positions: BTreeMap<u64, usize> = ids.into_iter().map(|id| (id, 0)).collect();
        let ids: Vec<u64> = positions.keys().copied().collect();
        let positions = ids.iter().enumerate().map(|(index, &id)| (id, index)).collect();
        Self { ids, positions }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn index_of(&self, id: u64) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn id_of(&self, index: usize) -> Option<u64> {
        self.ids.get(index).copied()
    }
}

/// All ratings of a source together with the id remapping that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub users: IdIndex,
    pub items: IdIndex,
    pub ratings: RatingSet,
}

/// Disjoint train / validation / test partitions of a [`Dataset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partitions {
    pub train: RatingSet,
    pub validation: RatingSet,
    pub test: RatingSet,
}

impl Dataset {
    pub fn from_raw(raw: &[RawRating]) -> Self {
        let users = IdIndex::from_ids(raw.iter().map(|r| r.user_id));
        let items = IdIndex::from_ids(raw.iter().map(|r| r.item_id));

        let ratings = RatingSet::from_ratings(raw.iter().filter_map(|r| {
            Some(Rating {
                user: users.index_of(r.user_id)?,
                item: items.index_of(r.item_id)?,
                rating: r.rating,
                timestamp: r.timestamp,
            })
        }));

        Self {
            users,
            items,
            ratings,
        }
    }

    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Shuffle with `seed` and cut into train/validation/test by the given
    /// fractions; the test partition receives the remainder.
    pub fn split(
        &self,
        train_fraction: f64,
        validation_fraction: f64,
        seed: u64,
    ) -> Result<Partitions> {
        DataConfig {
            train_fraction,
            validation_fraction,
            split_seed: seed,
            ..DataConfig::default()
        }
        .validate()?;
        if self.is_empty() {
            return Err(MfError::EmptyInput("dataset"));
        }

        let n = self.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));

        let n_train = ((n as f64 * train_fraction).round() as usize).min(n);
        let n_validation = ((n as f64 * validation_fraction).round() as usize).min(n - n_train);

        let partitions = Partitions {
            train: self.ratings.select(&order[..n_train])?,
            validation: self.ratings.select(&order[n_train..n_train + n_validation])?,
            test: self.ratings.select(&order[n_train + n_validation..])?,
        };
        info!(
            train = partitions.train.len(),
            validation = partitions.validation.len(),
            test = partitions.test.len(),
            "split ratings"
        );
        Ok(partitions)
    }

    pub fn split_with(&self, config: &DataConfig) -> Result<Partitions> {
        self.split(config.train_fraction, config.validation_fraction, config.split_seed)
    }
}
