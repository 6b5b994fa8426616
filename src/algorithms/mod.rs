//! Prediction model and loss for sigmoid-bounded matrix factorization.

pub mod gradient;
pub mod initializer;
pub mod optimizer;
pub mod sampler;

use crate::error::{MfError, Result};
use crate::models::{FactorPair, RatingsView};
use crate::utils::metrics::rmse;
use crate::utils::validation::{validate_indices, validate_same_length};
use crate::utils::{scaled_sigmoid, top_k_indices};
use ndarray::{Array1, ArrayView2};
use rayon::prelude::*;
use std::collections::HashSet;

/// Predicted rating for every `(users[j], items[j])` pair:
/// `5 / (1 + exp(-U[u] . V[i]))`.
pub fn predict_ratings(
    user_factors: ArrayView2<'_, f64>,
    item_factors: ArrayView2<'_, f64>,
    users: &[usize],
    items: &[usize],
) -> Result<Array1<f64>> {
    predict_vec(user_factors, item_factors, users, items).map(Array1::from)
}

pub(crate) fn predict_vec(
    user_factors: ArrayView2<'_, f64>,
    item_factors: ArrayView2<'_, f64>,
    users: &[usize],
    items: &[usize],
) -> Result<Vec<f64>> {
    validate_same_length("items", items.len(), users.len())?;
    validate_same_length("item factor columns", item_factors.ncols(), user_factors.ncols())?;
    validate_indices("user", users, user_factors.nrows())?;
    validate_indices("item", items, item_factors.nrows())?;

    Ok(users
        .par_iter()
        .zip(items.par_iter())
        .map(|(&u, &i)| scaled_sigmoid(user_factors.row(u).dot(&item_factors.row(i))))
        .collect())
}

/// Sum of squares of every entry of both matrices.
pub fn l2_penalty(user_factors: ArrayView2<'_, f64>, item_factors: ArrayView2<'_, f64>) -> f64 {
    user_factors.iter().chain(item_factors.iter()).map(|x| x * x).sum()
}

/// `rmse(predict(U, V), ratings) + regularization * l2(U, V)`.
pub fn loss(
    user_factors: ArrayView2<'_, f64>,
    item_factors: ArrayView2<'_, f64>,
    ratings: &RatingsView<'_>,
    regularization: f64,
) -> Result<f64> {
    let predictions = predict_vec(user_factors, item_factors, ratings.users, ratings.items)?;
    let error = rmse(&predictions, ratings.ratings)?;
    Ok(error + regularization * l2_penalty(user_factors, item_factors))
}

impl FactorPair {
    pub fn predict_ratings(&self, ratings: &RatingsView<'_>) -> Result<Array1<f64>> {
        predict_ratings(self.users.view(), self.items.view(), ratings.users, ratings.items)
    }

    pub fn predict(&self, user: usize, item: usize) -> Result<f64> {
        self.check_rank()?;
        let user_vector = self.user_vector(user).ok_or(MfError::IndexOutOfRange {
            what: "user",
            index: user,
            len: self.users.nrows(),
        })?;
        let item_vector = self.item_vector(item).ok_or(MfError::IndexOutOfRange {
            what: "item",
            index: item,
            len: self.items.nrows(),
        })?;
        Ok(scaled_sigmoid(user_vector.dot(&item_vector)))
    }

    pub fn loss(&self, ratings: &RatingsView<'_>, regularization: f64) -> Result<f64> {
        loss(self.users.view(), self.items.view(), ratings, regularization)
    }

    pub fn rmse(&self, ratings: &RatingsView<'_>) -> Result<f64> {
        self.loss(ratings, 0.0)
    }

    /// The `n` highest predicted items for `user`, skipping `exclude`.
    pub fn recommend(&self, user: usize, n: usize, exclude: &[usize]) -> Result<Vec<(usize, f64)>> {
        self.check_rank()?;
        let user_vector = self.user_vector(user).ok_or(MfError::IndexOutOfRange {
            what: "user",
            index: user,
            len: self.users.nrows(),
        })?;
        let excluded: HashSet<usize> = exclude.iter().copied().collect();
        let scores: Vec<f64> = self
            .items
            .outer_iter()
            .enumerate()
            .map(|(item, row)| {
                if excluded.contains(&item) {
                    f64::NEG_INFINITY
                } else {
                    scaled_sigmoid(user_vector.dot(&row))
                }
            })
            .collect();

        Ok(top_k_indices(&scores, n)
            .into_iter()
            .filter(|item| !excluded.contains(item))
            .map(|item| (item, scores[item]))
            .collect())
    }

    fn check_rank(&self) -> Result<()> {
        validate_same_length("item factor columns", self.items.ncols(), self.users.ncols())
    }
}
