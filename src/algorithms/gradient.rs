use super::predict_vec;
use crate::error::Result;
use crate::models::{FactorLayout, RatingsView};
use crate::utils::metrics::rmse;
use crate::utils::scaled_sigmoid_derivative;
use crate::utils::validation::validate_ratings_view;
use ndarray::{Array1, ArrayView1};

/// A scalar function of the flattened parameter vector together with its gradient.
pub trait Objective {
    fn value(&self, x: ArrayView1<'_, f64>) -> Result<f64>;
    fn gradient(&self, x: ArrayView1<'_, f64>) -> Result<Array1<f64>>;
}

/// RMSE + L2 loss over a set of ratings, with its closed-form gradient.
#[derive(Debug, Clone, Copy)]
pub struct RatingObjective<'a> {
    layout: FactorLayout,
    ratings: RatingsView<'a>,
    regularization: f64,
}

impl<'a> RatingObjective<'a> {
    pub fn new(
        layout: FactorLayout,
        ratings: RatingsView<'a>,
        regularization: f64,
    ) -> Result<Self> {
        validate_ratings_view("ratings", &ratings, &layout)?;
        Ok(Self {
            layout,
            ratings,
            regularization,
        })
    }
}

impl Objective for RatingObjective<'_> {
    fn value(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        let (users, items) = self.layout.split(x)?;
        super::loss(users, items, &self.ratings, self.regularization)
    }

    fn gradient(&self, x: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let (users, items) = self.layout.split(x)?;
        let predictions = predict_vec(users, items, self.ratings.users, self.ratings.items)?;
        let error = rmse(&predictions, self.ratings.ratings)?;

        let lambda = self.regularization;
        let mut grad = x.mapv(|p| 2.0 * lambda * p);

        // sqrt has no derivative at 0; take the zero subgradient there. NaN falls through.
        if error != 0.0 {
            let scale = 1.0 / (predictions.len() as f64 * error);
            let (mut grad_users, mut grad_items) = self.layout.split_mut(grad.view_mut())?;
            for (j, &p) in predictions.iter().enumerate() {
                let u = self.ratings.users[j];
                let i = self.ratings.items[j];
                let c = (p - self.ratings.ratings[j]) * scale * scaled_sigmoid_derivative(p);
                grad_users.row_mut(u).scaled_add(c, &items.row(i));
                grad_items.row_mut(i).scaled_add(c, &users.row(u));
            }
        }
        Ok(grad)
    }
}

/// Wraps an objective with a central-difference gradient.
#[derive(Debug, Clone)]
pub struct FiniteDifference<O> {
    inner: O,
    step: f64,
}

impl<O: Objective> FiniteDifference<O> {
    pub fn new(inner: O, step: f64) -> Self {
        Self { inner, step }
    }
}

impl<O: Objective> Objective for FiniteDifference<O> {
    fn value(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        self.inner.value(x)
    }

    fn gradient(&self, x: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let mut probe = x.to_owned();
        let mut grad = Array1::zeros(x.len());
        for k in 0..x.len() {
            let original = probe[k];
            probe[k] = original + self.step;
            let upper = self.inner.value(probe.view())?;
            probe[k] = original - self.step;
            let lower = self.inner.value(probe.view())?;
            probe[k] = original;
            grad[k] = (upper - lower) / (2.0 * self.step);
        }
        Ok(grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MfError;
    use crate::models::{FactorPair, RatingSet};
    use crate::utils::scaled_sigmoid;
    use ndarray::{array, Array2};

    fn fixture() -> (FactorPair, RatingSet) {
        let factors = FactorPair::new(
            array![[0.3, -0.2, 0.5], [0.1, 0.4, -0.3], [-0.6, 0.2, 0.1]],
            array![[0.2, 0.1, -0.4], [0.5, -0.5, 0.3]],
        )
        .unwrap();
        let ratings = RatingSet::new(
            vec![0, 1, 2, 0, 2],
            vec![1, 0, 1, 0, 0],
            vec![4.0, 2.0, 5.0, 1.0, 3.5],
            vec![0; 5],
        )
        .unwrap();
        (factors, ratings)
    }

    fn assert_close(analytic: &Array1<f64>, numeric: &Array1<f64>) {
        for (a, n) in analytic.iter().zip(numeric) {
            assert!((a - n).abs() < 1e-6, "analytic {a} vs numeric {n}");
        }
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let (factors, ratings) = fixture();
        let x = factors.flatten();
        for lambda in [0.0, 0.05] {
            let objective = RatingObjective::new(factors.layout(), ratings.view(), lambda).unwrap();
            let analytic = objective.gradient(x.view()).unwrap();
            let numeric = FiniteDifference::new(objective, 1e-6).gradient(x.view()).unwrap();
            assert_close(&analytic, &numeric);
        }
    }

    #[test]
    fn test_value_matches_loss() {
        let (factors, ratings) = fixture();
        let objective = RatingObjective::new(factors.layout(), ratings.view(), 0.1).unwrap();
        let expected = factors.loss(&ratings.view(), 0.1).unwrap();
        assert_eq!(objective.value(factors.flatten().view()).unwrap(), expected);
    }

    #[test]
    fn test_untouched_rows_only_see_penalty() {
        let (factors, ratings) = fixture();
        let batch = ratings.slice(0..1);
        let lambda = 0.2;
        let objective = RatingObjective::new(factors.layout(), batch, lambda).unwrap();
        let x = factors.flatten();
        let grad = objective.gradient(x.view()).unwrap();
        // user 1 is absent from the first rating
        let layout = factors.layout();
        let (grad_users, _) = layout.split(grad.view()).unwrap();
        for (g, p) in grad_users.row(1).iter().zip(factors.users.row(1)) {
            assert!((g - 2.0 * lambda * p).abs() < 1e-12);
        }
    }

    #[test]
    fn test_penalty_gradient_is_twice_lambda_x() {
        let (factors, ratings) = fixture();
        let x = factors.flatten();
        let layout = factors.layout();
        let unregularized = RatingObjective::new(layout, ratings.view(), 0.0).unwrap();
        let regularized = RatingObjective::new(layout, ratings.view(), 0.5).unwrap();
        let difference =
            regularized.gradient(x.view()).unwrap() - unregularized.gradient(x.view()).unwrap();
        assert_close(&difference, &x);
    }

    #[test]
    fn test_exact_fit_takes_zero_subgradient() {
        // zero factors predict 2.5 everywhere
        let factors = FactorPair::new(Array2::zeros((2, 3)), Array2::zeros((2, 3))).unwrap();
        let ratings = RatingSet::new(vec![0, 1], vec![1, 0], vec![2.5, 2.5], vec![0; 2]).unwrap();
        let layout = factors.layout();
        let x = factors.flatten();

        let objective = RatingObjective::new(layout, ratings.view(), 0.3).unwrap();
        assert_eq!(objective.value(x.view()).unwrap(), 0.0);
        assert_eq!(objective.gradient(x.view()).unwrap(), x.mapv(|p| 2.0 * 0.3 * p));

        let mut shifted = factors.clone();
        shifted.users += 0.25;
        shifted.items += 0.25;
        let ratings =
            RatingSet::new(vec![0], vec![0], vec![scaled_sigmoid(0.1875)], vec![0]).unwrap();
        let x = shifted.flatten();
        let objective = RatingObjective::new(layout, ratings.view(), 0.3).unwrap();
        let grad = objective.gradient(x.view()).unwrap();
        let penalty = x.mapv(|p| 2.0 * 0.3 * p);
        assert!(grad.iter().zip(&penalty).all(|(g, p)| (g - p).abs() < 1e-12));
    }

    #[test]
    fn test_nan_factor_propagates_into_touched_rows() {
        let factors =
            FactorPair::new(array![[0.5, 0.5]], array![[f64::NAN, 1.0], [0.2, 0.1]]).unwrap();
        let ratings = RatingSet::new(vec![0], vec![0], vec![3.0], vec![0]).unwrap();
        let layout = factors.layout();
        let objective = RatingObjective::new(layout, ratings.view(), 0.1).unwrap();
        let x = factors.flatten();

        assert!(objective.value(x.view()).unwrap().is_nan());
        let grad = objective.gradient(x.view()).unwrap();
        let (grad_users, grad_items) = layout.split(grad.view()).unwrap();
        assert!(grad_users.row(0).iter().all(|g| g.is_nan()));
        assert!(grad_items.row(0).iter().all(|g| g.is_nan()));
        // item 1 is not in the batch
        assert!((grad_items[[1, 0]] - 0.04).abs() < 1e-12);
        assert!((grad_items[[1, 1]] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_out_of_range_batch() {
        let (factors, _) = fixture();
        let ratings = RatingSet::new(vec![7], vec![0], vec![3.0], vec![0]).unwrap();
        assert!(matches!(
            RatingObjective::new(factors.layout(), ratings.view(), 0.0),
            Err(MfError::IndexOutOfRange { .. })
        ));
    }
}
