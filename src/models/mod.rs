use crate::error::{MfError, Result};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One observed rating with dense indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user: usize,
    pub item: usize,
    pub rating: f64,
    pub timestamp: i64,
}

/// Column-oriented rating store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSet {
    users: Vec<usize>,
    items: Vec<usize>,
    ratings: Vec<f64>,
    timestamps: Vec<i64>,
}

/// Borrowed slice of a [`RatingSet`], e.g. one mini-batch.
#[derive(Debug, Clone, Copy)]
pub struct RatingsView<'a> {
    pub users: &'a [usize],
    pub items: &'a [usize],
    pub ratings: &'a [f64],
}

impl RatingSet {
    pub fn new(
        users: Vec<usize>,
        items: Vec<usize>,
        ratings: Vec<f64>,
        timestamps: Vec<i64>,
    ) -> Result<Self> {
        let expected = users.len();
        for (what, got) in [
            ("items", items.len()),
            ("ratings", ratings.len()),
            ("timestamps", timestamps.len()),
        ] {
            if got != expected {
                return Err(MfError::ShapeMismatch {
                    what,
                    got,
                    expected,
                });
            }
        }
        Ok(Self {
            users,
            items,
            ratings,
            timestamps,
        })
    }

    pub fn from_ratings<I: IntoIterator<Item = Rating>>(ratings: I) -> Self {
        let mut set = Self::default();
        for rating in ratings {
            set.push(rating);
        }
        set
    }

    pub fn push(&mut self, rating: Rating) {
        self.users.push(rating.user);
        self.items.push(rating.item);
        self.ratings.push(rating.rating);
        self.timestamps.push(rating.timestamp);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn users(&self) -> &[usize] {
        &self.users
    }

    pub fn items(&self) -> &[usize] {
        &self.items
    }

    pub fn ratings(&self) -> &[f64] {
        &self.ratings
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn get(&self, index: usize) -> Option<Rating> {
        (index < self.len()).then(|| Rating {
            user: self.users[index],
            item: self.items[index],
            rating: self.ratings[index],
            timestamp: self.timestamps[index],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Rating> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    pub fn view(&self) -> RatingsView<'_> {
        RatingsView {
            users: &self.users,
            items: &self.items,
            ratings: &self.ratings,
        }
    }

    /// Borrow the rows in `range`, clipped to the end of the set.
    pub fn slice(&self, range: Range<usize>) -> RatingsView<'_> {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        RatingsView {
            users: &self.users[start..end],
            items: &self.items[start..end],
            ratings: &self.ratings[start..end],
        }
    }

    /// Copy the rows at `indices` in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let mut selected = Self {
            users: Vec::with_capacity(indices.len()),
            items: Vec::with_capacity(indices.len()),
            ratings: Vec::with_capacity(indices.len()),
            timestamps: Vec::with_capacity(indices.len()),
        };
        for &index in indices {
            let rating = self.get(index).ok_or(MfError::IndexOutOfRange {
                what: "rating",
                index,
                len: self.len(),
            })?;
            selected.push(rating);
        }
        Ok(selected)
    }

    pub fn mean_rating(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.ratings.iter().sum::<f64>() / self.len() as f64)
    }
}

impl<'a> RatingsView<'a> {
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Shape of the flattened parameter vector: U row-major followed by V row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorLayout {
    pub n_users: usize,
    pub n_items: usize,
    pub rank: usize,
}

impl FactorLayout {
    pub fn new(n_users: usize, n_items: usize, rank: usize) -> Self {
        Self {
            n_users,
            n_items,
            rank,
        }
    }

    pub fn user_len(&self) -> usize {
        self.n_users * self.rank
    }

    pub fn len(&self) -> usize {
        (self.n_users + self.n_items) * self.rank
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, got: usize) -> Result<()> {
        if got != self.len() {
            return Err(MfError::ShapeMismatch {
                what: "flattened parameters",
                got,
                expected: self.len(),
            });
        }
        Ok(())
    }

    /// View a flat parameter vector as `(U, V)`.
    pub fn split<'a>(
        &self,
        x: ArrayView1<'a, f64>,
    ) -> Result<(ArrayView2<'a, f64>, ArrayView2<'a, f64>)> {
        self.check(x.len())?;
        let (users, items) = x.split_at(Axis(0), self.user_len());
        Ok((
            users.into_shape((self.n_users, self.rank))?,
            items.into_shape((self.n_items, self.rank))?,
        ))
    }

    pub fn split_mut<'a>(
        &self,
        x: ArrayViewMut1<'a, f64>,
    ) -> Result<(ArrayViewMut2<'a, f64>, ArrayViewMut2<'a, f64>)> {
        self.check(x.len())?;
        let (users, items) = x.split_at(Axis(0), self.user_len());
        Ok((
            users.into_shape((self.n_users, self.rank))?,
            items.into_shape((self.n_items, self.rank))?,
        ))
    }
}

/// User and item feature matrices. Deserialization goes through [`FactorPair::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FactorMatrices")]
pub struct FactorPair {
    pub users: Array2<f64>,
    pub items: Array2<f64>,
}

#[derive(Deserialize)]
struct FactorMatrices {
    users: Array2<f64>,
    items: Array2<f64>,
}

impl TryFrom<FactorMatrices> for FactorPair {
    type Error = MfError;

    fn try_from(matrices: FactorMatrices) -> Result<Self> {
        Self::new(matrices.users, matrices.items)
    }
}

impl FactorPair {
    pub fn new(users: Array2<f64>, items: Array2<f64>) -> Result<Self> {
        if users.ncols() != items.ncols() {
            return Err(MfError::ShapeMismatch {
                what: "item factor columns",
                got: items.ncols(),
                expected: users.ncols(),
            });
        }
        Ok(Self { users, items })
    }

    pub fn layout(&self) -> FactorLayout {
        FactorLayout::new(self.users.nrows(), self.items.nrows(), self.users.ncols())
    }

    pub fn rank(&self) -> usize {
        self.users.ncols()
    }

    pub fn flatten(&self) -> Array1<f64> {
        self.users.iter().chain(self.items.iter()).copied().collect()
    }

    pub fn from_flat(layout: FactorLayout, x: ArrayView1<'_, f64>) -> Result<Self> {
        let (users, items) = layout.split(x)?;
        Ok(Self {
            users: users.to_owned(),
            items: items.to_owned(),
        })
    }

    pub fn user_vector(&self, user: usize) -> Option<ArrayView1<'_, f64>> {
        (user < self.users.nrows()).then(|| self.users.slice(s![user, ..]))
    }

    pub fn item_vector(&self, item: usize) -> Option<ArrayView1<'_, f64>> {
        (item < self.items.nrows()).then(|| self.items.slice(s![item, ..]))
    }
}

/// Losses recorded at one checkpoint of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub iteration: usize,
    /// Training rows consumed so far divided by the training set size.
    pub epoch: f64,
    pub train_loss: f64,
    pub validation_loss: f64,
    pub train_rmse: f64,
    pub validation_rmse: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    /// Snapshot with the lowest validation loss.
    pub factors: FactorPair,
    pub best: Checkpoint,
    pub trace: Vec<Checkpoint>,
    pub iterations: usize,
    pub skipped_updates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rating_set_rejects_ragged_columns() {
        let result = RatingSet::new(vec![0, 1], vec![0], vec![1.0, 2.0], vec![0, 0]);
        assert!(matches!(
            result,
            Err(MfError::ShapeMismatch { what: "items", got: 1, expected: 2 })
        ));
    }

    #[test]
    fn test_slice_is_clipped() {
        let set = RatingSet::new(vec![0, 1, 2], vec![0, 1, 2], vec![1.0, 2.0, 3.0], vec![0; 3])
            .unwrap();
        let view = set.slice(2..10);
        assert_eq!(view.len(), 1);
        assert_eq!(view.ratings, &[3.0]);
        assert!(set.slice(5..8).is_empty());
    }

    #[test]
    fn test_select_out_of_range() {
        let set = RatingSet::new(vec![0], vec![0], vec![1.0], vec![0]).unwrap();
        assert!(set.select(&[0, 0]).is_ok());
        assert!(matches!(
            set.select(&[1]),
            Err(MfError::IndexOutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn test_flatten_roundtrip_layout() {
        let factors = FactorPair::new(array![[1.0, 0.5], [0.0, -2.0]], array![[1.0, 2.0]]).unwrap();
        let flat = factors.flatten();
        assert_eq!(flat.to_vec(), vec![1.0, 0.5, 0.0, -2.0, 1.0, 2.0]);

        let layout = factors.layout();
        assert_eq!(layout.len(), 6);
        let (u, v) = layout.split(flat.view()).unwrap();
        assert_eq!(u, factors.users);
        assert_eq!(v, factors.items);
        assert!(layout.split(flat.slice(s![..5])).is_err());
    }

    #[test]
    fn test_factor_pair_rank_mismatch() {
        let result = FactorPair::new(Array2::zeros((2, 3)), Array2::zeros((2, 2)));
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_rank_mismatch() {
        let value = serde_json::json!({
            "users": Array2::<f64>::zeros((1, 2)),
            "items": Array2::<f64>::zeros((1, 3)),
        });
        assert!(serde_json::from_value::<FactorPair>(value).is_err());

        let factors = FactorPair::new(array![[1.0, 0.5]], array![[0.2, -0.1], [0.3, 0.4]]).unwrap();
        let json = serde_json::to_string(&factors).unwrap();
        assert_eq!(serde_json::from_str::<FactorPair>(&json).unwrap(), factors);
    }
}
