use crate::error::{MfError, Result};
use crate::models::{FactorLayout, RatingSet, RatingsView};

pub fn validate_same_length(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MfError::ShapeMismatch {
            what,
            got,
            expected,
        });
    }
    Ok(())
}

pub fn validate_indices(what: &'static str, indices: &[usize], len: usize) -> Result<()> {
    match indices.iter().find(|&&index| index >= len) {
        Some(&index) => Err(MfError::IndexOutOfRange { what, index, len }),
        None => Ok(()),
    }
}

pub fn validate_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(MfError::InvalidConfig("batch size cannot be zero".to_string()));
    }
    Ok(())
}

/// Check that a view is non-empty, column-consistent and addresses rows inside `layout`.
pub fn validate_ratings_view(
    what: &'static str,
    ratings: &RatingsView<'_>,
    layout: &FactorLayout,
) -> Result<()> {
    if ratings.is_empty() {
        return Err(MfError::EmptyInput(what));
    }
    validate_same_length("items", ratings.items.len(), ratings.users.len())?;
    validate_same_length("ratings", ratings.ratings.len(), ratings.users.len())?;
    validate_indices("user", ratings.users, layout.n_users)?;
    validate_indices("item", ratings.items, layout.n_items)
}

pub fn validate_rating_set(
    what: &'static str,
    set: &RatingSet,
    layout: &FactorLayout,
) -> Result<()> {
    validate_ratings_view(what, &set.view(), layout)
}
