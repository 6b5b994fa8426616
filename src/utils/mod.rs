pub mod metrics;
pub mod validation;

/// Upper bound of the rating scale; predictions are squashed into `[0, RATING_SCALE]`.
pub const RATING_SCALE: f64 = 5.0;

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// `5 / (1 + exp(-x))`.
pub fn scaled_sigmoid(x: f64) -> f64 {
    RATING_SCALE * sigmoid(x)
}

/// Derivative of [`scaled_sigmoid`] expressed through its output `p`.
pub fn scaled_sigmoid_derivative(p: f64) -> f64 {
    p * (1.0 - p / RATING_SCALE)
}

pub fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut indexed_scores: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();

    indexed_scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    indexed_scores.into_iter().take(k).map(|(i, _)| i).collect()
}

/// `min(count, total)` iteration numbers spread evenly over `[0, total - 1]`.
pub fn checkpoint_iterations(total: usize, count: usize) -> Vec<usize> {
    let count = count.min(total);
    match count {
        0 => Vec::new(),
        1 => vec![total - 1],
        _ => {
            let last = (total - 1) as f64;
            let span = (count - 1) as f64;
            (0..count)
                .map(|c| (c as f64 * last / span).round() as usize)
                .collect()
        }
    }
}

pub fn all_finite<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> bool {
    values.into_iter().all(|v| v.is_finite())
}
