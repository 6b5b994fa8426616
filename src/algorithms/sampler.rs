use crate::error::{MfError, Result};
use crate::utils::validation::validate_batch_size;
use std::ops::Range;

/// Rows of mini-batch `iteration`: contiguous, unshuffled, cycling once every
/// `ceil(train_size / batch_size)` iterations. The last batch of a cycle may be short.
pub fn minibatch_indices(
    iteration: usize,
    batch_size: usize,
    train_size: usize,
) -> Result<Range<usize>> {
    MiniBatchSampler::new(train_size, batch_size).map(|sampler| sampler.batch(iteration))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiniBatchSampler {
    train_size: usize,
    batch_size: usize,
    num_batches: usize,
}

impl MiniBatchSampler {
    pub fn new(train_size: usize, batch_size: usize) -> Result<Self> {
        validate_batch_size(batch_size)?;
        if train_size == 0 {
            return Err(MfError::EmptyInput("training set"));
        }
        Ok(Self {
            train_size,
            batch_size,
            num_batches: train_size.div_ceil(batch_size),
        })
    }

    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    pub fn batch(&self, iteration: usize) -> Range<usize> {
        let start = (iteration % self.num_batches) * self.batch_size;
        start..(start + self.batch_size).min(self.train_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_with_short_last_batch() {
        assert_eq!(minibatch_indices(0, 512, 1000).unwrap(), 0..512);
        assert_eq!(minibatch_indices(1, 512, 1000).unwrap(), 512..1000);
        assert_eq!(minibatch_indices(2, 512, 1000).unwrap(), 0..512);
        assert_eq!(minibatch_indices(3, 512, 1000).unwrap(), 512..1000);
    }

    #[test]
    fn test_exact_multiple() {
        let sampler = MiniBatchSampler::new(300, 100).unwrap();
        assert_eq!(sampler.num_batches(), 3);
        assert_eq!(sampler.batch(2), 200..300);
        assert_eq!(sampler.batch(3), 0..100);
    }

    #[test]
    fn test_batch_larger_than_train() {
        let sampler = MiniBatchSampler::new(10, 64).unwrap();
        for it in 0..4 {
            assert_eq!(sampler.batch(it), 0..10);
        }
    }

    #[test]
    fn test_never_leaves_training_set() {
        let sampler = MiniBatchSampler::new(997, 37).unwrap();
        let mut covered = vec![0usize; 997];
        for it in 0..sampler.num_batches() {
            let range = sampler.batch(it);
            assert!(!range.is_empty());
            assert!(range.end <= 997);
            for row in range {
                covered[row] += 1;
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_preconditions() {
        assert!(minibatch_indices(0, 0, 10).is_err());
        assert!(matches!(
            minibatch_indices(0, 8, 0),
            Err(MfError::EmptyInput(_))
        ));
    }
}
