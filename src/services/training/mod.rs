use crate::algorithms::gradient::{Objective, RatingObjective};
use crate::algorithms::initializer::FactorInitializer;
use crate::algorithms::optimizer::{Adam, Optimizer};
use crate::algorithms::sampler::MiniBatchSampler;
use crate::algorithms::l2_penalty;
use crate::config::TrainingConfig;
use crate::data::{Dataset, Partitions};
use crate::error::{MfError, Result};
use crate::models::{Checkpoint, FactorLayout, FactorPair, RatingSet, TrainingOutcome};
use crate::services::reporting::ProgressSink;
use crate::utils::metrics::EvaluationReport;
use crate::utils::validation::validate_rating_set;
use crate::utils::{all_finite, checkpoint_iterations};
use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Partitions and entity counts a training run reads from.
#[derive(Debug, Clone, Copy)]
pub struct TrainingContext<'a> {
    pub train: &'a RatingSet,
    pub validation: &'a RatingSet,
    pub n_users: usize,
    pub n_items: usize,
}

impl<'a> TrainingContext<'a> {
    pub fn new(
        train: &'a RatingSet,
        validation: &'a RatingSet,
        n_users: usize,
        n_items: usize,
    ) -> Self {
        Self {
            train,
            validation,
            n_users,
            n_items,
        }
    }

    pub fn from_partitions(dataset: &Dataset, partitions: &'a Partitions) -> Self {
        Self::new(
            &partitions.train,
            &partitions.validation,
            dataset.n_users(),
            dataset.n_items(),
        )
    }
}

/// Runs Adam over cyclic mini-batches and keeps the snapshot with the lowest validation loss.
#[derive(Debug, Clone)]
pub struct TrainingService {
    config: TrainingConfig,
}

impl TrainingService {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn initial_factors(&self, n_users: usize, n_items: usize) -> Result<FactorPair> {
        FactorInitializer::new(self.config.init.clone(), self.config.rank, self.config.seed)
            .initialize(n_users, n_items)
    }

    pub fn train(
        &self,
        context: &TrainingContext<'_>,
        initial: Option<FactorPair>,
        sink: &mut dyn ProgressSink,
    ) -> Result<TrainingOutcome> {
        let config = &self.config;
        let layout = FactorLayout::new(context.n_users, context.n_items, config.rank);
        validate_rating_set("training set", context.train, &layout)?;
        validate_rating_set("validation set", context.validation, &layout)?;

        let factors = match initial {
            Some(factors) => {
                if factors.layout() != layout {
                    return Err(MfError::ShapeMismatch {
                        what: "initial factors",
                        got: factors.layout().len(),
                        expected: layout.len(),
                    });
                }
                factors
            }
            None => self.initial_factors(context.n_users, context.n_items)?,
        };

        let train_size = context.train.len();
        let sampler = MiniBatchSampler::new(train_size, config.batch_size)?;
        let total = config.total_iterations(train_size);
        if total == 0 {
            return Err(MfError::InvalidConfig(format!(
                "{} epochs of {} ratings in batches of {} is zero iterations",
                config.epochs, train_size, config.batch_size
            )));
        }
        let checkpoints = checkpoint_iterations(total, config.log_steps);
        let train_sample = self.evaluation_sample(context.train)?;

        info!(
            iterations = total,
            checkpoints = checkpoints.len(),
            parameters = layout.len(),
            "starting training: rank {}, lambda {}, batch {}, step {}",
            config.rank,
            config.regularization,
            config.batch_size,
            config.learning_rate
        );

        let started = Instant::now();
        let mut x = factors.flatten();
        let mut optimizer = Adam::from_config(config);
        let mut pending = checkpoints.iter().copied().peekable();
        let mut trace = Vec::with_capacity(checkpoints.len());
        let mut best: Option<(Checkpoint, Array1<f64>)> = None;
        let mut skipped_updates = 0;
        let mut consumed = 0;

        for iteration in 0..total {
            let batch = context.train.slice(sampler.batch(iteration));
            consumed += batch.len();
            let objective = RatingObjective::new(layout, batch, config.regularization)?;
            let gradients = objective.gradient(x.view())?;

            if config.skip_non_finite_updates && !all_finite(gradients.iter()) {
                skipped_updates += 1;
                warn!(iteration, "skipping update with non-finite gradient");
            } else {
                optimizer.update(&mut x, &gradients)?;
            }

            if pending.next_if_eq(&iteration).is_none() {
                continue;
            }
            let epoch = consumed as f64 / train_size as f64;
            let checkpoint = self.checkpoint(
                layout,
                x.view(),
                &train_sample,
                context.validation,
                iteration,
                epoch,
            )?;
            sink.record(&checkpoint);

            let improved = best.as_ref().map_or(true, |(current, _)| {
                improves(checkpoint.validation_loss, current.validation_loss)
            });
            if improved {
                debug!(
                    iteration,
                    validation_loss = checkpoint.validation_loss,
                    "new best snapshot"
                );
                best = Some((checkpoint, x.clone()));
            }
            trace.push(checkpoint);
        }

        let (best, snapshot) = best.ok_or(MfError::NoCheckpoint)?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            best_iteration = best.iteration,
            best_validation_loss = best.validation_loss,
            skipped_updates,
            "training finished"
        );

        Ok(TrainingOutcome {
            factors: FactorPair::from_flat(layout, snapshot.view())?,
            best,
            trace,
            iterations: total,
            skipped_updates,
        })
    }

    /// Fixed random subsample of the training set evaluated at every checkpoint.
    fn evaluation_sample(&self, train: &RatingSet) -> Result<RatingSet> {
        if train.len() <= self.config.train_eval_size {
            return Ok(train.clone());
        }
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(1));
        let indices = rand::seq::index::sample(&mut rng, train.len(), self.config.train_eval_size);
        train.select(&indices.into_vec())
    }

    fn checkpoint(
        &self,
        layout: FactorLayout,
        x: ArrayView1<'_, f64>,
        train_sample: &RatingSet,
        validation: &RatingSet,
        iteration: usize,
        epoch: f64,
    ) -> Result<Checkpoint> {
        let (users, items) = layout.split(x)?;
        let penalty = self.config.regularization * l2_penalty(users, items);
        let train_rmse = crate::algorithms::loss(users, items, &train_sample.view(), 0.0)?;
        let validation_rmse = crate::algorithms::loss(users, items, &validation.view(), 0.0)?;
        Ok(Checkpoint {
            iteration,
            epoch,
            train_loss: train_rmse + penalty,
            validation_loss: validation_rmse + penalty,
            train_rmse,
            validation_rmse,
        })
    }
}

/// Strictly lower wins; any number beats NaN.
fn improves(candidate: f64, best: f64) -> bool {
    candidate < best || (best.is_nan() && !candidate.is_nan())
}

pub fn evaluate_partition(factors: &FactorPair, ratings: &RatingSet) -> Result<EvaluationReport> {
    let predictions = factors.predict_ratings(&ratings.view())?;
    EvaluationReport::compute(&predictions.to_vec(), ratings.ratings())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::SyntheticRatings;
    use crate::services::reporting::{NoopSink, TraceRecorder};

    fn small_dataset() -> (Dataset, Partitions) {
        let dataset = SyntheticRatings {
            n_users: 30,
            n_items: 20,
            density: 0.5,
            ..SyntheticRatings::default()
        }
        .generate()
        .unwrap();
        let partitions = dataset.split(0.8, 0.1, 0).unwrap();
        (dataset, partitions)
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            rank: 3,
            batch_size: 32,
            learning_rate: 0.02,
            epochs: 2.0,
            log_steps: 5,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_improves() {
        assert!(improves(1.0, 2.0));
        assert!(!improves(2.0, 2.0));
        assert!(!improves(f64::NAN, 2.0));
        assert!(improves(3.0, f64::NAN));
    }

    #[test]
    fn test_trace_matches_checkpoint_schedule() {
        let (dataset, partitions) = small_dataset();
        let context = TrainingContext::from_partitions(&dataset, &partitions);
        let service = TrainingService::new(config()).unwrap();
        let mut recorder = TraceRecorder::default();
        let outcome = service.train(&context, None, &mut recorder).unwrap();

        let total = config().total_iterations(partitions.train.len());
        assert_eq!(outcome.iterations, total);
        let iterations: Vec<usize> = outcome.trace.iter().map(|c| c.iteration).collect();
        assert_eq!(iterations, checkpoint_iterations(total, 5));
        assert_eq!(recorder.checkpoints, outcome.trace);
        assert_eq!(
            outcome.factors.layout(),
            FactorLayout::new(dataset.n_users(), dataset.n_items(), 3)
        );
    }

    #[test]
    fn test_epoch_counts_rows_consumed() {
        let (dataset, partitions) = small_dataset();
        let context = TrainingContext::from_partitions(&dataset, &partitions);
        let n = partitions.train.len();
        let batch_size = n / 3 + 1;
        assert_ne!(n % batch_size, 0);
        let service = TrainingService::new(TrainingConfig {
            batch_size,
            log_steps: 100,
            ..config()
        })
        .unwrap();
        let outcome = service.train(&context, None, &mut NoopSink).unwrap();
        assert_eq!(outcome.trace.len(), outcome.iterations);

        let sampler = MiniBatchSampler::new(n, batch_size).unwrap();
        let mut consumed = 0;
        for checkpoint in &outcome.trace {
            consumed += sampler.batch(checkpoint.iteration).len();
            assert_eq!(checkpoint.epoch, consumed as f64 / n as f64);
        }
        // the short third batch closes the first pass exactly
        assert_eq!(outcome.trace[sampler.num_batches() - 1].epoch, 1.0);
    }

    #[test]
    fn test_training_is_deterministic() {
        let (dataset, partitions) = small_dataset();
        let context = TrainingContext::from_partitions(&dataset, &partitions);
        let service = TrainingService::new(config()).unwrap();
        let a = service.train(&context, None, &mut NoopSink).unwrap();
        let b = service.train(&context, None, &mut NoopSink).unwrap();
        assert_eq!(a.factors, b.factors);
        assert_eq!(a.trace, b.trace);
    }

    #[test]
    fn test_rejects_empty_validation_and_bad_initial_factors() {
        let (dataset, partitions) = small_dataset();
        let service = TrainingService::new(config()).unwrap();

        let empty = RatingSet::default();
        let context =
            TrainingContext::new(&partitions.train, &empty, dataset.n_users(), dataset.n_items());
        assert!(matches!(
            service.train(&context, None, &mut NoopSink),
            Err(MfError::EmptyInput(_))
        ));

        let context = TrainingContext::from_partitions(&dataset, &partitions);
        let wrong = service.initial_factors(dataset.n_users() + 1, dataset.n_items()).unwrap();
        assert!(matches!(
            service.train(&context, Some(wrong), &mut NoopSink),
            Err(MfError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let (dataset, partitions) = small_dataset();
        let context = TrainingContext::from_partitions(&dataset, &partitions);
        let service = TrainingService::new(TrainingConfig {
            epochs: 1e-6,
            ..config()
        })
        .unwrap();
        assert!(matches!(
            service.train(&context, None, &mut NoopSink),
            Err(MfError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_skips_non_finite_updates_when_guarded() {
        let (dataset, partitions) = small_dataset();
        let context = TrainingContext::from_partitions(&dataset, &partitions);
        let mut initial = TrainingService::new(config())
            .unwrap()
            .initial_factors(dataset.n_users(), dataset.n_items())
            .unwrap();
        initial.items.fill(f64::NAN);

        let guarded = TrainingService::new(TrainingConfig {
            skip_non_finite_updates: true,
            ..config()
        })
        .unwrap();
        let outcome = guarded.train(&context, Some(initial.clone()), &mut NoopSink).unwrap();
        assert_eq!(outcome.skipped_updates, outcome.iterations);

        let unguarded = TrainingService::new(config()).unwrap();
        let outcome = unguarded.train(&context, Some(initial), &mut NoopSink).unwrap();
        assert_eq!(outcome.skipped_updates, 0);
        assert!(outcome.best.validation_loss.is_nan());
    }

    #[test]
    fn test_evaluate_partition() {
        let (dataset, partitions) = small_dataset();
        let service = TrainingService::new(config()).unwrap();
        let factors = service.initial_factors(dataset.n_users(), dataset.n_items()).unwrap();
        let report = evaluate_partition(&factors, &partitions.test).unwrap();
        assert_eq!(report.count, partitions.test.len());
        assert!(report.rmse >= report.mae);
    }
}
