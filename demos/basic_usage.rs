use mfrec::data::synthetic::SyntheticRatings;
use mfrec::services::reporting::TraceRecorder;
use mfrec::services::training::evaluate_partition;
use mfrec::*;

fn main() -> anyhow::Result<()> {
    init_tracing("info");

    println!("mfrec basic usage");

    // 1. Generate a MovieLens-sized toy rating set
    let dataset = SyntheticRatings {
        n_users: 600,
        n_items: 400,
        rank: 4,
        density: 0.1,
        ..SyntheticRatings::default()
    }
    .generate()?;
    println!(
        "Generated {} ratings from {} users on {} items",
        dataset.len(),
        dataset.n_users(),
        dataset.n_items()
    );

    // 2. Split 80/10/10 with a fixed seed
    let partitions = dataset.split(0.8, 0.1, 0)?;
    let context = TrainingContext::from_partitions(&dataset, &partitions);

    // 3. Train with and without regularization
    for regularization in [0.0, 1e-4] {
        let service = TrainingService::new(TrainingConfig {
            rank: 8,
            regularization,
            batch_size: 256,
            learning_rate: 0.01,
            epochs: 20.0,
            log_steps: 10,
            ..TrainingConfig::default()
        })?;

        let mut trace = TraceRecorder::default();
        let outcome = service.train(&context, None, &mut trace)?;

        println!("\nlambda = {regularization}");
        println!("{:>6} {:>8} {:>12} {:>12}", "iter", "epoch", "train RMSE", "valid RMSE");
        for checkpoint in &trace.checkpoints {
            println!(
                "{:>6} {:>8.2} {:>12.4} {:>12.4}",
                checkpoint.iteration,
                checkpoint.epoch,
                checkpoint.train_rmse,
                checkpoint.validation_rmse
            );
        }

        // 4. Score the best snapshot on held-out ratings
        let report = evaluate_partition(&outcome.factors, &partitions.test)?;
        println!(
            "best iteration {}: test RMSE {:.4}, MAE {:.4}",
            outcome.best.iteration, report.rmse, report.mae
        );

        // 5. Top items for the first user, excluding what they already rated
        let rated: Vec<usize> = partitions
            .train
            .iter()
            .filter(|r| r.user == 0)
            .map(|r| r.item)
            .collect();
        let top = outcome.factors.recommend(0, 5, &rated)?;
        println!("top items for user {:?}: {:?}", dataset.users.id_of(0), top);
    }

    Ok(())
}
