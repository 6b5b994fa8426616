pub mod algorithms;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use algorithms::sampler::minibatch_indices;
pub use algorithms::{l2_penalty, loss, predict_ratings};
pub use config::{Config, DataConfig, TrainingConfig};
pub use error::{MfError, Result};
pub use models::*;
pub use services::training::{TrainingContext, TrainingService};

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber; `RUST_LOG` wins over `default_level` when set.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
