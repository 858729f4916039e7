//! Model fitting: the gradient-boosted regressor, the trained-model
//! artifact, and metrics.

pub mod gbdt;
pub mod metrics;
pub mod model;

pub use gbdt::{GbdtRegressor, Node, Tree};
pub use metrics::{RegressionMetrics, TrainingHistory};
pub use model::TrainedModel;
