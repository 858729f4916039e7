//! The five workflow processors and the machinery that runs them.

pub mod cleaning;
pub mod context;
pub mod feature_engineering;
pub mod registry;
pub mod scoring;
pub mod training;

pub use cleaning::{CleanHousing, TrainTestSplit};
pub use context::{StageContext, StageReport, WrittenDataset};
pub use feature_engineering::TransformFeatures;
pub use registry::{Processor, ProcessorRegistry, Workflow};
pub use scoring::ScoreModel;
pub use training::TrainModel;

use crate::error::MlError;

/// A registry holding every housing processor.
pub fn default_registry() -> Result<ProcessorRegistry, MlError> {
    let mut registry = ProcessorRegistry::new();
    registry.register(Box::new(CleanHousing))?;
    registry.register(Box::new(TrainTestSplit))?;
    registry.register(Box::new(TransformFeatures))?;
    registry.register(Box::new(TrainModel))?;
    registry.register(Box::new(ScoreModel))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_covers_housing_workflow() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), 5);
        for (job, name) in Workflow::housing().steps() {
            assert!(registry.get(job, name).is_some(), "{job}/{name} missing");
        }
    }
}
