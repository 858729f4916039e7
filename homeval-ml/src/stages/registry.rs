//! Processor registry and the sequential workflow runner.
//!
//! Processors are registered once, keyed by `(job, name)`, and looked up by
//! the runner. A workflow is an ordered list of keys executed one after the
//! other; the first failure stops it.

use crate::error::MlError;
use crate::stages::context::{StageContext, StageReport};
use homeval_core::StageParams;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, error, info};

/// A pipeline stage.
pub trait Processor {
    /// Job group, e.g. `data-cleaning`.
    fn job(&self) -> &str;

    /// Processor name within its job, e.g. `housing`.
    fn name(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> &str {
        ""
    }

    fn run(&self, ctx: &StageContext, params: &StageParams) -> Result<StageReport, MlError>;
}

type ProcessorKey = (String, String);

pub struct ProcessorRegistry {
    processors: BTreeMap<ProcessorKey, Box<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: BTreeMap::new(),
        }
    }

    /// Register a processor. Fails if its `(job, name)` is already taken.
    pub fn register(&mut self, processor: Box<dyn Processor>) -> Result<(), MlError> {
        let key = (processor.job().to_string(), processor.name().to_string());
        if self.processors.contains_key(&key) {
            return Err(MlError::processor(format!(
                "processor {}/{} is already registered",
                key.0, key.1
            )));
        }
        debug!(job = %key.0, name = %key.1, "Registering processor");
        self.processors.insert(key, processor);
        Ok(())
    }

    pub fn get(&self, job: &str, name: &str) -> Option<&dyn Processor> {
        self.processors
            .get(&(job.to_string(), name.to_string()))
            .map(|p| p.as_ref())
    }

    /// `(job, name, description)` of every processor, sorted by key.
    pub fn list(&self) -> Vec<(&str, &str, &str)> {
        self.processors
            .values()
            .map(|p| (p.job(), p.name(), p.description()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run one processor and time it.
    pub fn run(
        &self,
        job: &str,
        name: &str,
        ctx: &StageContext,
        params: &StageParams,
    ) -> Result<StageReport, MlError> {
        let processor = self
            .get(job, name)
            .ok_or_else(|| MlError::processor(format!("no processor registered as {job}/{name}")))?;

        info!(job, name, "Stage started");
        let start = Instant::now();
        let mut report = processor.run(ctx, params)?;
        report.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            job,
            name,
            run_id = %report.run_id,
            rows = report.rows,
            elapsed_ms = report.elapsed_ms,
            "Stage finished"
        );
        Ok(report)
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered list of processors to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    steps: Vec<ProcessorKey>,
}

impl Workflow {
    pub fn new(steps: Vec<(&str, &str)>) -> Self {
        Self {
            steps: steps
                .into_iter()
                .map(|(j, n)| (j.to_string(), n.to_string()))
                .collect(),
        }
    }

    /// Cleaner, splitter, feature engineer, trainer, scorer.
    pub fn housing() -> Self {
        use crate::stages::{cleaning, feature_engineering, scoring, training};
        Self::new(vec![
            (cleaning::JOB, cleaning::CLEAN_NAME),
            (cleaning::JOB, cleaning::SPLIT_NAME),
            (feature_engineering::JOB, feature_engineering::NAME),
            (training::JOB, training::NAME),
            (scoring::JOB, scoring::NAME),
        ])
    }

    pub fn steps(&self) -> impl Iterator<Item = (&str, &str)> {
        self.steps.iter().map(|(j, n)| (j.as_str(), n.as_str()))
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run(
        &self,
        registry: &ProcessorRegistry,
        ctx: &StageContext,
        params: &StageParams,
    ) -> Result<Vec<StageReport>, MlError> {
        let mut reports = Vec::with_capacity(self.steps.len());
        for (job, name) in self.steps() {
            match registry.run(job, name, ctx, params) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(job, name, error = %e, completed = reports.len(), "Workflow stopped");
                    return Err(e);
                }
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeval_core::HomevalConfig;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    struct Recorder {
        job: &'static str,
        name: &'static str,
        fail: bool,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl Processor for Recorder {
        fn job(&self) -> &str {
            self.job
        }

        fn name(&self) -> &str {
            self.name
        }

        fn run(&self, _ctx: &StageContext, _params: &StageParams) -> Result<StageReport, MlError> {
            self.calls.borrow_mut().push(self.name.to_string());
            if self.fail {
                return Err(MlError::missing_artifact("upstream"));
            }
            Ok(StageReport::new(self.job, self.name))
        }
    }

    fn recorder(name: &'static str, fail: bool, calls: &Rc<RefCell<Vec<String>>>) -> Box<Recorder> {
        Box::new(Recorder {
            job: "test",
            name,
            fail,
            calls: Rc::clone(calls),
        })
    }

    fn ctx(dir: &TempDir) -> StageContext {
        StageContext::from_config(&HomevalConfig::default(), dir.path())
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ProcessorRegistry::new();
        registry.register(recorder("a", false, &calls)).unwrap();
        assert!(registry.register(recorder("a", false, &calls)).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_processor() {
        let dir = TempDir::new().unwrap();
        let registry = ProcessorRegistry::new();
        let err = registry
            .run("nope", "missing", &ctx(&dir), &StageParams::default())
            .unwrap_err();
        assert!(matches!(err, MlError::Processor(_)));
    }

    #[test]
    fn test_workflow_stops_at_first_failure() {
        let dir = TempDir::new().unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ProcessorRegistry::new();
        registry.register(recorder("first", false, &calls)).unwrap();
        registry.register(recorder("second", true, &calls)).unwrap();
        registry.register(recorder("third", false, &calls)).unwrap();

        let workflow = Workflow::new(vec![("test", "first"), ("test", "second"), ("test", "third")]);
        let err = workflow
            .run(&registry, &ctx(&dir), &StageParams::default())
            .unwrap_err();
        assert!(matches!(err, MlError::MissingArtifact(_)));
        assert_eq!(*calls.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_workflow_runs_in_order() {
        let dir = TempDir::new().unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ProcessorRegistry::new();
        registry.register(recorder("b", false, &calls)).unwrap();
        registry.register(recorder("a", false, &calls)).unwrap();

        let workflow = Workflow::new(vec![("test", "b"), ("test", "a")]);
        let reports = workflow
            .run(&registry, &ctx(&dir), &StageParams::default())
            .unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(*calls.borrow(), vec!["b", "a"]);
        assert_eq!(reports[0].name, "b");
    }

    #[test]
    fn test_housing_workflow_order() {
        let workflow = Workflow::housing();
        let steps: Vec<(&str, &str)> = workflow.steps().collect();
        assert_eq!(
            steps,
            vec![
                ("data-cleaning", "housing"),
                ("data-cleaning", "train-test"),
                ("feat-engg", "transform-features"),
                ("model-gen", "train-model"),
                ("model-eval", "score-model"),
            ]
        );
    }
}
