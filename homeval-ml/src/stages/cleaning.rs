//! `data-cleaning` processors: the cleaner and the train/test splitter.

use crate::data::clean::clean_table;
use crate::error::MlError;
use crate::features::binning::{INCOME_COLUMN, income_bucketizer};
use crate::features::split::StratifiedShuffleSplit;
use crate::stages::context::{StageContext, StageReport};
use crate::stages::registry::Processor;
use homeval_core::StageParams;
use tracing::{info, warn};

pub const JOB: &str = "data-cleaning";
pub const CLEAN_NAME: &str = "housing";
pub const SPLIT_NAME: &str = "train-test";

pub const RAW_DATASET: &str = "raw/housing";
pub const CLEANED_DATASET: &str = "cleaned/housing";
pub const TRAIN_FEATURES: &str = "train/housing/features";
pub const TRAIN_TARGET: &str = "train/housing/target";
pub const TEST_FEATURES: &str = "test/housing/features";
pub const TEST_TARGET: &str = "test/housing/target";

/// Blank strings become missing values and column names become snake_case.
pub struct CleanHousing;

impl Processor for CleanHousing {
    fn job(&self) -> &str {
        JOB
    }

    fn name(&self) -> &str {
        CLEAN_NAME
    }

    fn description(&self) -> &str {
        "Normalise column names and blank values of the raw housing table"
    }

    fn run(&self, ctx: &StageContext, _params: &StageParams) -> Result<StageReport, MlError> {
        let mut report = StageReport::new(JOB, CLEAN_NAME);
        let raw = ctx.datasets.load(RAW_DATASET)?;
        let (cleaned, summary) = clean_table(&raw)?;
        info!(
            blanks = summary.blanks_replaced,
            renamed = summary.renamed_columns.len(),
            "Cleaned raw table"
        );

        report.save_dataset(ctx, CLEANED_DATASET, &cleaned)?;
        report.rows = cleaned.n_rows();
        Ok(report)
    }
}

/// Stratified split on binned median income, then features/target
/// separation of both subsets.
pub struct TrainTestSplit;

impl Processor for TrainTestSplit {
    fn job(&self) -> &str {
        JOB
    }

    fn name(&self) -> &str {
        SPLIT_NAME
    }

    fn description(&self) -> &str {
        "Stratified train/test split on median income buckets"
    }

    fn run(&self, ctx: &StageContext, params: &StageParams) -> Result<StageReport, MlError> {
        let test_size = params.require_test_size()?;
        let target = params.require_target()?;
        let splitter = StratifiedShuffleSplit::new(test_size, ctx.random_seed)?;

        let mut report = StageReport::new(JOB, SPLIT_NAME);
        let cleaned = ctx.datasets.load(CLEANED_DATASET)?;
        cleaned.require(target)?;

        let keys = income_bucketizer().bucket_all(cleaned.numeric(INCOME_COLUMN)?);
        let (train, test, excluded) = splitter.split_frame(&cleaned, &keys)?;
        if excluded > 0 {
            warn!(
                rows = excluded,
                column = INCOME_COLUMN,
                "Rows without a stratification key left out of both subsets"
            );
        }
        info!(train = train.n_rows(), test = test.n_rows(), "Split dataset");

        for (df, features, targets) in [
            (&train, TRAIN_FEATURES, TRAIN_TARGET),
            (&test, TEST_FEATURES, TEST_TARGET),
        ] {
            let (x, y) = df.split_target(target)?;
            report.save_dataset(ctx, features, &x)?;
            report.save_dataset(ctx, targets, &y)?;
        }

        report.rows = train.n_rows() + test.n_rows();
        report.excluded_rows = excluded;
        Ok(report)
    }
}
