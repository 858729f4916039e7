//! Feature transforms: stratification binning, stratified splitting,
//! column encoding, outlier treatment and the important-columns filter.

pub mod binning;
pub mod encoding;
pub mod outliers;
pub mod pipeline;
pub mod selector;
pub mod split;

pub use binning::{Bucketizer, INCOME_COLUMN, income_category};
pub use encoding::{ColumnTransformer, MedianImputer, OneHotEncoder, normalize_label};
pub use outliers::{ColumnBounds, OutlierHandler, OutlierSummary};
pub use pipeline::FeaturePipeline;
pub use selector::ColumnSelector;
pub use split::{SplitIndices, StratifiedShuffleSplit};
