//! Configuration system for homeval.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> explicit config file -> environment -> CLI overrides.
//! The workspace file lives at `.homeval/config.toml`.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for a homeval workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomevalConfig {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub artifacts: ArtifactRefs,
    #[serde(default)]
    pub params: StageParams,
}

impl HomevalConfig {
    /// The configuration written by `homeval config init`: the defaults plus
    /// the required housing parameters filled in.
    pub fn housing_preset() -> Self {
        let mut config = Self::default();
        config.params.test_size = Some(0.2);
        config.params.target = Some("median_house_value".to_string());
        config
    }
}

/// Workflow-wide settings carried by every stage context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Seed for every source of randomness (splitting, sampling).
    #[serde(default = "default_seed")]
    pub random_seed: u64,
    /// Dataset storage root, relative paths resolve against the workspace.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Artifact storage root, relative paths resolve against the workspace.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            random_seed: default_seed(),
            data_dir: default_data_dir(),
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

impl PipelineSettings {
    pub fn data_path(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.data_dir)
    }

    pub fn artifacts_path(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.artifacts_dir)
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

fn default_seed() -> u64 {
    42
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

/// Reference to a stored artifact. `version = None` means the latest one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl ArtifactRef {
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn pinned(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
        }
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.version {
            Some(v) => write!(f, "{}@v{}", self.name, v),
            None => write!(f, "{}@latest", self.name),
        }
    }
}

/// The artifacts exchanged between stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRefs {
    #[serde(default = "default_curated_columns")]
    pub curated_columns: ArtifactRef,
    #[serde(default = "default_column_transformer")]
    pub column_transformer: ArtifactRef,
    #[serde(default = "default_model")]
    pub model: ArtifactRef,
    #[serde(default = "default_score_metrics")]
    pub score_metrics: ArtifactRef,
}

impl Default for ArtifactRefs {
    fn default() -> Self {
        Self {
            curated_columns: default_curated_columns(),
            column_transformer: default_column_transformer(),
            model: default_model(),
            score_metrics: default_score_metrics(),
        }
    }
}

fn default_curated_columns() -> ArtifactRef {
    ArtifactRef::latest("curated_columns")
}

fn default_column_transformer() -> ArtifactRef {
    ArtifactRef::latest("features")
}

fn default_model() -> ArtifactRef {
    ArtifactRef::latest("train_pipeline")
}

fn default_score_metrics() -> ArtifactRef {
    ArtifactRef::latest("score_metrics")
}

/// Parameters handed to every processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageParams {
    /// Fraction of rows held out for testing. Required by the splitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_size: Option<f64>,
    /// Target column name. Required by the splitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub outliers: OutlierParams,
    /// Optional training subsample rate, for debugging and profiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_fraction: Option<f64>,
    #[serde(default)]
    pub xgboost: BoosterParams,
    /// Encoded columns kept for model fitting, in order.
    #[serde(default = "default_important_features")]
    pub important_features: Vec<String>,
    #[serde(default)]
    pub handle_unknown: UnknownCategory,
}

impl Default for StageParams {
    fn default() -> Self {
        Self {
            test_size: None,
            target: None,
            outliers: OutlierParams::default(),
            sampling_fraction: None,
            xgboost: BoosterParams::default(),
            important_features: default_important_features(),
            handle_unknown: UnknownCategory::default(),
        }
    }
}

impl StageParams {
    pub fn require_target(&self) -> Result<&str, ConfigError> {
        match self.target.as_deref() {
            Some(t) if !t.trim().is_empty() => Ok(t),
            Some(_) => Err(ConfigError::invalid("params.target must not be empty")),
            None => Err(ConfigError::missing("params.target")),
        }
    }

    pub fn require_test_size(&self) -> Result<f64, ConfigError> {
        let size = self
            .test_size
            .ok_or_else(|| ConfigError::missing("params.test_size"))?;
        if !(size > 0.0 && size < 1.0) {
            return Err(ConfigError::invalid(format!(
                "params.test_size must be in (0, 1), got {size}"
            )));
        }
        Ok(size)
    }

    /// Validated sampling fraction; `None` means use every row.
    pub fn sampling_fraction(&self) -> Result<Option<f64>, ConfigError> {
        match self.sampling_fraction {
            Some(f) if f > 0.0 && f <= 1.0 => Ok(Some(f)),
            Some(f) => Err(ConfigError::invalid(format!(
                "params.sampling_fraction must be in (0, 1], got {f}"
            ))),
            None => Ok(None),
        }
    }
}

fn default_important_features() -> Vec<String> {
    [
        "housing_median_age",
        "longitude",
        "latitude",
        "ocean_proximity_NEAR OCEAN",
        "median_income",
        "ocean_proximity_INLAND",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Statistical rule used to find outlier bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// `mean ± k·std`
    #[default]
    Mean,
    /// Interquartile range rule, `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]`.
    Percentile,
}

impl std::fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutlierMethod::Mean => write!(f, "mean"),
            OutlierMethod::Percentile => write!(f, "percentile"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierParams {
    #[serde(default)]
    pub method: OutlierMethod,
    /// Drop training rows with outliers instead of clipping them.
    #[serde(default)]
    pub drop: bool,
    /// `k` for the mean method.
    #[serde(default = "default_std_multiplier")]
    pub std_multiplier: f64,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            method: OutlierMethod::default(),
            drop: false,
            std_multiplier: default_std_multiplier(),
        }
    }
}

fn default_std_multiplier() -> f64 {
    3.0
}

/// Gradient-boosting hyperparameters, named after their XGBoost counterparts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    #[serde(default)]
    pub gamma: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_min_child_weight")]
    pub min_child_weight: f64,
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_reg_lambda")]
    pub reg_lambda: f64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            gamma: 0.0,
            learning_rate: default_learning_rate(),
            max_depth: default_max_depth(),
            min_child_weight: default_min_child_weight(),
            n_estimators: default_n_estimators(),
            reg_lambda: default_reg_lambda(),
        }
    }
}

impl BoosterParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(ConfigError::invalid("params.xgboost.learning_rate must be > 0"));
        }
        if self.gamma < 0.0 || self.min_child_weight < 0.0 || self.reg_lambda < 0.0 {
            return Err(ConfigError::invalid(
                "params.xgboost gamma, min_child_weight and reg_lambda must be >= 0",
            ));
        }
        if self.n_estimators == 0 {
            return Err(ConfigError::invalid("params.xgboost.n_estimators must be >= 1"));
        }
        Ok(())
    }
}

fn default_learning_rate() -> f64 {
    0.3
}

fn default_max_depth() -> usize {
    6
}

fn default_min_child_weight() -> f64 {
    1.0
}

fn default_n_estimators() -> usize {
    100
}

fn default_reg_lambda() -> f64 {
    1.0
}

/// What the one-hot encoder does with a category it never saw at fit time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategory {
    #[default]
    Error,
    Ignore,
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "homeval", "homeval")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level configuration file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".homeval").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `HOMEVAL_`, `__` separates sections)
/// 2. Explicit config file (`--config`)
/// 3. Workspace-local config (`.homeval/config.toml`)
/// 4. User config (`~/.config/homeval/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<HomevalConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(HomevalConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // HOMEVAL_PIPELINE__RANDOM_SEED, HOMEVAL_PARAMS__TEST_SIZE, etc.
    figment = figment.merge(Env::prefixed("HOMEVAL_").split("__"));

    let config: HomevalConfig = figment.extract()?;
    tracing::debug!(seed = config.pipeline.random_seed, "Configuration loaded");
    Ok(config)
}

/// Check whether any homeval configuration file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = HomevalConfig::default();
        assert_eq!(config.pipeline.random_seed, 42);
        assert_eq!(config.pipeline.data_dir, PathBuf::from("data"));
        assert_eq!(config.artifacts.column_transformer.name, "features");
        assert_eq!(config.params.important_features.len(), 6);
        assert!(config.params.test_size.is_none());
        assert_eq!(config.params.handle_unknown, UnknownCategory::Error);
    }

    #[test]
    fn test_require_target_missing() {
        let params = StageParams::default();
        let err = params.require_target().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "params.target"));
    }

    #[test]
    fn test_require_test_size_range() {
        let mut params = StageParams::default();
        params.test_size = Some(1.5);
        assert!(matches!(
            params.require_test_size(),
            Err(ConfigError::Invalid { .. })
        ));
        params.test_size = Some(0.2);
        assert_eq!(params.require_test_size().unwrap(), 0.2);
    }

    #[test]
    fn test_sampling_fraction_validation() {
        let mut params = StageParams::default();
        assert_eq!(params.sampling_fraction().unwrap(), None);
        params.sampling_fraction = Some(0.0);
        assert!(params.sampling_fraction().is_err());
        params.sampling_fraction = Some(1.0);
        assert_eq!(params.sampling_fraction().unwrap(), Some(1.0));
    }

    #[test]
    fn test_booster_params_validation() {
        let mut xgb = BoosterParams::default();
        assert!(xgb.validate().is_ok());
        xgb.n_estimators = 0;
        assert!(xgb.validate().is_err());
    }

    #[test]
    fn test_artifact_ref_display() {
        assert_eq!(ArtifactRef::latest("features").to_string(), "features@latest");
        assert_eq!(ArtifactRef::pinned("features", 3).to_string(), "features@v3");
    }

    #[test]
    fn test_preset_serialization_roundtrip() {
        let config = HomevalConfig::housing_preset();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: HomevalConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.params.target.as_deref(), Some("median_house_value"));
        assert_eq!(parsed.params.test_size, Some(0.2));
        assert_eq!(parsed.params.xgboost.max_depth, 6);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".homeval");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            r#"
[pipeline]
random_seed = 7

[artifacts.model]
name = "train_pipeline"
version = 2

[params]
test_size = 0.25
target = "median_house_value"
important_features = ["median_income", "latitude"]

[params.outliers]
method = "percentile"
drop = true

[params.xgboost]
n_estimators = 10
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.pipeline.random_seed, 7);
        assert_eq!(config.artifacts.model, ArtifactRef::pinned("train_pipeline", 2));
        assert_eq!(config.params.test_size, Some(0.25));
        assert_eq!(
            config.params.important_features,
            vec!["median_income".to_string(), "latitude".to_string()]
        );
        assert_eq!(config.params.outliers.method, OutlierMethod::Percentile);
        assert!(config.params.outliers.drop);
        assert_eq!(config.params.xgboost.n_estimators, 10);
        assert_eq!(config.params.xgboost.max_depth, 6);
    }

    #[test]
    fn test_load_config_explicit_file_missing() {
        let err = load_config(None, Some(Path::new("/nonexistent/homeval.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_paths_resolve_against_workspace() {
        let settings = PipelineSettings::default();
        let ws = Path::new("/work");
        assert_eq!(settings.data_path(ws), PathBuf::from("/work/data"));
        assert_eq!(settings.artifacts_path(ws), PathBuf::from("/work/artifacts"));
    }
}
