//! Subcommand handlers for the homeval CLI.

use crate::Commands;
use crate::ConfigAction;
use homeval_core::config::workspace_config_path;
use homeval_core::{HomevalConfig, load_config};
use homeval_ml::{ArtifactStore, DatasetStore, StageContext, StageReport, Workflow, default_registry};
use std::path::{Path, PathBuf};

/// Global options that adjust the loaded configuration.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
}

/// Dispatch a parsed subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    overrides: &Overrides,
) -> anyhow::Result<()> {
    match command {
        Commands::Run { job, name } => {
            let config = load(workspace, overrides)?;
            let ctx = StageContext::from_config(&config, workspace);
            let registry = default_registry()?;
            let report = registry.run(&job, &name, &ctx, &config.params)?;
            print_report(&report)
        }
        Commands::RunAll => {
            let config = load(workspace, overrides)?;
            let ctx = StageContext::from_config(&config, workspace);
            let registry = default_registry()?;
            let reports = Workflow::housing().run(&registry, &ctx, &config.params)?;
            for report in &reports {
                print_report(report)?;
            }
            Ok(())
        }
        Commands::List => {
            let registry = default_registry()?;
            println!("Registered processors ({}):", registry.len());
            for (job, name, description) in registry.list() {
                println!("  {:<16} {:<20} {}", job, name, description);
            }
            Ok(())
        }
        Commands::Ingest { file, name } => {
            let config = load(workspace, overrides)?;
            let store = DatasetStore::new(config.pipeline.data_path(workspace));
            let entry = store.ingest(&name, &file)?;
            println!(
                "Ingested {} as {} v{} ({} rows)",
                file.display(),
                entry.name,
                entry.version,
                entry.row_count
            );
            Ok(())
        }
        Commands::Config { action } => handle_config(action, workspace, overrides),
        Commands::Datasets => {
            let config = load(workspace, overrides)?;
            let store = DatasetStore::new(config.pipeline.data_path(workspace));
            let entries = store.list()?;
            if entries.is_empty() {
                println!("No datasets stored under {}", store.root().display());
                return Ok(());
            }
            for entry in entries {
                println!(
                    "  {:<28} v{:<3} {:>8} rows  {}  {}",
                    entry.name,
                    entry.version,
                    entry.row_count,
                    short_hash(&entry.hash),
                    entry.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            Ok(())
        }
        Commands::Artifacts => {
            let config = load(workspace, overrides)?;
            let store = ArtifactStore::new(config.pipeline.artifacts_path(workspace));
            let entries = store.list()?;
            if entries.is_empty() {
                println!("No artifacts stored under {}", store.root().display());
                return Ok(());
            }
            for entry in entries {
                println!(
                    "  {:<20} v{:<3} {:<18} {}  {}",
                    entry.name,
                    entry.version,
                    entry.kind.to_string(),
                    short_hash(&entry.hash),
                    entry.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            Ok(())
        }
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    overrides: &Overrides,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }

            let toml_str = toml::to_string_pretty(&HomevalConfig::housing_preset())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, overrides)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Load the layered configuration, then apply command-line overrides.
fn load(workspace: &Path, overrides: &Overrides) -> anyhow::Result<HomevalConfig> {
    let mut config = load_config(Some(workspace), overrides.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    if let Some(seed) = overrides.seed {
        config.pipeline.random_seed = seed;
    }
    Ok(config)
}

fn print_report(report: &StageReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeval_core::ArtifactRef;
    use pretty_assertions::assert_eq;
    use std::fmt::Write as _;
    use tempfile::TempDir;

    fn raw_csv(rows: usize) -> String {
        let proximity = ["<1H OCEAN", "INLAND", "NEAR OCEAN", "NEAR BAY"];
        let mut csv = String::from(
            "longitude,latitude,housingMedianAge,totalRooms,totalBedrooms,population,\
             households,medianIncome,medianHouseValue,oceanProximity\n",
        );
        for i in 0..rows {
            let income = 0.5 + (i * 7 % rows) as f64 * 9.0 / rows as f64;
            let bedrooms = if i % 11 == 0 {
                String::new()
            } else {
                format!("{}", 200 + i)
            };
            writeln!(
                csv,
                "{:.2},{:.2},{},{},{},{},{},{:.4},{:.0},{}",
                -122.0 + (i % 9) as f64 * 0.1,
                37.0 + (i % 5) as f64 * 0.1,
                10 + i % 40,
                1000 + 10 * i,
                bedrooms,
                800 + i,
                300 + i,
                income,
                50_000.0 + 30_000.0 * income,
                proximity[i % proximity.len()]
            )
            .unwrap();
        }
        csv
    }

    fn ingest(workspace: &Path, rows: usize) {
        let file = workspace.join("housing.csv");
        std::fs::write(&file, raw_csv(rows)).unwrap();
        handle_command(
            Commands::Ingest {
                file,
                name: "raw/housing".into(),
            },
            workspace,
            &Overrides::default(),
        )
        .unwrap();
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, &Overrides::default()).unwrap();

        let config_path = workspace.join(".homeval").join("config.toml");
        assert!(config_path.exists());

        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: HomevalConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.params.target.as_deref(), Some("median_house_value"));
        assert_eq!(parsed.params.test_size, Some(0.2));
        assert_eq!(parsed.pipeline.random_seed, 42);
    }

    #[test]
    fn test_config_init_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let config_path = workspace_config_path(dir.path());
        std::fs::create_dir_all(config_path.parent().unwrap()).unwrap();
        std::fs::write(&config_path, "[pipeline]\nrandom_seed = 7\n").unwrap();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, dir.path(), &Overrides::default()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            "[pipeline]\nrandom_seed = 7\n"
        );
    }

    #[test]
    fn test_seed_override_wins() {
        let dir = TempDir::new().unwrap();
        let overrides = Overrides {
            config: None,
            seed: Some(1234),
        };
        let config = load(dir.path(), &overrides).unwrap();
        assert_eq!(config.pipeline.random_seed, 1234);
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = TempDir::new().unwrap();
        let overrides = Overrides {
            config: Some(dir.path().join("nope.toml")),
            seed: None,
        };
        let err = load(dir.path(), &overrides).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }

    #[test]
    fn test_ingest_registers_dataset() {
        let dir = TempDir::new().unwrap();
        ingest(dir.path(), 20);

        let store = DatasetStore::new(dir.path().join("data"));
        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "raw/housing");
        assert_eq!(entries[0].row_count, 20);
    }

    #[test]
    fn test_run_unknown_processor_fails() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Run {
            job: "data-cleaning".into(),
            name: "nope".into(),
        };
        assert!(handle_command(command, dir.path(), &Overrides::default()).is_err());
    }

    #[test]
    fn test_run_all_after_init_and_ingest() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();
        handle_command(
            Commands::Config {
                action: ConfigAction::Init,
            },
            workspace,
            &Overrides::default(),
        )
        .unwrap();
        ingest(workspace, 80);

        handle_command(Commands::RunAll, workspace, &Overrides::default()).unwrap();

        let datasets = DatasetStore::new(workspace.join("data"));
        assert_eq!(datasets.load("score/housing/output").unwrap().n_rows(), 16);
        let artifacts = ArtifactStore::new(workspace.join("artifacts"));
        for name in ["features", "curated_columns", "train_pipeline", "score_metrics"] {
            assert!(artifacts.exists(&ArtifactRef::latest(name)).unwrap(), "{name}");
        }
    }

    #[test]
    fn test_listing_commands_succeed_on_empty_workspace() {
        let dir = TempDir::new().unwrap();
        for command in [Commands::List, Commands::Datasets, Commands::Artifacts] {
            handle_command(command, dir.path(), &Overrides::default()).unwrap();
        }
    }
}
