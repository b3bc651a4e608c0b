use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value as JsonValue};
use sigrun_config::{ConfigLoader, SigrunConfig};
use sigrun_core::{AlgorithmCategory, AlgorithmInput, ContextOverrides, TriggerKind};
use sigrun_engine::{AlgorithmFilter, AlgorithmRegistry, EngineConfig, ExecutionEngine};
use sigrun_execution::{PoolConfig, WorkerPool};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod cli;
use cli::{Cli, Commands, ConfigCommands};

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&PathBuf>) -> Result<SigrunConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) if path.exists() => loader
            .from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        Some(path) => {
            // Logging is not up yet
            eprintln!("Configuration file not found: {:?}. Using defaults.", path);
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
        None => loader
            .from_env()
            .context("Failed to load configuration from environment"),
    }
}

/// Parse the algorithm input from inline JSON or a file
fn read_input(input_json: Option<&str>, input_file: Option<&Path>) -> Result<AlgorithmInput> {
    let raw = match (input_json, input_file) {
        (Some(json), _) => json.to_string(),
        (None, Some(path)) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read input file {:?}", path))?
        }
        (None, None) => bail!("Either --input-json or --input-file is required"),
    };
    serde_json::from_str(&raw).context("Input is not a valid algorithm input")
}

fn parse_config_overrides(config_json: Option<&str>) -> Result<JsonValue> {
    match config_json {
        Some(raw) => {
            let value: JsonValue = serde_json::from_str(raw).context("--config-json is not valid JSON")?;
            if !value.is_object() {
                bail!("--config-json must be a JSON object");
            }
            Ok(value)
        }
        None => Ok(json!({})),
    }
}

fn parse_category(category: &str) -> Result<AlgorithmCategory> {
    serde_json::from_value(JsonValue::String(category.to_lowercase()))
        .with_context(|| format!("Unknown algorithm category: {}", category))
}

struct RunArgs {
    algorithm: String,
    input: AlgorithmInput,
    overrides: JsonValue,
    manual: bool,
    timeout: Option<u64>,
    equipment: Option<String>,
    no_workers: bool,
}

async fn run_command(config: &SigrunConfig, args: RunArgs) -> Result<()> {
    let mut builder = ExecutionEngine::builder()
        .registry(Arc::new(AlgorithmRegistry::with_builtin()))
        .config(EngineConfig::from(config));

    if !args.no_workers && config.engine.offload_enabled {
        let pool = WorkerPool::start(PoolConfig::from(&config.pool)).context("Failed to start worker pool")?;
        info!("Started worker pool with {} workers", config.pool.worker_count);
        builder = builder.offloader(Arc::new(pool));
    }
    let engine = builder.build().context("Failed to build execution engine")?;

    let mut overrides = ContextOverrides::new().with_requester("cli");
    if args.manual {
        overrides = overrides.with_trigger(TriggerKind::Manual);
    }
    if let Some(seconds) = args.timeout {
        overrides = overrides.with_timeout(Duration::from_secs(seconds));
    }
    if let Some(equipment) = args.equipment {
        overrides = overrides.with_equipment(equipment);
    }

    let output = engine
        .execute(&args.algorithm, args.input, args.overrides, Some(overrides))
        .await;
    engine.shutdown(config.pool.shutdown_deadline).await;

    println!("{}", serde_json::to_string_pretty(&output)?);
    if !output.is_success() {
        bail!(
            "Algorithm {} did not complete: {}",
            args.algorithm,
            output.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn algorithms_command(
    category: Option<&str>,
    tag: Option<String>,
    device_type: Option<String>,
    as_json: bool,
) -> Result<()> {
    let mut filter = AlgorithmFilter::default();
    if let Some(category) = category {
        filter.category = Some(parse_category(category)?);
    }
    filter.tag = tag;
    filter.device_type = device_type;

    let registry = AlgorithmRegistry::with_builtin();
    let summaries: Vec<_> = registry.list(Some(&filter)).iter().map(|d| d.summary()).collect();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No algorithms match");
        return Ok(());
    }
    println!("{:<14} {:<10} {:<13} DESCRIPTION", "ID", "VERSION", "CATEGORY");
    for summary in summaries {
        println!(
            "{:<14} {:<10} {:<13} {}",
            summary.id, summary.version, summary.category, summary.metadata.description
        );
    }
    Ok(())
}

fn config_command(config_cmd: ConfigCommands, config: &SigrunConfig) -> Result<()> {
    match config_cmd {
        ConfigCommands::Sample { output, force } => {
            let sample = SigrunConfig::generate_sample();
            match output {
                Some(path) => {
                    if path.exists() && !force {
                        bail!("{:?} already exists, use --force to overwrite", path);
                    }
                    fs::write(&path, sample).with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Wrote sample configuration to {:?}", path);
                }
                None => print!("{}", sample),
            }
        }
        ConfigCommands::Validate { config_file } => {
            ConfigLoader::new()
                .from_file(&config_file)
                .with_context(|| format!("Invalid configuration in {:?}", config_file))?;
            println!("Configuration {:?} is valid", config_file);
        }
        ConfigCommands::Show { format } => {
            match format.as_str() {
                "yaml" => print!("{}", serde_yaml::to_string(config)?),
                "json" => println!("{}", serde_json::to_string_pretty(config)?),
                other => bail!("Unsupported format: {}", other),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Sample and validate work without a usable global configuration
    let standalone = matches!(
        &cli.command,
        Commands::Config {
            config_cmd: ConfigCommands::Sample { .. } | ConfigCommands::Validate { .. }
        }
    );
    let mut config = if standalone {
        SigrunConfig::default()
    } else {
        load_config(cli.config.as_ref())?
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.parse().map_err(anyhow::Error::msg)?;
    }
    sigrun_logging::init_logging_from_config(&config.logging).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Run {
            algorithm,
            input_json,
            input_file,
            config_json,
            manual,
            timeout,
            equipment,
            no_workers,
        } => {
            let args = RunArgs {
                algorithm,
                input: read_input(input_json.as_deref(), input_file.as_deref())?,
                overrides: parse_config_overrides(config_json.as_deref())?,
                manual,
                timeout,
                equipment,
                no_workers,
            };
            run_command(&config, args).await
        }
        Commands::Algorithms {
            category,
            tag,
            device_type,
            json,
        } => algorithms_command(category.as_deref(), tag, device_type, json),
        Commands::Config { config_cmd } => config_command(config_cmd, &config),
    }
}
