use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use amygdala::export::{export_to_path, DEFAULT_EXPORT_FILE};
use amygdala::presentation::{recommendations_for, render_cycle};
use amygdala::{AppConfig, ModelArtifact, Monitor, Pipeline, RawBatch, SessionContext};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML); defaults to ./amygdala.toml if present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll a sheet or file and classify it on every refresh
    Watch {
        #[arg(long)]
        sheet_id: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Refresh period in seconds
        #[arg(short, long)]
        interval: Option<u64>,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Classify an uploaded CSV file
    Score {
        file: PathBuf,
        /// Write the labeled rows here (xlsx, or CSV for a .csv path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Classify one manually entered reading
    Predict {
        /// A field value, e.g. --value Suhu=36,5
        #[arg(short = 'v', long = "value", value_parser = parse_key_value)]
        values: Vec<(String, String)>,
    },
    /// Download and verify the configured model artifact
    Install {
        /// Remove any installed copy first
        #[arg(short, long)]
        fresh: bool,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))
}

fn load_pipeline(config: &AppConfig) -> Result<Arc<Pipeline>> {
    let artifact = match &config.artifact.path {
        Some(path) => ModelArtifact::load(path, &config.runtime)?,
        None => config
            .artifact_manager()?
            .load(&config.artifact.name, &config.runtime)
            .with_context(|| format!("Run `install` first to fetch artifact '{}'", config.artifact.name))?,
    };
    let pipeline = Pipeline::new(config.schema()?, Arc::new(artifact))?;
    Ok(Arc::new(pipeline))
}

async fn install(config: &AppConfig, fresh: bool) -> Result<()> {
    let source = config
        .artifact_source()
        .ok_or_else(|| anyhow!("No artifact.manifest_url configured"))?;
    let manager = config.artifact_manager()?;

    if fresh {
        info!("Fresh install requested - removing artifact '{}'...", source.name);
        manager.remove(&source.name)?;
    }
    manager.ensure_installed(&source).await?;
    println!("Artifact '{}' installed at {}", source.name, manager.artifact_dir(&source.name).display());
    Ok(())
}

async fn watch(config: &AppConfig, once: bool) -> Result<()> {
    let source = config
        .data_source()
        .ok_or_else(|| anyhow!("No data source: pass --sheet-id, --url or --file"))?;
    let pipeline = load_pipeline(config)?;
    let mut monitor = Monitor::new(source, pipeline, config.refresh(), config.cache_ttl());

    if once {
        let report = monitor.refresh(true).await?;
        println!("{}", render_cycle(&report, config.display.tail_rows, &config.display.names, config.display.color));
        if let Some(path) = &config.export.path {
            export_to_path(&report, path, &config.export.label_column)?;
        }
        return Ok(());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };
    monitor
        .run(
            |outcome| match outcome {
                Ok(report) => {
                    println!(
                        "{}",
                        render_cycle(report, config.display.tail_rows, &config.display.names, config.display.color)
                    );
                    if let Some(path) = &config.export.path {
                        if let Err(e) = export_to_path(report, path, &config.export.label_column) {
                            warn!("Export failed: {}", e);
                        }
                    }
                }
                Err(e) => println!("{}", e),
            },
            shutdown,
        )
        .await;
    Ok(())
}

fn score(config: &AppConfig, file: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let pipeline = load_pipeline(config)?;
    let text = std::fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let raw = RawBatch::from_csv_str(&text)?;
    let report = pipeline.run_cycle(&raw)?;

    println!("{}", render_cycle(&report, config.display.tail_rows, &config.display.names, config.display.color));
    for key in report.key_names() {
        if let Some(groups) = report.group_by_key(key) {
            println!("Per {}:", key);
            for (value, records) in groups {
                let labels: Vec<&str> = records.iter().map(|r| r.label.name()).collect();
                println!("  {}: {}", value, labels.join(", "));
            }
        }
    }

    let output = output
        .or_else(|| config.export.path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE));
    export_to_path(&report, &output, &config.export.label_column)?;
    println!("Labeled rows written to {}", output.display());
    Ok(())
}

fn predict(config: &AppConfig, values: Vec<(String, String)>) -> Result<()> {
    if values.is_empty() {
        bail!("Pass at least one --value NAME=VALUE");
    }
    let pipeline = load_pipeline(config)?;
    let mut session = SessionContext::new();
    for (name, value) in values {
        session.set_field(name, value);
    }

    let labeled = pipeline.predict_manual(&mut session)?;
    println!("Predicted: {}", config.display.names.display(&labeled.label));
    for item in recommendations_for(labeled.label.name()) {
        println!("  - {}", item);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Watch {
            sheet_id,
            url,
            file,
            interval,
            once,
        } => {
            if sheet_id.is_some() || url.is_some() || file.is_some() {
                config.source.sheet_id = sheet_id;
                config.source.url = url;
                config.source.file = file;
            }
            if let Some(secs) = interval {
                config.source.refresh_secs = secs;
                config.source.cache_ttl_secs = secs;
            }
            info!("Refreshing every {:?}", Duration::from_secs(config.source.refresh_secs));
            watch(&config, once).await
        }
        Command::Score { file, output } => score(&config, file, output),
        Command::Predict { values } => predict(&config, values),
        Command::Install { fresh } => install(&config, fresh).await,
    }
}
