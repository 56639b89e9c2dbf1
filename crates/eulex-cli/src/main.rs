use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eulex_core::Config;
use eulex_pipeline::{Pipeline, RunOutcome, RunSummary};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "eulex", about = "Build tabular datasets of EU legal acts", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline described by a YAML configuration file
    Run {
        /// Path to the configuration file
        config: PathBuf,
        /// Override the DuckDB file name inside the output directory
        #[arg(long = "db-name")]
        db_name: Option<String>,
        /// Skip concept lookup and continue from an existing review artifact
        #[arg(long)]
        resume: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            db_name,
            resume,
        } => run(&config, db_name, resume).await,
    }
}

async fn run(path: &Path, db_name: Option<String>, resume: bool) -> Result<()> {
    let mut config = load_config(path)?;
    if let Some(name) = db_name {
        config.output.database_name = name;
    }
    let today = chrono::Local::now().date_naive();
    config
        .validate(today)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;

    std::fs::create_dir_all(&config.output.output_directory).with_context(|| {
        format!(
            "cannot create output directory {}",
            config.output.output_directory.display()
        )
    })?;
    init_logging(&config.output.log_path())?;
    tracing::info!("eulex v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = Pipeline::with_cellar(config)?;
    let summary = if resume {
        pipeline.resume().await?
    } else {
        match pipeline.run().await? {
            RunOutcome::Completed(summary) => summary,
            RunOutcome::AwaitingReview { artifact } => {
                wait_for_review(&artifact).await?;
                pipeline.resume().await?
            }
        }
    };

    print_summary(&summary);
    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let config: Config =
        serde_yaml::from_str(&text).with_context(|| format!("cannot parse {}", path.display()))?;
    Ok(config)
}

/// `RUST_LOG` (default `info`) on stderr, everything at debug in the log
/// file.
fn init_logging(log_path: &Path) -> Result<()> {
    let file = File::create(log_path).with_context(|| format!("cannot create {}", log_path.display()))?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(LevelFilter::DEBUG),
        )
        .init();
    Ok(())
}

async fn wait_for_review(artifact: &Path) -> Result<()> {
    eprintln!();
    eprintln!("Review required: {}", artifact.display());
    eprintln!("Edit the concepts in that file, save it, then press Enter to continue.");
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).map(|_| ())
    })
    .await?
    .context("cannot read from stdin")
}

fn print_summary(summary: &RunSummary) {
    println!("Resolved:               {}", summary.resolved);
    println!("Already present:        {}", summary.already_present);
    println!("Committed:              {}", summary.committed);
    println!("Committed without body: {}", summary.committed_without_body);
    for (table, rows) in &summary.exported {
        println!("Exported {table:<14} {rows}");
    }
    if !summary.skipped.is_empty() {
        println!("Skipped:                {}", summary.skipped.len());
        for skip in &summary.skipped {
            println!("  {}: {}", skip.id, skip.reason);
        }
    }
}
