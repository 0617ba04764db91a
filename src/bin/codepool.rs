//! Codepool command-line interface
//!
//! Hands out unique four-digit codes and manages the issued set:
//! - Take a code and see the odds of having hit a winning one
//! - Export / import the issued set as text
//! - Clear the issued set (with a backup export first)
//! - Storage maintenance (stats, compact)
//!
//! # Examples
//!
//! ```bash
//! # Take a code
//! codepool take
//!
//! # Back up issued codes
//! codepool export --output codes.txt
//!
//! # Restore them after a reset
//! codepool import codes.txt
//! ```

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use codepool::probability::cumulative_hit_probability;
use codepool::storage::{CodeStoreEngine, SlotStore};
use codepool::text::{backup_file_name, format_code, parse_codes, render_codes};
use codepool::{CodeService, Settings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Codepool - unique four-digit codes
#[derive(Parser, Debug)]
#[command(name = "codepool")]
#[command(version = codepool::VERSION)]
#[command(about = "Codepool - hands out unique four-digit codes", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Settings file (defaults to ./codepool.toml if present)
    #[arg(long, global = true, env = "CODEPOOL_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory path (overrides database_path from settings)
    #[arg(long, global = true, env = "CODEPOOL_DATA")]
    data_dir: Option<PathBuf>,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "CODEPOOL_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "CODEPOOL_LOG_LEVEL")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Take a fresh code
    Take,

    /// Show how many codes are left
    Remaining,

    /// Export issued codes, one per line
    Export(ExportArgs),

    /// Mark codes from a .txt file as issued
    Import(ImportArgs),

    /// Return every issued code to the pool
    Clear(ClearArgs),

    /// Estimate the chance of having hit a winning code
    Probability(ProbabilityArgs),

    /// Show storage statistics
    Stats,

    /// Compact the journal
    Compact,

    /// Print the effective settings
    Settings,

    /// Show version
    Version,
}

/// Export arguments
#[derive(Args, Debug)]
struct ExportArgs {
    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Import arguments
#[derive(Args, Debug)]
struct ImportArgs {
    /// Input .txt file, one four-digit code per line
    input: PathBuf,
}

/// Clear arguments
#[derive(Args, Debug)]
struct ClearArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    force: bool,

    /// Export issued codes to this file before clearing
    /// (default: codes-<timestamp>.txt in the data directory)
    #[arg(short, long)]
    backup: Option<PathBuf>,
}

/// Probability arguments
#[derive(Args, Debug)]
struct ProbabilityArgs {
    /// Number of codes drawn (defaults to the number issued so far)
    #[arg(short, long)]
    draws: Option<i64>,

    /// Number of winning codes (defaults to winning_codes from settings)
    #[arg(short, long)]
    winning: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let _guard = setup_logging(&cli)?;

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(data_dir) = cli.data_dir.clone() {
        settings.database_path = data_dir;
    }

    let result = match cli.command {
        Commands::Take => take_command(&settings).await,
        Commands::Remaining => remaining_command(&settings).await,
        Commands::Export(args) => export_command(&settings, args).await,
        Commands::Import(args) => import_command(&settings, args).await,
        Commands::Clear(args) => clear_command(&settings, args).await,
        Commands::Probability(args) => probability_command(&settings, args).await,
        Commands::Stats => stats_command(&settings).await,
        Commands::Compact => compact_command(&settings).await,
        Commands::Settings => {
            print!("{}", settings.to_toml()?);
            Ok(())
        }
        Commands::Version => {
            println!("Codepool {}", codepool::VERSION);
            Ok(())
        }
    };

    if let Err(ref e) = result {
        error!("Command failed: {:#}", e);
    }
    result
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "codepool.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::WARN);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color)
                .compact(),
        )
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(guard)
}

fn open_engine(settings: &Settings) -> anyhow::Result<CodeStoreEngine> {
    let engine = CodeStoreEngine::open(&settings.database_path, settings.store_options())
        .with_context(|| format!("Failed to open store at {}", settings.database_path.display()))?;
    info!(path = %settings.database_path.display(), "Store opened");
    Ok(engine)
}

fn open_service(settings: &Settings) -> anyhow::Result<CodeService> {
    let engine = open_engine(settings)?;
    Ok(CodeService::new(Arc::new(engine)))
}

/// Take command - hand out one code
async fn take_command(settings: &Settings) -> anyhow::Result<()> {
    let service = open_service(settings)?;

    let code = match service.take().await? {
        Some(code) => code,
        None => {
            println!("No codes left");
            return Ok(());
        }
    };

    let total = i64::from(service.total());
    let remaining = service.remaining().await? as i64;
    let draws = total - remaining;
    let probability =
        cumulative_hit_probability(total, i64::from(settings.winning_codes), draws) * 100.0;

    println!("Your code: {}", format_code(code));
    println!("Remaining: {} of {}", remaining, total);
    println!(
        "Chance that {} draws hit at least one of {} winning codes: {:.2}%",
        draws, settings.winning_codes, probability
    );
    Ok(())
}

/// Remaining command
async fn remaining_command(settings: &Settings) -> anyhow::Result<()> {
    let service = open_service(settings)?;
    let remaining = service.remaining().await?;
    println!("{} of {} codes left", remaining, service.total());
    Ok(())
}

/// Export command
async fn export_command(settings: &Settings, args: ExportArgs) -> anyhow::Result<()> {
    let service = open_service(settings)?;
    let codes = service.export().await?;

    match args.output {
        Some(path) => {
            write_export(&path, &render_codes(&codes))?;
            println!("Exported {} codes to {}", codes.len(), path.display());
        }
        None => print!("{}", render_codes(&codes)),
    }
    Ok(())
}

/// Import command
async fn import_command(settings: &Settings, args: ImportArgs) -> anyhow::Result<()> {
    let is_txt = args
        .input
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false);
    if !is_txt {
        bail!("Import file must be a .txt file: {}", args.input.display());
    }

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    let codes = parse_codes(&text);
    if codes.is_empty() {
        println!("No valid codes found in {}", args.input.display());
        return Ok(());
    }

    let mut distinct = codes.clone();
    distinct.sort_unstable();
    distinct.dedup();

    let service = open_service(settings)?;
    let marked = service.import(&codes).await?;
    println!(
        "Import complete. Marked as issued: {} of {} distinct codes",
        marked,
        distinct.len()
    );
    Ok(())
}

/// Clear command - export, confirm, then reset
async fn clear_command(settings: &Settings, args: ClearArgs) -> anyhow::Result<()> {
    let service = open_service(settings)?;
    let codes = service.export().await?;

    let backup = match args.backup {
        Some(path) => Some(path),
        None if !codes.is_empty() => Some(
            settings
                .database_path
                .join(backup_file_name(chrono::Utc::now())),
        ),
        None => None,
    };
    if let Some(path) = &backup {
        write_export(path, &render_codes(&codes))?;
        println!("Exported {} codes to {}", codes.len(), path.display());
    }

    if !args.force {
        print!("Return {} issued codes to the pool? (yes/no): ", codes.len());
        use std::io::{self, Write};
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if input.trim().to_lowercase() != "yes" {
            println!("Clear cancelled");
            return Ok(());
        }
    }

    let cleared = service.clear().await?;
    println!("Cleared. Reset {} codes", cleared);
    Ok(())
}

/// Probability command
async fn probability_command(settings: &Settings, args: ProbabilityArgs) -> anyhow::Result<()> {
    let total = i64::from(settings.total_codes);
    let winning = args.winning.unwrap_or_else(|| i64::from(settings.winning_codes));

    let draws = match args.draws {
        Some(draws) => draws,
        None => {
            let service = open_service(settings)?;
            total - service.remaining().await? as i64
        }
    };

    let probability = cumulative_hit_probability(total, winning, draws);
    println!(
        "Chance that {} draws from {} hit at least one of {} winning codes: {:.2}%",
        draws,
        total,
        winning,
        probability * 100.0
    );
    Ok(())
}

/// Stats command
async fn stats_command(settings: &Settings) -> anyhow::Result<()> {
    let engine = open_engine(settings)?;
    let stats = engine.stats().await?;

    println!("Store: {}", settings.database_path.display());
    println!("───────────────────────────────");
    println!("  Total:     {}", stats.total);
    println!("  Available: {}", stats.available);
    println!("  Issued:    {}", stats.issued);
    println!("  Journal:   {} batches, {} bytes", stats.journal_batches, stats.journal_bytes);
    Ok(())
}

/// Compact command
async fn compact_command(settings: &Settings) -> anyhow::Result<()> {
    let engine = open_engine(settings)?;
    let before = engine.stats().await?;
    engine.compact().await?;
    let after = engine.stats().await?;

    println!(
        "Compacted journal: {} → {} bytes ({} → {} batches)",
        before.journal_bytes, after.journal_bytes, before.journal_batches, after.journal_batches
    );
    info!(total = engine.total(), "Compaction done");
    Ok(())
}

fn write_export(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
