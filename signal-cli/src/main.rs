//! SAFE Signals CLI
//!
//! Validate, resolve, score and submit cyber-security signals.

mod config;
mod generate;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::Settings;
use signal_core::{quality_of_signal, validate, MemoryStore, Resolver, Signal, ValidSignal};
use signal_runtime::{
    discover_samples, FileOutcome, IngestOutcome, Pipeline, PipelineConfig, SampleError,
    SampleKind,
};
use signal_transport::{HttpTransport, Transport};

#[derive(Parser)]
#[command(name = "safe-signals")]
#[command(author, version, about = "SAFE signal validator, resolver and submitter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,

    /// Path to the settings file
    #[arg(short, long, default_value = "signals.toml")]
    config: PathBuf,

    /// SAFE base URL (or set SAFE_URL env var)
    #[arg(long, env = "SAFE_URL", global = true)]
    safe_url: Option<String>,

    /// API username (or set SAFE_API_USERNAME env var)
    #[arg(long, env = "SAFE_API_USERNAME", global = true)]
    username: Option<String>,

    /// API password (or set SAFE_API_PASSWORD env var)
    #[arg(long, env = "SAFE_API_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check signal documents and print every violation
    Validate {
        /// Signal JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Resolve signalurl:// references in a document
    Resolve {
        /// Signal JSON file to resolve
        file: PathBuf,

        /// Directory of previously submitted signals
        #[arg(short, long)]
        store: PathBuf,

        /// Maximum hops followed per field
        #[arg(long)]
        max_chain: Option<usize>,
    },

    /// Print the quality of each signal
    Quality {
        /// Signal JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Validate, resolve and submit every sample in a directory
    Submit {
        /// Samples directory (default: [samples] dir from the settings)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Validate and resolve only
        #[arg(long)]
        dry_run: bool,

        /// Submissions in flight at once
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// Maximum hops followed per field
        #[arg(long)]
        max_chain: Option<usize>,
    },

    /// Check that the configured SAFE server accepts our credentials
    Status,

    /// Write simple and high-quality sample signals
    Generate {
        /// Output directory (default: [samples] dir from the settings)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let settings = Settings::load(&cli.config)?.with_overrides(
        cli.safe_url,
        cli.username,
        cli.password,
    );

    match cli.command {
        Commands::Validate { files } => run_validate(&files),
        Commands::Resolve {
            file,
            store,
            max_chain,
        } => {
            let limit = max_chain.unwrap_or(settings.resolver.max_chain_length);
            run_resolve(&file, &store, limit)
        }
        Commands::Quality { files } => run_quality(&files),
        Commands::Submit {
            dir,
            dry_run,
            concurrency,
            max_chain,
        } => {
            let dir = dir.unwrap_or_else(|| settings.samples.dir.clone());
            let config = PipelineConfig {
                max_chain_length: max_chain.unwrap_or(settings.resolver.max_chain_length),
                concurrency,
                dry_run,
            };
            run_submit(&settings, &dir, config).await
        }
        Commands::Status => check_status(&settings).await,
        Commands::Generate { dir } => {
            let dir = dir.unwrap_or_else(|| settings.samples.dir.clone());
            run_generate(&dir)
        }
    }
}

fn read_signal(path: &Path) -> Result<Signal> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Signal::from_json(&json).with_context(|| format!("Invalid signal JSON in {}", path.display()))
}

fn run_validate(files: &[PathBuf]) -> Result<()> {
    let mut rejected = 0;

    for path in files {
        let signal = match read_signal(path) {
            Ok(signal) => signal,
            Err(e) => {
                println!("❌ {:#}", e);
                rejected += 1;
                continue;
            }
        };

        match validate(signal) {
            Ok(valid) => {
                println!("✅ {} ({})", path.display(), valid.id);
                for warning in valid.warnings() {
                    println!("   {}", warning);
                }
            }
            Err(errors) => {
                println!("❌ {}: {}", path.display(), errors);
                for violation in &errors.violations {
                    println!("   {}", violation);
                }
                rejected += 1;
            }
        }
    }

    if rejected > 0 {
        bail!("{} of {} file(s) rejected", rejected, files.len());
    }
    Ok(())
}

/// Validate and store every JSON document in `dir`
fn load_store(dir: &Path) -> Result<MemoryStore> {
    let store = MemoryStore::new();

    let samples = match discover_samples(dir) {
        Err(SampleError::Empty(_)) => Vec::new(),
        result => result?,
    };

    for sample in samples {
        if sample.kind != SampleKind::Json {
            continue;
        }
        match read_signal(&sample.path).and_then(|s| validate(s).map_err(Into::into)) {
            Ok(valid) => {
                store.put(valid);
            }
            Err(e) => warn!("Skipping {}: {:#}", sample.name(), e),
        }
    }

    let stats = store.stats();
    println!(
        "📦 Loaded {} signal(s) ({} distinct, {} revoked)",
        stats.total, stats.distinct_names, stats.revoked
    );
    Ok(store)
}

fn run_resolve(file: &Path, store_dir: &Path, max_chain_length: usize) -> Result<()> {
    let store = load_store(store_dir)?;
    let valid: ValidSignal = validate(read_signal(file)?)?;

    let resolver = Resolver::new().with_max_chain_length(max_chain_length);
    let resolved = resolver.resolve(valid, &store.snapshot())?;

    let stats = resolved.resolution_stats();
    println!(
        "🔗 Substituted {} field(s) with {} lookup(s)\n",
        stats.substituted, stats.lookups
    );
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

fn run_quality(files: &[PathBuf]) -> Result<()> {
    for path in files {
        let signal = read_signal(path)?;
        println!("{:>4.0}%  {}", quality_of_signal(&signal), path.display());
    }
    Ok(())
}

fn print_outcome(outcome: &IngestOutcome) {
    let verdict = match &outcome.response {
        Some(response) if response.success => format!("accepted: {}", response.message),
        Some(response) => format!("refused: {}", response.message),
        None => "not submitted".to_string(),
    };
    println!(
        "   {} | quality {:.0}% | {} reference(s) | {}",
        outcome.id, outcome.quality, outcome.substituted, verdict
    );
    for warning in &outcome.warnings {
        println!("   {}", warning);
    }
}

async fn run_submit(settings: &Settings, dir: &Path, config: PipelineConfig) -> Result<()> {
    println!("📡 SAFE signals - {}\n", dir.display());

    let transport: Option<Arc<dyn Transport>> = if config.dry_run {
        println!("🧪 Dry run: nothing will be submitted\n");
        None
    } else {
        let transport_config = settings.transport_config()?;
        println!("🌐 Server: {}\n", transport_config.base_url);
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(transport_config)?);
        Some(transport)
    };

    let pipeline = Pipeline::new(config, Arc::new(MemoryStore::new()), transport);
    let report = pipeline.ingest_dir(dir).await?;

    for file in &report.files {
        match &file.result {
            Ok(FileOutcome::Signal(outcome)) => {
                println!("✅ {}", file.path.display());
                print_outcome(outcome);
            }
            Ok(FileOutcome::Archive(response)) => {
                let message = response
                    .as_ref()
                    .map_or("not submitted", |r| r.message.as_str());
                println!("📦 {}: {}", file.path.display(), message);
            }
            Err(e) => println!("❌ {}: {}", file.path.display(), e),
        }
    }

    let failed = report.failed().count();
    println!(
        "\n📊 {} file(s): {} ok, {} failed",
        report.len(),
        report.len() - failed,
        failed
    );

    if failed > 0 {
        bail!("{} file(s) failed", failed);
    }
    Ok(())
}

fn run_generate(dir: &Path) -> Result<()> {
    for sample in generate::write_samples(dir)? {
        println!(
            "💾 Saved to {}. Quality of signal = {}%",
            sample.path.display(),
            sample.quality.floor()
        );
    }
    Ok(())
}

async fn check_status(settings: &Settings) -> Result<()> {
    let config = settings.transport_config()?;
    println!("🔌 Authenticating against {}...\n", config.base_url);

    let transport = HttpTransport::new(config)?;
    match transport.access_token().await {
        Ok(_) => println!("✅ Credentials accepted"),
        Err(e) => {
            println!("❌ {}", e);
            bail!("authentication failed");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_store_dir_is_an_empty_store() {
        let dir = tempdir().unwrap();
        let store = load_store(dir.path()).unwrap();
        assert!(store.is_empty());

        let signal = generate::simple_ca_signal();
        let resolved = Resolver::new()
            .resolve(validate(signal).unwrap(), &store.snapshot())
            .unwrap();
        assert_eq!(resolved.resolution_stats().substituted, 0);
    }

    #[test]
    fn test_missing_store_dir_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_store(&dir.path().join("missing")).is_err());
    }
}
