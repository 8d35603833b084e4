//! hms-mirror CLI - Hive metastore table migration planner.

use clap::{Parser, Subcommand};
use hms_mirror::{
    report, Config, DataStrategy, FileMetadataSource, MessageCode, MigrateError, MigrationResult,
    Orchestrator,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "hms-mirror")]
#[command(about = "Plan Hive table migrations between clusters")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Path to metadata snapshot (YAML or JSON)
    #[arg(short, long, default_value = "metadata.yaml")]
    metadata: PathBuf,

    /// Path to state file for resume capability
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Directory the SQL scripts and distcp plans are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan every configured table
    Plan {
        /// Override the data strategy
        #[arg(long)]
        strategy: Option<String>,

        /// Override the databases to plan (repeatable)
        #[arg(long = "database")]
        databases: Vec<String>,

        /// Keep the target in step with the source
        #[arg(long)]
        sync: bool,

        /// Override number of workers
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Resume a previous run, skipping tables it already planned
    Resume {
        /// Override number of workers
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Check the configuration and list the messages it raises
    Validate,

    /// Decode a return code into its messages
    Decode {
        /// Return code, negated or not
        #[arg(allow_hyphen_values = true)]
        return_code: i64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<u8, MigrateError> {
    let cli = Cli::parse();

    // Decoding needs neither config nor logging
    if let Commands::Decode { return_code } = cli.command {
        let codes = MessageCode::decode(return_code);
        if codes.is_empty() {
            println!("No messages in return code {}", return_code);
        }
        for code in codes {
            println!("{:>3}  {}", code.code(), code);
        }
        return Ok(0);
    }

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Decode { .. } => unreachable!(), // Handled above

        Commands::Validate => {
            let messages = config.evaluate();
            for message in messages.messages() {
                println!("{}", message);
            }
            if messages.has_errors() {
                let errors = messages.errors();
                return Err(MigrateError::Validation {
                    messages: errors.messages(),
                    return_code: errors.exit_value(),
                });
            }
            println!("Configuration is valid (return code {})", messages.exit_value());
            Ok(0)
        }

        Commands::Plan {
            strategy,
            databases,
            sync,
            workers,
        } => {
            if let Some(strategy) = strategy {
                config.data_strategy = strategy.parse::<DataStrategy>()?;
            }
            if !databases.is_empty() {
                config.databases = databases;
            }
            if sync {
                config.sync = true;
            }
            if let Some(w) = workers {
                config.concurrency = Some(w);
            }
            config.validate()?;

            let mut orchestrator = orchestrator(config, &cli.metadata)?;
            if let Some(ref path) = cli.state_file {
                orchestrator = orchestrator.with_state_file(path.clone());
            }

            let cancel_token = setup_signal_handler();
            let result = orchestrator.run(Some(cancel_token)).await?;
            finish(&result, cli.output_dir.as_deref(), cli.output_json, "Planning")
        }

        Commands::Resume { workers } => {
            // State file is required for resume
            let state_file = cli.state_file.ok_or_else(|| {
                MigrateError::Config("--state-file is required for resume".to_string())
            })?;
            if !state_file.exists() {
                return Err(MigrateError::Config(format!(
                    "State file not found: {:?}",
                    state_file
                )));
            }
            if let Some(w) = workers {
                config.concurrency = Some(w);
            }

            let orchestrator = orchestrator(config, &cli.metadata)?
                .with_state_file(state_file)
                .resume()?;
            info!("Resuming from previous state");

            let cancel_token = setup_signal_handler();
            let result = orchestrator.run(Some(cancel_token)).await?;
            finish(&result, cli.output_dir.as_deref(), cli.output_json, "Resumed planning")
        }
    }
}

fn orchestrator(config: Config, metadata: &Path) -> Result<Orchestrator, MigrateError> {
    let source = FileMetadataSource::load(metadata)?;
    Ok(Orchestrator::new(config, Arc::new(source)))
}

/// Write scripts, print the summary and pick the exit code.
fn finish(
    result: &MigrationResult,
    output_dir: Option<&Path>,
    output_json: bool,
    label: &str,
) -> Result<u8, MigrateError> {
    if let Some(dir) = output_dir {
        let mut written = report::write_scripts(dir, &result.tables)?;
        written.extend(report::write_distcp_plans(dir, &result.distcp_plans)?);
        info!("Wrote {} files to {:?}", written.len(), dir);
    }

    if output_json {
        println!("{}", result.to_json()?);
    } else {
        println!("\n{} {}!", label, result.status);
        println!("  Run ID: {}", result.run_id);
        println!("  Strategy: {}", result.strategy);
        println!("  Duration: {:.2}s", result.duration_seconds);
        println!(
            "  Tables: {}/{} (skipped {}, retried {})",
            result.tables_success, result.tables_total, result.tables_skipped, result.tables_retried
        );
        if !result.failed_tables.is_empty() {
            println!("  Failed tables: {:?}", result.failed_tables);
        }
        for message in &result.messages {
            println!("  {}", message);
        }
        println!("  Return code: {}", result.exit_value);
    }

    if result.status == "cancelled" {
        return Ok(MigrateError::Cancelled.exit_code());
    }
    Ok(if result.return_code == 0 { 0 } else { 1 })
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Cancel on SIGINT or SIGTERM. Tables already being planned finish; no new
/// tables are started.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Finishing tables in flight...", name);
                    token.cancel();
                }
                Err(e) => warn!("Failed to set up {} handler: {}", name, e),
            }
        });
    }

    cancel_token
}

/// Cancel on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Finishing tables in flight...");
                token.cancel();
            }
            Err(e) => warn!("Failed to set up Ctrl-C handler: {}", e),
        }
    });

    cancel_token
}
