//! mariadb-mongo-migrate CLI
//!
//! Copies one MariaDB table into one MongoDB collection.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use mariadb_mongo_migrate::error::{EXIT_RUNTIME, EXIT_USAGE};
use mariadb_mongo_migrate::{
    Error, IntervalPolicy, LoadResult, MigrationConfig, MigrationOptions, Pipeline, SourceConfig,
    TargetConfig,
};

#[derive(Parser)]
#[command(name = "mariadb-mongo-migrate")]
#[command(version)]
#[command(about = "Copy a MariaDB table into a MongoDB collection", long_about = None)]
struct Cli {
    /// MariaDB host
    #[arg(short = 'm', long, value_name = "HOST")]
    mariadb: String,

    /// MongoDB connection URI
    #[arg(short = 'o', long, value_name = "URI")]
    mongodb: String,

    /// Source database name
    #[arg(short = 's', long, value_name = "NAME")]
    sourcedb: String,

    /// Target database name
    #[arg(short = 'd', long, value_name = "NAME")]
    targetdb: String,

    /// Source table name
    #[arg(short = 't', long, value_name = "NAME")]
    table: String,

    /// Target collection name
    #[arg(short = 'c', long, value_name = "NAME")]
    collection: String,

    /// MariaDB user
    #[arg(short = 'u', long, value_name = "NAME")]
    user: String,

    /// MariaDB password
    #[arg(
        short = 'p',
        long,
        env = "MARIADB_PASSWORD",
        hide_env_values = true,
        value_name = "SECRET"
    )]
    password: String,

    /// MariaDB port
    #[arg(long, default_value_t = 3306)]
    port: u16,

    /// Documents per insert
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,

    /// How TIME values are written: null, text, micros or wall-clock
    #[arg(long, default_value = "null", value_name = "POLICY")]
    interval_policy: IntervalPolicy,

    /// Connection timeout for both stores, in seconds
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    connect_timeout: u64,

    /// Extract and normalize only, write nothing
    #[arg(long)]
    dry_run: bool,

    /// Show a progress spinner
    #[arg(long)]
    progress: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> MigrationConfig {
        MigrationConfig {
            source: SourceConfig {
                host: self.mariadb.clone(),
                port: self.port,
                database: self.sourcedb.clone(),
                user: self.user.clone(),
                password: self.password.clone(),
                table: self.table.clone(),
            },
            target: TargetConfig {
                uri: self.mongodb.clone(),
                database: self.targetdb.clone(),
                collection: self.collection.clone(),
            },
            options: MigrationOptions {
                batch_size: self.batch_size,
                interval_policy: self.interval_policy,
                connect_timeout_secs: self.connect_timeout,
                dry_run: self.dry_run,
                show_progress: self.progress,
            },
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_USAGE,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(result) => {
            if let Err(e) = print_summary(&cli, &result) {
                error!("Failed to print summary: {:#}", e);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Migration failed: {:#}", e);
            let code = e
                .downcast_ref::<Error>()
                .map_or(EXIT_RUNTIME, Error::exit_code);
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<LoadResult> {
    let config = cli.to_config();
    let pipeline = Pipeline::new(config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let result = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let watcher = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping");
                watcher.cancel();
            }
        });

        pipeline
            .with_cancellation(cancel)
            .run(&cli.table, &cli.targetdb, &cli.collection)
            .await
    })?;

    Ok(result)
}

fn print_summary(cli: &Cli, result: &LoadResult) -> anyhow::Result<()> {
    if cli.json {
        let summary = serde_json::json!({
            "source": format!("{}.{}", cli.sourcedb, cli.table),
            "target": format!("{}.{}", cli.targetdb, cli.collection),
            "result": result,
            "throughput": result.throughput(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if result.dry_run {
        println!("\nDry run complete (nothing written)");
    } else {
        println!("\nMigration complete");
    }
    println!("   Source:     {}.{}", cli.sourcedb, cli.table);
    println!("   Target:     {}.{}", cli.targetdb, cli.collection);
    println!("   Extracted:  {}", result.extracted);
    println!("   Inserted:   {}", result.inserted_count);
    println!("   Batches:    {}", result.batches);
    println!("   Duration:   {:.2}s", result.duration_secs);
    println!("   Throughput: {:.0} docs/sec", result.throughput());

    Ok(())
}
