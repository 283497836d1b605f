//! ormlite-migrate CLI
//!
//! Command-line tool that migrates a SQLite database to the models in a JSON
//! model file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::ConnectOptions;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ormlite_core::Registry;
use ormlite_migrate::prelude::*;

/// Column-presence migrations for SQLite.
#[derive(Parser)]
#[command(name = "ormlite-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// JSON file declaring the models.
    #[arg(short, long, env = "ORMLITE_MODELS", default_value = "models.json")]
    models: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the database schema in line with the models.
    Migrate {
        /// Run the migration and roll it back.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the SQL a migration would run, without executing it.
    SqlMigrate,

    /// List the live tables and their columns.
    Inspect,
}

fn load_registry(path: &Path) -> anyhow::Result<Registry> {
    let mut registry = Registry::new();
    ModelFile::load(path)?.declare_into(&mut registry)?;
    info!(
        path = %path.display(),
        models = registry.models().len(),
        "Loaded models"
    );
    Ok(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Connect to database
    let mut conn: SqliteConnection = SqliteConnectOptions::from_str(&cli.database)?
        .create_if_missing(true)
        .connect()
        .await?;

    match cli.command {
        Commands::Migrate { dry_run } => {
            let registry = load_registry(&cli.models)?;
            if dry_run {
                info!("Dry run mode - the migration will be rolled back.");
            }

            let report = MigrationExecutor::new(SqliteDialect::new())
                .dry_run(dry_run)
                .migrate(&mut conn, registry.models())
                .await?;

            if report.is_empty() {
                info!("No changes detected.");
            } else {
                for sql in &report.statements {
                    println!("{sql};");
                }
            }
        }

        Commands::SqlMigrate => {
            let registry = load_registry(&cli.models)?;
            let executor = MigrationExecutor::new(SqliteDialect::new());
            let operations = executor.plan(&mut conn, registry.models()).await?;

            if operations.is_empty() {
                info!("No changes detected.");
            }
            for operation in &operations {
                println!("-- {operation}");
                for sql in executor.sql_for(std::slice::from_ref(operation)) {
                    println!("{sql};");
                }
            }
        }

        Commands::Inspect => {
            let executor = MigrationExecutor::new(SqliteDialect::new());
            let catalog = executor.catalog(&mut conn).await?;

            if catalog.is_empty() {
                info!("No tables found.");
            } else {
                println!("\nTables:");
                println!("{:-<60}", "");

                for table in &catalog {
                    let live = parse_create_table(&table.sql)?;
                    let columns: Vec<&str> = live.columns.iter().map(String::as_str).collect();
                    println!(" {} ({})", table.name, columns.join(", "));
                }
                println!();
            }
        }
    }

    conn.close().await?;
    Ok(())
}
