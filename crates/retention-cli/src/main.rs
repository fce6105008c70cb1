//! Retention CLI - Command-line interface for the retention policy engine.

use clap::Parser;
use retention_cli::commands;
use retention_cli::{Cli, Command, Config, Formatter};
use retention_store::{SqlitePolicyStore, SqliteTarget};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> retention_cli::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(catalog) = cli.catalog {
        config.retention.catalog_path = catalog;
    }
    if let Some(data_dir) = cli.data_dir {
        config.retention.data_dir = data_dir;
    }

    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    let settings = &config.retention;
    tracing::debug!(
        "Catalog: {}, data directory: {}",
        settings.catalog_path.display(),
        settings.data_dir.display()
    );

    match cli.command {
        Command::Setup => {
            commands::execute_setup(settings, &formatter)?;
        }
        Command::ListPolicies(args) => {
            let store = SqlitePolicyStore::new(&settings.catalog_path)?;
            commands::execute_list_policies(args, &store, &formatter)?;
        }
        Command::CreatePolicy(args) => {
            let mut store = SqlitePolicyStore::new(&settings.catalog_path)?;
            commands::execute_create_policy(args, &mut store, &formatter, format)?;
        }
        Command::DeletePolicy(args) => {
            let mut store = SqlitePolicyStore::new(&settings.catalog_path)?;
            commands::execute_delete_policy(args, &mut store, &formatter)?;
        }
        Command::Run(args) => {
            let store = SqlitePolicyStore::new(&settings.catalog_path)?;
            let mut target = SqliteTarget::open(&settings.data_dir)?;
            commands::execute_run(args, settings, &store, &mut target, &formatter).await?;
        }
        Command::Schedule(args) => {
            let store = SqlitePolicyStore::new(&settings.catalog_path)?;
            let target = SqliteTarget::open(&settings.data_dir)?;
            commands::execute_schedule(args, settings, store, target, &formatter).await?;
        }
    }

    Ok(())
}
