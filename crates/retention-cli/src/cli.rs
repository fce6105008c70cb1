//! CLI command definitions and argument parsing.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use retention_domain::{ColumnUnit, Strategy, TableRef, TagSet};
use std::path::PathBuf;

/// Retention CLI - Manage and apply data retention policies.
#[derive(Debug, Parser)]
#[command(name = "retention")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log debug output, including every issued statement
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Policy catalog database
    #[arg(long, global = true, env = "RETENTION_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Target store data directory
    #[arg(long, global = true, env = "RETENTION_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (IDs only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the policy catalog and the target data directory
    Setup,

    /// List retention policies
    ListPolicies(ListArgs),

    /// Add a retention policy
    CreatePolicy(CreateArgs),

    /// Remove a retention policy
    DeletePolicy(DeleteArgs),

    /// Apply retention policies once
    Run(RunArgs),

    /// Apply retention policies on a fixed interval until Ctrl+C
    Schedule(ScheduleArgs),
}

/// Arguments for the list-policies command.
#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Filter by strategy
    #[arg(short, long)]
    pub strategy: Option<Strategy>,

    /// Only policies carrying all of these tags (comma-separated)
    #[arg(short, long)]
    pub tags: Option<String>,

    /// Filter by table (schema.table)
    #[arg(long, value_parser = parse_table)]
    pub table: Option<TableRef>,

    /// Maximum number of results
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for the create-policy command.
#[derive(Debug, Parser)]
pub struct CreateArgs {
    /// Strategy applied to expired partitions
    pub strategy: Strategy,

    /// Target table (schema.table, or a table in the "doc" schema)
    #[arg(value_parser = parse_table)]
    pub table: TableRef,

    /// Column compared against the cutoff
    pub partition_column: String,

    /// Granularity of the partition column
    #[arg(short, long, default_value = "day")]
    pub unit: ColumnUnit,

    /// Number of units kept before the cutoff
    #[arg(short, long, default_value = "0")]
    pub period: u32,

    /// Labels for run-time selection (comma-separated)
    #[arg(short, long)]
    pub tags: Option<String>,

    /// Node attribute for reallocation (e.g. storage)
    #[arg(long)]
    pub attribute_name: Option<String>,

    /// Node attribute value for reallocation (e.g. cold)
    #[arg(long)]
    pub attribute_value: Option<String>,

    /// Snapshot repository receiving archived partitions
    #[arg(long)]
    pub repository: Option<String>,
}

/// Arguments for the delete-policy command.
#[derive(Debug, Parser)]
pub struct DeleteArgs {
    /// Policy IDs to delete
    #[arg(required = true)]
    pub ids: Vec<String>,
}

/// Arguments for the run command.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Data older than this day (YYYY-MM-DD) is eligible; defaults to today
    #[arg(long, value_parser = parse_day)]
    pub cutoff_day: Option<NaiveDate>,

    /// Only apply policies with this strategy
    #[arg(short, long)]
    pub strategy: Option<Strategy>,

    /// Only apply policies carrying all of these tags (comma-separated)
    #[arg(short, long)]
    pub tags: Option<String>,

    /// Render statements without executing them
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the schedule command.
#[derive(Debug, Parser)]
pub struct ScheduleArgs {
    /// Minutes between runs (overrides the configuration)
    #[arg(short, long)]
    pub interval_minutes: Option<u64>,

    /// Stop after this many runs
    #[arg(long)]
    pub cycles: Option<usize>,

    /// Render statements without executing them
    #[arg(long)]
    pub dry_run: bool,
}

/// Parse a cutoff day in ISO format.
pub fn parse_day(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid day '{}': {}", s, e))
}

/// Parse `schema.table`; a bare name lives in the `doc` schema.
pub fn parse_table(s: &str) -> Result<TableRef, String> {
    let (schema, name) = s.split_once('.').unwrap_or(("doc", s));
    if schema.is_empty() || name.is_empty() || name.contains('.') {
        return Err(format!("Invalid table '{}', expected schema.table", s));
    }
    Ok(TableRef::new(schema, name))
}

/// Parse an optional comma-separated tag list.
pub fn tag_set(tags: Option<&str>) -> TagSet {
    tags.map(TagSet::parse).unwrap_or_default()
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}
