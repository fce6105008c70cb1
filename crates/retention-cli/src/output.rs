//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use retention_domain::{Effect, OutcomeStatus, PolicyOutcome, RetentionPolicy, RunResult};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format a policy listing.
    pub fn format_policies(&self, policies: &[RetentionPolicy]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(policies)?),
            OutputFormat::Table => Ok(self.format_policies_table(policies)),
            OutputFormat::Quiet => Ok(policies
                .iter()
                .map(|p| p.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    fn format_policies_table(&self, policies: &[RetentionPolicy]) -> String {
        if policies.is_empty() {
            return self.colorize("No policies found.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["ID", "Strategy", "Table", "Column", "Keep", "Tags", "Target"]);

        for policy in policies {
            let keep = format!("{} {}", policy.retention_period, policy.cutoff_column_unit);
            builder.push_record([
                &policy.id.to_string()[..8], // Truncate ID for readability
                &policy.strategy,
                &policy.table.to_string(),
                &policy.partition_column,
                &keep,
                &policy.tags.to_string(),
                &describe_target(policy),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        table.to_string()
    }

    /// Format the result of a run.
    pub fn format_run(&self, result: &RunResult) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
            OutputFormat::Table => Ok(self.format_run_table(result)),
            OutputFormat::Quiet => Ok(result
                .outcomes
                .iter()
                .map(|o| format!("{} {}", o.policy_id, status_label(o.status)))
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    fn format_run_table(&self, result: &RunResult) -> String {
        if result.outcomes.is_empty() {
            return self.colorize("No policies to run.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["ID", "Strategy", "Table", "Status", "Effect", "Detail"]);

        for outcome in &result.outcomes {
            builder.push_record([
                &outcome.policy_id.to_string()[..8],
                &outcome.strategy,
                &outcome.table.to_string(),
                &self.colorize_status(outcome.status),
                &describe_effect(&outcome.effect),
                &describe_detail(outcome),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        let mut lines = vec![table.to_string()];
        if result.dry_run {
            lines.push(self.info("Dry run, planned statements:"));
            for statement in result.outcomes.iter().flat_map(|o| &o.statements) {
                lines.push(format!("  {}", statement));
            }
        }
        lines.push(self.summary(result));
        lines.join("\n")
    }

    /// One-line summary of a run.
    pub fn summary(&self, result: &RunResult) -> String {
        let message = format!(
            "Cutoff {}: {} succeeded, {} skipped, {} failed",
            result.cutoff_day,
            result.succeeded(),
            result.skipped(),
            result.failed()
        );
        if !result.is_clean() {
            self.error(&message)
        } else if result.skipped() > 0 {
            self.warning(&message)
        } else {
            self.success(&message)
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn colorize_status(&self, status: OutcomeStatus) -> String {
        let color = match status {
            OutcomeStatus::Success => "green",
            OutcomeStatus::Skipped => "yellow",
            OutcomeStatus::Failed => "red",
        };
        self.colorize(status_label(status), color)
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn status_label(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Success => "SUCCESS",
        OutcomeStatus::Skipped => "SKIPPED",
        OutcomeStatus::Failed => "FAILED",
    }
}

fn describe_target(policy: &RetentionPolicy) -> String {
    let target = &policy.target;
    match (
        &target.reallocation_attribute_name,
        &target.reallocation_attribute_value,
        &target.target_repository_name,
    ) {
        (Some(name), Some(value), _) => format!("{}={}", name, value),
        (_, _, Some(repository)) => format!("repo:{}", repository),
        _ => String::new(),
    }
}

fn describe_effect(effect: &Effect) -> String {
    match effect {
        Effect::None => "-".to_string(),
        Effect::RowsDeleted { rows_affected } => format!("{} rows deleted", rows_affected),
        Effect::Reallocated {
            partitions_moved,
            bytes_moved,
        } => format!("{} partitions moved ({} bytes)", partitions_moved, bytes_moved),
        Effect::Snapshotted {
            snapshot_ids,
            rows_affected,
        } => format!("{} snapshots, {} rows purged", snapshot_ids.len(), rows_affected),
    }
}

fn describe_detail(outcome: &PolicyOutcome) -> String {
    if let Some(error) = &outcome.error {
        return error.clone();
    }
    match outcome.skip_reason {
        Some(retention_domain::SkipReason::TagsMismatch) => "tags do not match".to_string(),
        Some(retention_domain::SkipReason::Cancelled) => "run cancelled".to_string(),
        None => String::new(),
    }
}
