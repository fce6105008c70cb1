//! Policy catalog commands: list, create and delete.

use crate::cli::{tag_set, CreateArgs, DeleteArgs, ListArgs};
use crate::config::OutputFormat;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use retention_domain::{PolicyId, PolicyQuery, PolicyStore, RetentionPolicy, TargetParams};
use retention_store::SqlitePolicyStore;

/// Execute the list-policies command.
pub fn execute_list_policies(args: ListArgs, store: &SqlitePolicyStore, formatter: &Formatter) -> Result<()> {
    let policies = store.list_policies(&list_query(&args))?;
    println!("{}", formatter.format_policies(&policies)?);
    Ok(())
}

/// Execute the create-policy command.
pub fn execute_create_policy(
    args: CreateArgs,
    store: &mut SqlitePolicyStore,
    formatter: &Formatter,
    format: OutputFormat,
) -> Result<()> {
    let policy = build_policy(args)?;
    let table = policy.table.clone();
    let id = store.create_policy(policy)?;

    if format == OutputFormat::Quiet {
        println!("{}", id);
    } else {
        println!("{}", formatter.success(&format!("Policy {} created for {}", id, table)));
    }

    Ok(())
}

/// Execute the delete-policy command.
pub fn execute_delete_policy(args: DeleteArgs, store: &mut SqlitePolicyStore, formatter: &Formatter) -> Result<()> {
    let ids = parse_ids(&args.ids)?;

    for id in &ids {
        store.delete_policy(*id)?;
        tracing::debug!("Deleted policy {}", id);
    }

    println!("{}", formatter.success(&format!("Deleted {} policy(ies)", ids.len())));
    Ok(())
}

fn list_query(args: &ListArgs) -> PolicyQuery {
    PolicyQuery {
        strategy: args.strategy.map(|s| s.as_str().to_string()),
        table_schema: args.table.as_ref().map(|t| t.schema.clone()),
        table_name: args.table.as_ref().map(|t| t.name.clone()),
        tags: tag_set(args.tags.as_deref()),
        limit: args.limit,
    }
}

/// Build a catalog record from command-line arguments.
fn build_policy(args: CreateArgs) -> Result<RetentionPolicy> {
    if args.attribute_name.is_some() != args.attribute_value.is_some() {
        return Err(CliError::InvalidInput(
            "--attribute-name and --attribute-value must be given together".to_string(),
        ));
    }

    let policy = RetentionPolicy::new(args.strategy, args.table, args.partition_column)
        .with_period(args.unit, args.period)
        .with_tags(tag_set(args.tags.as_deref()))
        .with_target(TargetParams {
            reallocation_attribute_name: args.attribute_name,
            reallocation_attribute_value: args.attribute_value,
            target_repository_name: args.repository,
        });

    policy.validate().map_err(CliError::InvalidInput)?;
    Ok(policy)
}

fn parse_ids(ids: &[String]) -> Result<Vec<PolicyId>> {
    ids.iter()
        .map(|id| {
            PolicyId::from_string(id.trim())
                .map_err(|e| CliError::InvalidInput(format!("Invalid ID '{}': {}", id, e)))
        })
        .collect()
}
