//! SQL rendering of administrative actions
//!
//! Renders each [`Action`] as the statement a distributed SQL store with
//! partitioned tables, shard allocation filters and snapshot repositories
//! runs for it. Dry runs report these statements instead of executing them.

use crate::traits::{Action, Partition};
use crate::TableRef;

/// Quote an identifier, doubling embedded double quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a fully qualified table name
pub fn table_name(table: &TableRef) -> String {
    format!("{}.{}", quote_ident(&table.schema), quote_ident(&table.name))
}

fn partition_clause(partition: &Partition) -> String {
    format!(
        "PARTITION ({} = {})",
        quote_ident(&partition.column),
        quote_literal(&partition.value)
    )
}

/// Render an action as a SQL statement
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use retention_domain::{dialect, Action, TableRef};
///
/// let action = Action::DeleteRows {
///     table: TableRef::new("doc", "raw_metrics"),
///     column: "ts_day".to_string(),
///     cutoff: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
/// };
/// assert_eq!(
///     dialect::render(&action),
///     r#"DELETE FROM "doc"."raw_metrics" WHERE "ts_day" < '2024-12-31';"#
/// );
/// ```
pub fn render(action: &Action) -> String {
    match action {
        Action::DeleteRows {
            table,
            column,
            cutoff,
        } => format!(
            "DELETE FROM {} WHERE {} < {};",
            table_name(table),
            quote_ident(column),
            quote_literal(&cutoff.format("%Y-%m-%d").to_string())
        ),
        Action::Reallocate {
            table,
            partition,
            attribute_name,
            attribute_value,
        } => format!(
            "ALTER TABLE {} {} SET ({} = {});",
            table_name(table),
            partition_clause(partition),
            quote_ident(&format!("routing.allocation.require.{}", attribute_name)),
            quote_literal(attribute_value)
        ),
        Action::CreateSnapshot {
            repository,
            snapshot,
            table,
            partition,
        } => format!(
            "CREATE SNAPSHOT {}.{} TABLE {} {} WITH (\"wait_for_completion\" = true);",
            quote_ident(repository),
            quote_ident(snapshot),
            table_name(table),
            partition_clause(partition)
        ),
        Action::DeletePartition { table, partition } => format!(
            "DELETE FROM {} WHERE {} = {};",
            table_name(table),
            quote_ident(&partition.column),
            quote_literal(&partition.value)
        ),
    }
}
