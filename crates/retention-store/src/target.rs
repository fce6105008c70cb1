//! Embedded target store
//!
//! A data directory acts as a small cluster:
//! - `_cluster.db` holds node, repository, snapshot and allocation metadata
//! - every other `<schema>.db` file is a schema, attached under its own name
//! - a repository is a directory; each snapshot is written into it as a
//!   database file holding the archived partition
//!
//! Partition columns hold either epoch milliseconds (integer or real) or
//! ISO-8601 text: a year (`2024`), a month (`2024-12`), a date, or a
//! timestamp. A column holding anything else is rejected before any row is
//! selected or deleted.

use chrono::{NaiveDate, NaiveTime};
use retention_domain::dialect::{quote_ident, table_name};
use retention_domain::traits::{Action, Partition, TargetError, TargetStore};
use retention_domain::TableRef;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};

const CLUSTER_FILE: &str = "_cluster.db";
const SNAPSHOT_ALIAS: &str = "snapshot_out";

/// Map a SQLite error onto the target error taxonomy
///
/// I/O-level failures mean the store itself is gone; everything else is a
/// rejected statement.
fn map_sqlite(err: rusqlite::Error) -> TargetError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::SystemIoFailure
            | ErrorCode::PermissionDenied => TargetError::Unavailable(err.to_string()),
            _ => TargetError::Statement(err.to_string()),
        },
        _ => TargetError::Statement(err.to_string()),
    }
}

fn io_unavailable(path: &Path, err: std::io::Error) -> TargetError {
    TargetError::Unavailable(format!("{}: {}", path.display(), err))
}

/// File holding a snapshot inside its repository directory
///
/// Every byte outside `[A-Za-z0-9._-]`, and a leading dot, is written as
/// `%XX`, so distinct snapshot names never share a file.
fn snapshot_file_name(snapshot: &str) -> String {
    let mut name = String::with_capacity(snapshot.len() + 3);
    for (i, byte) in snapshot.bytes().enumerate() {
        let literal = byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') || (byte == b'.' && i > 0);
        if literal {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("%{:02X}", byte));
        }
    }
    name.push_str(".db");
    name
}

fn remove_snapshot_file(file: &Path) -> Result<(), TargetError> {
    match fs::remove_file(file) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TargetError::Statement(format!("{}: {}", file.display(), e))),
    }
}

/// Day a text partition value falls on, or NULL when it is not ISO-8601
fn text_day(col: &str) -> String {
    format!(
        "date(CASE
            WHEN {col} GLOB '[0-9][0-9][0-9][0-9]' THEN {col} || '-01-01'
            WHEN {col} GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]' THEN {col} || '-01'
            WHEN {col} GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]*' THEN {col}
         END)",
        col = col
    )
}

/// Predicate selecting rows whose partition value lies strictly before the cutoff
///
/// `?1` binds the cutoff day as `YYYY-MM-DD`, `?2` as epoch milliseconds.
fn before_cutoff(column: &str) -> String {
    let col = quote_ident(column);
    format!(
        "(CASE typeof({col})
            WHEN 'integer' THEN {col} < ?2
            WHEN 'real' THEN {col} < ?2
            WHEN 'text' THEN {day} < ?1
            ELSE 0
         END)",
        col = col,
        day = text_day(&col)
    )
}

fn cutoff_params(cutoff: NaiveDate) -> (String, i64) {
    (
        cutoff.format("%Y-%m-%d").to_string(),
        cutoff.and_time(NaiveTime::MIN).and_utc().timestamp_millis(),
    )
}

/// Embedded, SQLite-backed implementation of TargetStore
///
/// A fresh data directory starts as a single-node cluster (`node-0`, no
/// attributes) without repositories.
pub struct SqliteTarget {
    conn: Connection,
    data_dir: PathBuf,
}

impl SqliteTarget {
    /// Open a data directory, creating it if needed, and attach every schema in it
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, TargetError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|e| io_unavailable(&data_dir, e))?;

        let conn = Connection::open(data_dir.join(CLUSTER_FILE)).map_err(map_sqlite)?;
        conn.execute_batch(include_str!("cluster_schema.sql"))
            .map_err(map_sqlite)?;
        conn.execute(
            "INSERT OR IGNORE INTO nodes (name, position)
             SELECT 'node-0', 0 WHERE NOT EXISTS (SELECT 1 FROM nodes)",
            [],
        )
        .map_err(map_sqlite)?;

        let target = Self { conn, data_dir };

        let entries = fs::read_dir(&target.data_dir).map_err(|e| io_unavailable(&target.data_dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| io_unavailable(&target.data_dir, e))?.path();
            let is_schema = path.extension().is_some_and(|ext| ext == "db")
                && path.file_name().is_some_and(|name| name != CLUSTER_FILE);
            if let (true, Some(schema)) = (is_schema, path.file_stem().and_then(|s| s.to_str())) {
                target.attach(schema, &path)?;
            }
        }

        Ok(target)
    }

    /// Data directory of this target
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Raw connection, for creating tables and loading data
    ///
    /// Tables are addressed as `"schema"."table"`.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn is_attached(&self, schema: &str) -> Result<bool, TargetError> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM pragma_database_list WHERE name = ?1")
            .map_err(map_sqlite)?;
        let attached = stmt.exists(params![schema]).map_err(map_sqlite)?;
        Ok(attached)
    }

    fn attach(&self, schema: &str, path: &Path) -> Result<(), TargetError> {
        if self.is_attached(schema)? {
            return Ok(());
        }
        self.conn
            .execute(
                &format!("ATTACH DATABASE ?1 AS {}", quote_ident(schema)),
                params![path.to_string_lossy()],
            )
            .map_err(map_sqlite)?;
        Ok(())
    }

    /// Create a schema (a database file in the data directory) and attach it
    pub fn create_schema(&mut self, schema: &str) -> Result<(), TargetError> {
        if schema.is_empty() || schema.contains(['/', '\\']) || schema.starts_with('_') {
            return Err(TargetError::Statement(format!("Invalid schema name: {}", schema)));
        }
        let path = self.data_dir.join(format!("{}.db", schema));
        self.attach(schema, &path)
    }

    /// Register a node with the given attributes
    pub fn add_node(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), TargetError> {
        let tx = self.conn.transaction().map_err(map_sqlite)?;
        tx.execute(
            "INSERT OR IGNORE INTO nodes (name, position)
             VALUES (?1, (SELECT COALESCE(MAX(position), -1) + 1 FROM nodes))",
            params![name],
        )
        .map_err(map_sqlite)?;
        for (key, value) in attributes {
            tx.execute(
                "INSERT OR REPLACE INTO node_attributes (node, name, value) VALUES (?1, ?2, ?3)",
                params![name, key, value],
            )
            .map_err(map_sqlite)?;
        }
        tx.commit().map_err(map_sqlite)
    }

    /// Number of nodes in the cluster
    pub fn node_count(&self) -> Result<u64, TargetError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get::<_, i64>(0))
            .map(|n| n.max(0) as u64)
            .map_err(map_sqlite)
    }

    /// Register a snapshot repository backed by a directory
    ///
    /// The directory must exist when snapshots are taken; otherwise the
    /// repository is reported as unreachable.
    pub fn create_repository<P: AsRef<Path>>(&mut self, name: &str, location: P) -> Result<(), TargetError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO repositories (name, location) VALUES (?1, ?2)",
                params![name, location.as_ref().to_string_lossy()],
            )
            .map_err(map_sqlite)?;
        Ok(())
    }

    /// Names of the snapshots stored in a repository
    pub fn snapshots(&self, repository: &str) -> Result<Vec<String>, TargetError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM snapshots WHERE repository = ?1 ORDER BY name")
            .map_err(map_sqlite)?;
        let names = stmt
            .query_map(params![repository], |row| row.get::<_, String>(0))
            .map_err(map_sqlite)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite)?;
        Ok(names)
    }

    /// Node a partition is currently allocated on
    pub fn allocation(&self, table: &TableRef, partition_value: &str) -> Result<String, TargetError> {
        let node: Option<String> = self
            .conn
            .query_row(
                "SELECT node FROM partition_allocations
                 WHERE table_schema = ?1 AND table_name = ?2 AND partition_value = ?3",
                params![&table.schema, &table.name, partition_value],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqlite)?;
        match node {
            Some(node) => Ok(node),
            None => self.primary_node(),
        }
    }

    /// Reject partition columns holding values that are neither dates nor epoch milliseconds
    fn check_partition_values(&self, table: &TableRef, column: &str) -> Result<(), TargetError> {
        let col = quote_ident(column);
        let invalid: i64 = self
            .conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM {table} WHERE {col} IS NOT NULL
                     AND typeof({col}) NOT IN ('integer', 'real') AND {day} IS NULL",
                    table = table_name(table),
                    col = col,
                    day = text_day(&col)
                ),
                [],
                |row| row.get(0),
            )
            .map_err(map_sqlite)?;

        if invalid > 0 {
            return Err(TargetError::Statement(format!(
                "{} value(s) of {}.{} are neither ISO-8601 dates nor epoch milliseconds",
                invalid,
                table,
                column
            )));
        }
        Ok(())
    }

    /// Count rows of a table
    pub fn count_rows(&self, table: &TableRef) -> Result<u64, TargetError> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table_name(table)), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n.max(0) as u64)
            .map_err(map_sqlite)
    }

    fn primary_node(&self) -> Result<String, TargetError> {
        self.conn
            .query_row("SELECT name FROM nodes ORDER BY position LIMIT 1", [], |row| row.get(0))
            .map_err(map_sqlite)
    }

    fn repository_location(&self, name: &str) -> Result<Option<PathBuf>, TargetError> {
        let location: Option<String> = self
            .conn
            .query_row("SELECT location FROM repositories WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()
            .map_err(map_sqlite)?;
        Ok(location.map(PathBuf::from))
    }

    /// SQL expression summing the payload bytes of the selected rows
    fn payload_expression(&self, table: &TableRef) -> Result<String, TargetError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1, ?2)")
            .map_err(map_sqlite)?;
        let columns = stmt
            .query_map(params![&table.name, &table.schema], |row| row.get::<_, String>(0))
            .map_err(map_sqlite)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite)?;

        if columns.is_empty() {
            return Err(TargetError::Statement(format!("Table not found: {}", table)));
        }

        let terms: Vec<String> = columns
            .iter()
            .map(|c| format!("IFNULL(LENGTH(CAST({} AS BLOB)), 0)", quote_ident(c)))
            .collect();
        Ok(format!("SUM({})", terms.join(" + ")))
    }

    fn reallocate(
        &mut self,
        table: &TableRef,
        partition: &Partition,
        attribute_name: &str,
        attribute_value: &str,
    ) -> Result<u64, TargetError> {
        let current = self.allocation(table, &partition.value)?;

        // First node carrying the required attribute, if any
        let candidate: Option<String> = self
            .conn
            .query_row(
                "SELECT n.name FROM nodes n JOIN node_attributes a ON a.node = n.name
                 WHERE a.name = ?1 AND a.value = ?2 ORDER BY n.position LIMIT 1",
                params![attribute_name, attribute_value],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqlite)?;

        // The requirement is recorded even when no node can satisfy it
        let destination = candidate.clone().unwrap_or_else(|| current.clone());
        self.conn
            .execute(
                "INSERT OR REPLACE INTO partition_allocations
                     (table_schema, table_name, partition_value, attribute_name, attribute_value, node)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &table.schema,
                    &table.name,
                    &partition.value,
                    attribute_name,
                    attribute_value,
                    &destination
                ],
            )
            .map_err(map_sqlite)?;

        Ok(u64::from(destination != current))
    }

    fn create_snapshot(
        &mut self,
        repository: &str,
        snapshot: &str,
        table: &TableRef,
        partition: &Partition,
    ) -> Result<u64, TargetError> {
        let location = self.repository_location(repository)?.ok_or_else(|| {
            TargetError::DependencyMissing(format!("Repository '{}' does not exist", repository))
        })?;
        if !location.is_dir() {
            return Err(TargetError::DependencyMissing(format!(
                "Repository '{}' is unreachable at {}",
                repository,
                location.display()
            )));
        }

        let file = location.join(snapshot_file_name(snapshot));

        // A snapshot of the same partition left by an interrupted run is taken again
        let existing: Option<(String, String, String, String)> = self
            .conn
            .query_row(
                "SELECT table_schema, table_name, partition_column, partition_value
                 FROM snapshots WHERE repository = ?1 AND name = ?2",
                params![repository, snapshot],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(map_sqlite)?;
        if let Some((schema, name, column, value)) = existing {
            let same_partition =
                schema == table.schema && name == table.name && column == partition.column && value == partition.value;
            if !same_partition {
                return Err(TargetError::Statement(format!(
                    "Snapshot '{}.{}' already exists for {}.{} ({} = {})",
                    repository, snapshot, schema, name, column, value
                )));
            }
            self.conn
                .execute(
                    "DELETE FROM snapshots WHERE repository = ?1 AND name = ?2",
                    params![repository, snapshot],
                )
                .map_err(map_sqlite)?;
        }
        remove_snapshot_file(&file)?;

        self.conn
            .execute(
                &format!("ATTACH DATABASE ?1 AS {}", quote_ident(SNAPSHOT_ALIAS)),
                params![file.to_string_lossy()],
            )
            .map_err(map_sqlite)?;

        let copied = self.conn.execute(
            &format!(
                "CREATE TABLE {}.{} AS SELECT * FROM {} WHERE {} = ?1",
                quote_ident(SNAPSHOT_ALIAS),
                quote_ident(&table.name),
                table_name(table),
                quote_ident(&partition.column)
            ),
            params![&partition.value],
        );
        let archived = copied.and_then(|_| {
            self.conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {}.{}",
                    quote_ident(SNAPSHOT_ALIAS),
                    quote_ident(&table.name)
                ),
                [],
                |row| row.get::<_, i64>(0),
            )
        });

        // Detach before reporting, so a failed copy leaves no alias behind
        self.conn
            .execute(&format!("DETACH DATABASE {}", quote_ident(SNAPSHOT_ALIAS)), [])
            .map_err(map_sqlite)?;
        let archived = archived.map_err(map_sqlite)?.max(0) as u64;

        self.conn
            .execute(
                "INSERT INTO snapshots (repository, name, table_schema, table_name,
                     partition_column, partition_value, rows)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    repository,
                    snapshot,
                    &table.schema,
                    &table.name,
                    &partition.column,
                    &partition.value,
                    archived as i64
                ],
            )
            .map_err(map_sqlite)?;

        Ok(archived)
    }
}

impl TargetStore for SqliteTarget {
    fn ping(&mut self) -> Result<(), TargetError> {
        if !self.data_dir.is_dir() {
            return Err(TargetError::Unavailable(format!(
                "Data directory {} is gone",
                self.data_dir.display()
            )));
        }
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| TargetError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn eligible_partitions(
        &mut self,
        table: &TableRef,
        column: &str,
        cutoff: NaiveDate,
    ) -> Result<Vec<Partition>, TargetError> {
        let payload = self.payload_expression(table)?;
        self.check_partition_values(table, column)?;
        let sql = format!(
            "SELECT CAST({col} AS TEXT), COUNT(*), {payload} FROM {table}
             WHERE {before} GROUP BY {col} ORDER BY {col}",
            col = quote_ident(column),
            payload = payload,
            table = table_name(table),
            before = before_cutoff(column),
        );

        let (day, millis) = cutoff_params(cutoff);
        let mut stmt = self.conn.prepare(&sql).map_err(map_sqlite)?;
        let partitions = stmt
            .query_map(params![day, millis], |row| {
                Ok(Partition {
                    column: column.to_string(),
                    value: row.get(0)?,
                    rows: row.get::<_, i64>(1)?.max(0) as u64,
                    bytes: row.get::<_, Option<i64>>(2)?.unwrap_or(0).max(0) as u64,
                })
            })
            .map_err(map_sqlite)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite)?;

        Ok(partitions)
    }

    fn repository_exists(&mut self, name: &str) -> Result<bool, TargetError> {
        Ok(self.repository_location(name)?.is_some_and(|location| location.is_dir()))
    }

    fn execute(&mut self, action: &Action) -> Result<u64, TargetError> {
        match action {
            Action::DeleteRows {
                table,
                column,
                cutoff,
            } => {
                self.check_partition_values(table, column)?;
                let (day, millis) = cutoff_params(*cutoff);
                let deleted = self
                    .conn
                    .execute(
                        &format!("DELETE FROM {} WHERE {}", table_name(table), before_cutoff(column)),
                        params![day, millis],
                    )
                    .map_err(map_sqlite)?;
                Ok(deleted as u64)
            }
            Action::Reallocate {
                table,
                partition,
                attribute_name,
                attribute_value,
            } => self.reallocate(table, partition, attribute_name, attribute_value),
            Action::CreateSnapshot {
                repository,
                snapshot,
                table,
                partition,
            } => self.create_snapshot(repository, snapshot, table, partition),
            Action::DeletePartition { table, partition } => {
                let deleted = self
                    .conn
                    .execute(
                        &format!(
                            "DELETE FROM {} WHERE {} = ?1",
                            table_name(table),
                            quote_ident(&partition.column)
                        ),
                        params![&partition.value],
                    )
                    .map_err(map_sqlite)?;
                Ok(deleted as u64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_file_name_is_contained() {
        assert_eq!(snapshot_file_name("doc.raw_metrics-2024"), "doc.raw_metrics-2024.db");
        assert_eq!(snapshot_file_name("../etc/passwd"), "%2E.%2Fetc%2Fpasswd.db");
    }

    #[test]
    fn test_snapshot_file_names_are_distinct() {
        assert_ne!(snapshot_file_name("doc.t-2024:01"), snapshot_file_name("doc.t-2024_01"));
        assert_ne!(snapshot_file_name(".t"), snapshot_file_name("%2Et"));
        assert_ne!(snapshot_file_name("doc.t-é"), snapshot_file_name("doc.t-_"));
    }

    #[test]
    fn test_fresh_target_is_single_node() {
        let dir = tempfile::tempdir().unwrap();
        let target = SqliteTarget::open(dir.path()).unwrap();
        assert_eq!(target.node_count().unwrap(), 1);
        assert_eq!(target.primary_node().unwrap(), "node-0");
    }

    #[test]
    fn test_schema_names_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let mut target = SqliteTarget::open(dir.path()).unwrap();
        assert!(target.create_schema("doc").is_ok());
        assert!(target.create_schema("doc").is_ok());
        assert!(target.create_schema("_cluster").is_err());
        assert!(target.create_schema("a/b").is_err());
    }
}
