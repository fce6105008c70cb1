//! SQLite-backed policy catalog

use crate::StoreError;
use retention_domain::traits::{PolicyQuery, PolicyStore};
use retention_domain::{ColumnUnit, PolicyId, RetentionPolicy, TableRef, TagSet, TargetParams};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction};
use std::path::Path;

const POLICY_COLUMNS: &str = "id, strategy, table_schema, table_name, partition_column, \
     cutoff_column_unit, retention_period, reallocation_attribute_name, \
     reallocation_attribute_value, target_repository_name";

/// SQLite-based implementation of PolicyStore
///
/// The catalog survives restarts when opened on a file path.
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Each thread should open its own
/// SqlitePolicyStore on the same file.
pub struct SqlitePolicyStore {
    conn: Connection,
}

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, err.into())
}

impl SqlitePolicyStore {
    /// Open (or create) a catalog at the given database path
    ///
    /// Use `:memory:` for an in-memory catalog (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use retention_store::SqlitePolicyStore;
    ///
    /// let store = SqlitePolicyStore::new("retention.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.setup()?;
        Ok(store)
    }

    /// Create the catalog tables if they do not exist yet
    ///
    /// Safe to call any number of times.
    pub fn setup(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(include_str!("policy_schema.sql"))?;
        Ok(())
    }

    fn row_to_policy(row: &Row<'_>) -> rusqlite::Result<RetentionPolicy> {
        let id: String = row.get(0)?;
        let id = PolicyId::from_string(&id).map_err(|e| conversion_error(0, Type::Text, e))?;

        let unit: String = row.get(5)?;
        let cutoff_column_unit = ColumnUnit::parse(&unit)
            .ok_or_else(|| conversion_error(5, Type::Text, format!("Unknown column unit: {}", unit)))?;

        let period: i64 = row.get(6)?;
        let retention_period =
            u32::try_from(period).map_err(|e| conversion_error(6, Type::Integer, e))?;

        Ok(RetentionPolicy {
            id,
            strategy: row.get(1)?,
            table: TableRef::new(row.get::<_, String>(2)?, row.get::<_, String>(3)?),
            partition_column: row.get(4)?,
            cutoff_column_unit,
            retention_period,
            tags: TagSet::new(),
            target: TargetParams {
                reallocation_attribute_name: row.get(7)?,
                reallocation_attribute_value: row.get(8)?,
                target_repository_name: row.get(9)?,
            },
        })
    }

    fn load_tags(&self, id: PolicyId) -> Result<TagSet, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT tag FROM retention_policy_tags WHERE policy_id = ?1 ORDER BY tag")?;
        let tags = stmt
            .query_map(params![id.to_string()], |row| row.get::<_, String>(0))?
            .collect::<Result<TagSet, _>>()?;
        Ok(tags)
    }

    fn write_tags(tx: &Transaction<'_>, policy: &RetentionPolicy) -> Result<(), StoreError> {
        let id = policy.id.to_string();
        tx.execute("DELETE FROM retention_policy_tags WHERE policy_id = ?1", params![&id])?;
        let mut stmt = tx.prepare_cached("INSERT INTO retention_policy_tags (policy_id, tag) VALUES (?1, ?2)")?;
        for tag in policy.tags.iter() {
            stmt.execute(params![&id, tag])?;
        }
        Ok(())
    }

    /// Translate a unique-constraint violation into `Duplicate`
    fn map_write_error(err: rusqlite::Error, policy: &RetentionPolicy) -> StoreError {
        match err {
            rusqlite::Error::SqliteFailure(ref failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Duplicate(policy.table.to_string())
            }
            other => StoreError::Database(other),
        }
    }

    /// Translate a catalog row that does not decode into `InvalidData`
    fn map_read_error(err: rusqlite::Error) -> StoreError {
        match err {
            rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
                StoreError::InvalidData(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

impl PolicyStore for SqlitePolicyStore {
    type Error = StoreError;

    fn create_policy(&mut self, policy: RetentionPolicy) -> Result<PolicyId, Self::Error> {
        policy.validate().map_err(StoreError::InvalidData)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO retention_policies (id, strategy, table_schema, table_name, partition_column,
                 cutoff_column_unit, retention_period, reallocation_attribute_name,
                 reallocation_attribute_value, target_repository_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                policy.id.to_string(),
                policy.strategy.to_lowercase(),
                &policy.table.schema,
                &policy.table.name,
                &policy.partition_column,
                policy.cutoff_column_unit.as_str(),
                i64::from(policy.retention_period),
                &policy.target.reallocation_attribute_name,
                &policy.target.reallocation_attribute_value,
                &policy.target.target_repository_name,
            ],
        )
        .map_err(|e| Self::map_write_error(e, &policy))?;
        Self::write_tags(&tx, &policy)?;
        tx.commit()?;

        Ok(policy.id)
    }

    fn get_policy(&self, id: PolicyId) -> Result<Option<RetentionPolicy>, Self::Error> {
        let policy = self
            .conn
            .query_row(
                &format!("SELECT {} FROM retention_policies WHERE id = ?1", POLICY_COLUMNS),
                params![id.to_string()],
                Self::row_to_policy,
            )
            .optional()
            .map_err(Self::map_read_error)?;

        match policy {
            Some(mut policy) => {
                policy.tags = self.load_tags(policy.id)?;
                Ok(Some(policy))
            }
            None => Ok(None),
        }
    }

    fn update_policy(&mut self, policy: &RetentionPolicy) -> Result<(), Self::Error> {
        policy.validate().map_err(StoreError::InvalidData)?;

        let tx = self.conn.transaction()?;
        let updated = tx
            .execute(
                "UPDATE retention_policies SET strategy = ?2, table_schema = ?3, table_name = ?4,
                     partition_column = ?5, cutoff_column_unit = ?6, retention_period = ?7,
                     reallocation_attribute_name = ?8, reallocation_attribute_value = ?9,
                     target_repository_name = ?10
                 WHERE id = ?1",
                params![
                    policy.id.to_string(),
                    policy.strategy.to_lowercase(),
                    &policy.table.schema,
                    &policy.table.name,
                    &policy.partition_column,
                    policy.cutoff_column_unit.as_str(),
                    i64::from(policy.retention_period),
                    &policy.target.reallocation_attribute_name,
                    &policy.target.reallocation_attribute_value,
                    &policy.target.target_repository_name,
                ],
            )
            .map_err(|e| Self::map_write_error(e, policy))?;

        if updated == 0 {
            return Err(StoreError::NotFound(policy.id.to_string()));
        }

        Self::write_tags(&tx, policy)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_policy(&mut self, id: PolicyId) -> Result<(), Self::Error> {
        let id = id.to_string();
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM retention_policy_tags WHERE policy_id = ?1", params![&id])?;
        let deleted = tx.execute("DELETE FROM retention_policies WHERE id = ?1", params![&id])?;

        if deleted == 0 {
            return Err(StoreError::NotFound(id));
        }

        tx.commit()?;
        Ok(())
    }

    fn list_policies(&self, query: &PolicyQuery) -> Result<Vec<RetentionPolicy>, Self::Error> {
        let mut sql = format!("SELECT {} FROM retention_policies WHERE 1=1", POLICY_COLUMNS);
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(strategy) = &query.strategy {
            sql.push_str(" AND lower(strategy) = lower(?)");
            params.push(Box::new(strategy.clone()));
        }

        if let Some(schema) = &query.table_schema {
            sql.push_str(" AND table_schema = ?");
            params.push(Box::new(schema.clone()));
        }

        if let Some(name) = &query.table_name {
            sql.push_str(" AND table_name = ?");
            params.push(Box::new(name.clone()));
        }

        // Policies carrying every requested tag
        if !query.tags.is_empty() {
            let placeholders = vec!["?"; query.tags.len()].join(", ");
            sql.push_str(&format!(
                " AND id IN (SELECT policy_id FROM retention_policy_tags WHERE tag IN ({})
                   GROUP BY policy_id HAVING COUNT(DISTINCT tag) = ?)",
                placeholders
            ));
            for tag in query.tags.iter() {
                params.push(Box::new(tag.to_string()));
            }
            params.push(Box::new(query.tags.len() as i64));
        }

        sql.push_str(" ORDER BY table_schema, table_name, partition_column, id");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut policies = stmt
            .query_map(&param_refs[..], Self::row_to_policy)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(Self::map_read_error)?;

        for policy in &mut policies {
            policy.tags = self.load_tags(policy.id)?;
        }

        Ok(policies)
    }
}
