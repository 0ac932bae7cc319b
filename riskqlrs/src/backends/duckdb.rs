//! DuckDB backend implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::error::{Result, RiskqlError};
use crate::executor::{ColumnMeta, QueryResult};
use crate::schema_cache::{ColumnSchema, ForeignKey, TableSchema};

use super::BackendConnection;

const LIST_TABLES_SQL: &str = "SELECT table_name FROM information_schema.tables \
     WHERE table_schema = 'main' AND table_type = 'BASE TABLE' ORDER BY table_name";

const FOREIGN_KEYS_SQL: &str = "SELECT unnest(constraint_column_names), referenced_table, \
     unnest(referenced_column_names) FROM duckdb_constraints() \
     WHERE table_name = ? AND constraint_type = 'FOREIGN KEY'";

/// DuckDB connection implementing the unified backend trait.
#[derive(Clone)]
pub struct DuckDbConnection {
    database_path: PathBuf,
    limiter: Arc<Semaphore>,
    pool: Arc<Mutex<Vec<duckdb::Connection>>>,
}

impl DuckDbConnection {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        tracing::info!(path = %path.display(), max_concurrency = 16, "creating DuckDB connection");
        Self {
            database_path: path,
            limiter: Arc::new(Semaphore::new(16)),
            pool: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure maximum concurrent executions.
    pub fn with_max_concurrency(mut self, max_in_flight: usize) -> Self {
        tracing::debug!(max_concurrency = max_in_flight, "configuring DuckDB concurrency");
        self.limiter = Arc::new(Semaphore::new(max_in_flight.max(1)));
        self
    }

    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit> {
        if self.limiter.available_permits() == 0 {
            tracing::debug!("all DuckDB slots in use, waiting for permit");
        }
        Arc::clone(&self.limiter)
            .acquire_owned()
            .await
            .map_err(|e| RiskqlError::Execution(format!("limiter closed: {e}")))
    }

    async fn checkout_connection(&self) -> Result<duckdb::Connection> {
        let mut guard = self.pool.lock().await;
        if let Some(conn) = guard.pop() {
            let pool_size = guard.len();
            drop(guard);
            tracing::trace!(pool_remaining = pool_size, "reusing pooled DuckDB connection");
            return Ok(conn);
        }
        drop(guard);
        tracing::debug!(path = %self.database_path.display(), "opening new DuckDB connection");
        duckdb::Connection::open(self.database_path.clone())
            .map_err(|e| RiskqlError::Execution(format!("open duckdb: {e}")))
    }

    /// Run blocking work against a pooled connection on the blocking pool.
    ///
    /// The permit and the connection travel with the blocking task, so a
    /// caller that stops waiting (a query timeout) does not free the slot or
    /// lose the connection while DuckDB is still running the statement.
    async fn with_connection<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&duckdb::Connection) -> Result<T> + Send + 'static,
    {
        let permit = self.acquire_slot().await?;
        let conn = self.checkout_connection().await?;
        let pool = Arc::clone(&self.pool);
        let result = tokio::task::spawn_blocking(move || {
            let result = work(&conn);
            pool.blocking_lock().push(conn);
            drop(permit);
            result
        })
        .await
        .map_err(|e| RiskqlError::Execution(format!("task join error: {e}")))?;
        result.map_err(driver_error)
    }
}

/// Surface driver failures as execution errors carrying the driver message.
fn driver_error(err: RiskqlError) -> RiskqlError {
    match err {
        RiskqlError::DuckDb(e) => RiskqlError::Execution(e.to_string()),
        other => other,
    }
}

fn read_foreign_keys(conn: &duckdb::Connection, table: &str) -> Result<Vec<ForeignKey>> {
    let mut stmt = conn.prepare(FOREIGN_KEYS_SQL)?;
    let mut rows = stmt.query([table])?;
    let mut foreign_keys = Vec::new();
    while let Some(row) = rows.next()? {
        foreign_keys.push(ForeignKey {
            from_column: row.get(0)?,
            to_table: row.get(1)?,
            to_column: row.get(2)?,
        });
    }
    Ok(foreign_keys)
}

#[async_trait]
impl BackendConnection for DuckDbConnection {
    fn name(&self) -> &str {
        "duckdb"
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(LIST_TABLES_SQL)?;
            let mut rows = stmt.query([])?;
            let mut tables = Vec::new();
            while let Some(row) = rows.next()? {
                tables.push(row.get::<_, String>(0)?);
            }
            Ok(tables)
        })
        .await
    }

    async fn fetch_schema(&self, table: &str) -> Result<TableSchema> {
        let table = table.to_string();
        self.with_connection(move |conn| {
            let start = Instant::now();

            let pragma_sql = format!("PRAGMA table_info('{}')", table.replace('\'', "''"));
            let mut stmt = conn.prepare(&pragma_sql)?;
            let mut rows = stmt.query([])?;
            let mut columns = Vec::new();
            let mut primary_keys = Vec::new();
            while let Some(row) = rows.next()? {
                let name: String = row.get("name")?;
                let data_type: String = row.get("type")?;
                let not_null: bool = row.get("notnull")?;
                let pk_flag: bool = row.get("pk")?;
                if pk_flag {
                    primary_keys.push(name.clone());
                }
                columns.push(ColumnSchema {
                    name,
                    data_type,
                    nullable: !not_null,
                });
            }
            if columns.is_empty() {
                return Err(RiskqlError::Schema(format!("table {table} not found")));
            }

            let foreign_keys = read_foreign_keys(conn, &table).unwrap_or_else(|e| {
                tracing::debug!(table = table.as_str(), error = %e, "skipping foreign keys");
                Vec::new()
            });

            tracing::debug!(
                table = table.as_str(),
                ms = start.elapsed().as_millis(),
                "duckdb fetch_schema"
            );
            Ok(TableSchema {
                columns,
                primary_keys,
                foreign_keys,
            })
        })
        .await
    }

    async fn execute_sql(&self, sql: &str, row_limit: usize) -> Result<QueryResult> {
        let sql = sql.to_string();
        self.with_connection(move |conn| {
            let start = Instant::now();
            let mut stmt = conn.prepare(&sql)?;
            let mut rows_iter = stmt.query([])?;
            let stmt_ref = rows_iter
                .as_ref()
                .ok_or_else(|| RiskqlError::Execution("statement missing".to_string()))?;
            let mut column_names = Vec::new();
            for idx in 0..stmt_ref.column_count() {
                let name = stmt_ref
                    .column_name(idx)
                    .map_err(|e| RiskqlError::Execution(e.to_string()))?;
                column_names.push(name.to_string());
            }
            let mut rows = Vec::new();
            while rows.len() < row_limit {
                let Some(row) = rows_iter.next()? else {
                    break;
                };
                let mut map = serde_json::Map::new();
                for (idx, name) in column_names.iter().enumerate() {
                    let value = crate::executor::duck_value_to_json(row.get_ref(idx)?.to_owned());
                    map.insert(name.clone(), value);
                }
                rows.push(map);
            }

            let columns: Vec<_> = column_names
                .into_iter()
                .map(|name| ColumnMeta { name })
                .collect();
            tracing::debug!(
                rows = rows.len(),
                columns = columns.len(),
                row_limit,
                ms = start.elapsed().as_millis(),
                "duckdb execute_sql"
            );
            Ok(QueryResult { columns, rows })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn abandoned_work_keeps_slot_until_done() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DuckDbConnection::new(dir.path().join("slots.duckdb")).with_max_concurrency(1);

        let slow = backend.with_connection(|_conn| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        });
        assert!(tokio::time::timeout(Duration::from_millis(20), slow)
            .await
            .is_err());
        assert_eq!(backend.limiter.available_permits(), 0);

        // the next caller waits for the slot, then reuses the pooled connection
        let tables = backend.list_tables().await.unwrap();
        assert!(tables.is_empty());
        assert_eq!(backend.limiter.available_permits(), 1);
        assert_eq!(backend.pool.lock().await.len(), 1);
    }
}
