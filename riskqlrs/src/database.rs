//! Schema extraction and query execution over the configured backend.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::backends::BackendConnection;
use crate::config::{BackendKind, QueryConfig, RiskqlConfig};
use crate::error::{Result, RiskqlError};
use crate::executor::QueryResult;
use crate::schema_cache::{SchemaCache, SchemaSnapshot, TableSchema};

/// A backend connection plus the schema cache in front of it.
pub struct Database {
    backend: Arc<dyn BackendConnection>,
    cache: Mutex<SchemaCache>,
    timeout: Duration,
}

impl Database {
    pub fn new(backend: Arc<dyn BackendConnection>, config: &RiskqlConfig) -> Self {
        Self {
            backend,
            cache: Mutex::new(SchemaCache::with_config(&config.schema_cache)),
            timeout: query_timeout(&config.query),
        }
    }

    /// Open the backend named by `[database]`.
    pub fn connect(config: &RiskqlConfig) -> Result<Self> {
        let db = &config.database;
        let backend: Arc<dyn BackendConnection> = match db.backend {
            #[cfg(feature = "duckdb")]
            BackendKind::Duckdb => Arc::new(
                crate::backends::DuckDbConnection::new(&db.path)
                    .with_max_concurrency(db.max_concurrency),
            ),
            #[cfg(feature = "postgres")]
            BackendKind::Postgres => {
                let url = db.url.as_deref().ok_or_else(|| {
                    RiskqlError::Config("database.url is required for postgres".to_string())
                })?;
                Arc::new(crate::backends::PostgresConnection::new(url, &db.schema)?)
            }
            #[allow(unreachable_patterns)]
            other => {
                return Err(RiskqlError::Config(format!(
                    "backend {other:?} is not compiled in"
                )))
            }
        };
        Ok(Self::new(backend, config))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn cache(&self) -> MutexGuard<'_, SchemaCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn table_schema(&self, table: &str) -> Result<TableSchema> {
        let scope = self.backend.name();
        if let Some(schema) = self.cache().get(scope, table).cloned() {
            return Ok(schema);
        }
        let schema = self.backend.fetch_schema(table).await?;
        self.cache()
            .insert(scope.to_string(), table.to_string(), schema.clone());
        Ok(schema)
    }

    /// Every base table and its columns. Per-table schemas come from the
    /// cache while fresh.
    pub async fn extract_schema(&self) -> Result<SchemaSnapshot> {
        let start = Instant::now();
        self.cache().evict_expired();
        let tables = self.backend.list_tables().await?;
        let mut snapshot = SchemaSnapshot::new();
        for table in tables {
            let schema = self.table_schema(&table).await?;
            snapshot.insert(table, schema);
        }
        tracing::debug!(
            backend = self.backend.name(),
            tables = snapshot.len(),
            ms = start.elapsed().as_millis(),
            "extracted schema"
        );
        Ok(snapshot)
    }

    /// Run `sql` once under the configured query timeout.
    pub async fn execute(&self, sql: &str, row_limit: usize) -> Result<QueryResult> {
        tracing::debug!(backend = self.backend.name(), sql = %sql, row_limit, "executing query");
        match tokio::time::timeout(self.timeout, self.backend.execute_sql(sql, row_limit)).await {
            Ok(result) => result,
            Err(_) => {
                let ms = self.timeout.as_millis() as u64;
                tracing::warn!(timeout_ms = ms, "query timed out");
                Err(RiskqlError::Timeout(ms))
            }
        }
    }
}

fn query_timeout(config: &QueryConfig) -> Duration {
    Duration::from_millis(config.timeout_ms.max(1))
}
