use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::SchemaCacheConfig;

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForeignKey {
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// Read-only view of the database tables handed to generators.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, TableSchema>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, schema: TableSchema) {
        self.tables.insert(table.into(), schema);
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&String, &TableSchema)> {
        self.tables.iter()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.table(table).is_some_and(|t| t.has_column(column))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table name to column names, the shape returned by `GET /schema`.
    pub fn column_listing(&self) -> BTreeMap<String, Vec<String>> {
        self.tables
            .iter()
            .map(|(name, schema)| {
                let cols = schema.columns.iter().map(|c| c.name.clone()).collect();
                (name.clone(), cols)
            })
            .collect()
    }
}

impl FromIterator<(String, TableSchema)> for SchemaSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, TableSchema)>>(iter: I) -> Self {
        Self {
            tables: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    schema: TableSchema,
    inserted_at: Instant,
}

/// Per-table schema cache with TTL and size limits, keyed by (database schema, table).
#[derive(Debug)]
pub struct SchemaCache {
    schemas: HashMap<(String, String), CacheEntry>,
    ttl: Duration,
    max_size: usize,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::with_config(&SchemaCacheConfig::default())
    }

    pub fn with_config(config: &SchemaCacheConfig) -> Self {
        Self {
            schemas: HashMap::new(),
            ttl: Duration::from_secs(config.ttl_secs),
            max_size: config.max_size,
        }
    }

    pub fn insert(&mut self, scope: String, table: String, schema: TableSchema) {
        let key = (scope, table);
        if !self.schemas.contains_key(&key) && self.schemas.len() >= self.max_size {
            self.evict_oldest();
        }

        self.schemas.insert(
            key,
            CacheEntry {
                schema,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, scope: &str, table: &str) -> Option<&TableSchema> {
        let key = (scope.to_string(), table.to_string());
        self.schemas
            .get(&key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| &entry.schema)
    }

    pub fn evict_expired(&mut self) {
        self.schemas
            .retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest_key) = self
            .schemas
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(k, _)| k.clone())
        {
            tracing::debug!(
                scope = %oldest_key.0,
                table = %oldest_key.1,
                "evicting oldest schema from cache"
            );
            self.schemas.remove(&oldest_key);
        }
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn clear(&mut self) {
        self.schemas.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(cols: &[&str]) -> TableSchema {
        TableSchema {
            columns: cols
                .iter()
                .map(|c| ColumnSchema {
                    name: c.to_string(),
                    data_type: "VARCHAR".to_string(),
                    nullable: true,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut cache = SchemaCache::with_config(&SchemaCacheConfig {
            ttl_secs: 300,
            max_size: 2,
        });
        cache.insert("main".into(), "a".into(), table(&["x"]));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("main".into(), "b".into(), table(&["y"]));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("main".into(), "c".into(), table(&["z"]));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("main", "a").is_none());
        assert!(cache.get("main", "c").is_some());
    }

    #[test]
    fn reinserting_a_key_does_not_evict() {
        let mut cache = SchemaCache::with_config(&SchemaCacheConfig {
            ttl_secs: 300,
            max_size: 2,
        });
        cache.insert("main".into(), "a".into(), table(&["x"]));
        cache.insert("main".into(), "b".into(), table(&["y"]));
        cache.insert("main".into(), "b".into(), table(&["y", "z"]));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("main", "a").is_some());
        assert!(cache.get("main", "b").is_some_and(|t| t.has_column("z")));
    }

    #[test]
    fn expired_entries_are_misses() {
        let mut cache = SchemaCache::with_config(&SchemaCacheConfig {
            ttl_secs: 0,
            max_size: 4,
        });
        cache.insert("main".into(), "a".into(), table(&["x"]));
        assert!(cache.get("main", "a").is_none());
        cache.evict_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn snapshot_lists_columns_in_table_order() {
        let snapshot: SchemaSnapshot = [
            ("trade_new".to_string(), table(&["id", "notional_usd"])),
            ("counterparty_new".to_string(), table(&["counterparty_id", "mpe"])),
        ]
        .into_iter()
        .collect();

        let names: Vec<_> = snapshot.table_names().collect();
        assert_eq!(names, vec!["counterparty_new", "trade_new"]);
        assert!(snapshot.has_column("trade_new", "notional_usd"));
        assert!(!snapshot.has_column("trade_new", "mpe"));
        assert_eq!(
            snapshot.column_listing()["counterparty_new"],
            vec!["counterparty_id".to_string(), "mpe".to_string()]
        );
    }
}
