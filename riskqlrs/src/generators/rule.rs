use std::sync::Arc;

use async_trait::async_trait;

use super::{GeneratedSql, SqlGenerator, SqlSource};
use crate::templates::TemplateCatalog;

/// Template-only generator; always succeeds.
#[derive(Debug, Clone)]
pub struct RuleGenerator {
    catalog: Arc<TemplateCatalog>,
}

impl RuleGenerator {
    pub fn new(catalog: Arc<TemplateCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SqlGenerator for RuleGenerator {
    async fn generate(&self, question: &str) -> GeneratedSql {
        let sql = self.catalog.sql_for(question);
        tracing::debug!(sql = %sql, "rule-based sql");
        GeneratedSql {
            sql,
            source: SqlSource::Rules,
        }
    }
}
