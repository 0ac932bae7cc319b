use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::RiskqlConfig;
use crate::database::Database;
use crate::error::Result;
use crate::generators::{Availability, GeneratedSql, GeneratorSelector};
use crate::templates::TemplateCatalog;
use crate::validation::Validator;

/// What a caller gets back for one question. Execution failures are reported
/// in `error` next to the SQL that caused them.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub sql_query: String,
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub error: Option<String>,
    pub generator_used: String,
}

/// SQL produced without touching the database.
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    #[serde(flatten)]
    pub generated: GeneratedSql,
    pub generator_used: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub available_generators: Availability,
    pub default: String,
}

/// Shared request-handling state: config, database, templates and the
/// probed generator selector. Read-only after startup apart from the schema
/// cache inside [`Database`].
pub struct Runtime {
    config: RiskqlConfig,
    database: Database,
    catalog: Arc<TemplateCatalog>,
    selector: GeneratorSelector,
}

impl Runtime {
    pub fn new(
        config: RiskqlConfig,
        database: Database,
        catalog: Arc<TemplateCatalog>,
        selector: GeneratorSelector,
    ) -> Self {
        Self {
            config,
            database,
            catalog,
            selector,
        }
    }

    /// Connect the database, check the binding against the live schema and
    /// probe the configured LLM providers.
    pub async fn start(config: RiskqlConfig) -> Result<Self> {
        let binding = config.resolve_binding()?;
        let catalog = Arc::new(TemplateCatalog::new(binding, config.generation.dialect));

        let database = Database::connect(&config)?;
        let snapshot = database.extract_schema().await?;
        let problems = Validator::new(config.validation.warn_only)
            .validate_binding(catalog.binding(), &snapshot)?;
        tracing::info!(
            backend = database.backend_name(),
            tables = snapshot.len(),
            binding_problems = problems.len(),
            "database ready"
        );

        let selector = GeneratorSelector::connect(&config, catalog.clone()).await;
        tracing::info!(available = ?selector.availability(), "generators probed");

        Ok(Self::new(config, database, catalog, selector))
    }

    pub fn config(&self) -> &RiskqlConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn catalog(&self) -> &Arc<TemplateCatalog> {
        &self.catalog
    }

    pub fn selector(&self) -> &GeneratorSelector {
        &self.selector
    }

    fn requested<'a>(&'a self, generator_type: Option<&'a str>) -> &'a str {
        generator_type
            .filter(|kind| !kind.trim().is_empty())
            .unwrap_or(&self.config.generation.default_generator)
    }

    /// Produce SQL for `question` with the requested generator.
    pub async fn generate(&self, question: &str, generator_type: Option<&str>) -> Result<Generation> {
        let schema = self.database.extract_schema().await?;
        let selection = self.selector.select(self.requested(generator_type), &schema);
        let generated = selection.generator.generate(question).await;
        tracing::info!(
            generator = %selection.label,
            fallback = generated.is_fallback(),
            "generated sql"
        );
        Ok(Generation {
            generated,
            generator_used: selection.label,
        })
    }

    /// Generate SQL and run it. Only schema extraction failures are errors;
    /// a failing query is reported inside the outcome.
    pub async fn ask(&self, question: &str, generator_type: Option<&str>) -> Result<QueryOutcome> {
        let Generation {
            generated,
            generator_used,
        } = self.generate(question, generator_type).await?;

        let outcome = match self
            .database
            .execute(&generated.sql, self.config.query.row_limit)
            .await
        {
            Ok(result) => QueryOutcome {
                sql_query: generated.sql,
                columns: result.column_names(),
                rows: result.rows,
                error: None,
                generator_used,
            },
            Err(e) => {
                tracing::warn!(error = %e, sql = %generated.sql, "query failed");
                QueryOutcome {
                    sql_query: generated.sql,
                    columns: Vec::new(),
                    rows: Vec::new(),
                    error: Some(e.to_string()),
                    generator_used,
                }
            }
        };
        Ok(outcome)
    }

    /// Table name to column names, for display.
    pub async fn schema_tables(&self) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.database.extract_schema().await?.column_listing())
    }

    pub fn status(&self) -> Status {
        Status {
            available_generators: self.selector.availability(),
            default: self.config.generation.default_generator.clone(),
        }
    }
}
