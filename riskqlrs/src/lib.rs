pub mod backends;
pub mod config;
pub mod database;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod generators;
pub mod llm;
pub mod nlq;
pub mod runtime;
pub mod schema_cache;
pub mod server;
pub mod sql_ast;
pub mod templates;
pub mod training;
pub mod validation;

pub use crate::validation::Validator;
pub use config::RiskqlConfig;
pub use database::Database;
pub use error::{Result, RiskqlError};
pub use executor::QueryResult;
pub use generators::{GeneratedSql, GeneratorSelector, SqlGenerator, SqlSource};
pub use nlq::{analyze, Analysis, Intent};
pub use runtime::{QueryOutcome, Runtime};
pub use schema_cache::{SchemaSnapshot, TableSchema};
pub use templates::{SchemaBinding, TemplateCatalog};
