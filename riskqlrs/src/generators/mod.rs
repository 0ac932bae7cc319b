//! SQL generators and the selector that picks one per request.
//!
//! Every generator bottoms out in the template catalogue: LLM-assisted
//! generators return template SQL whenever the model is unavailable, slow,
//! failing or produces something that does not look like a query.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

mod extract;
mod llm;
mod prompt;
mod rule;
mod selector;

pub use extract::{extract_sql, validate_sql, DENY_PHRASES};
pub use llm::{LlmGenerator, LlmSettings, PromptMode};
pub use prompt::{render_schema, system_prompt};
pub use rule::RuleGenerator;
pub use selector::{Availability, Candidate, GeneratorKind, GeneratorSelector, Selection};

/// Why an LLM-assisted generator returned template SQL instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    NoClient,
    Timeout,
    ClientError(String),
    InvalidSql(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoClient => f.write_str("no LLM client configured"),
            FallbackReason::Timeout => f.write_str("LLM call timed out"),
            FallbackReason::ClientError(e) => write!(f, "LLM call failed: {e}"),
            FallbackReason::InvalidSql(sql) => write!(f, "LLM reply is not usable SQL: {sql}"),
        }
    }
}

/// Where the returned SQL came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SqlSource {
    Rules,
    Llm { model: String },
    Fallback { reason: FallbackReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedSql {
    pub sql: String,
    pub source: SqlSource,
}

impl GeneratedSql {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, SqlSource::Fallback { .. })
    }
}

/// Result of asking a model for SQL, before any fallback is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drafted {
    Sql(String),
    Fallback(FallbackReason),
}

/// Turns a question into SQL. Implementations never fail; the worst case is
/// template SQL.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate(&self, question: &str) -> GeneratedSql;
}
