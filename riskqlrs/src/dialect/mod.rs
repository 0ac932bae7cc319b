//! SQL dialect abstractions for the supported database backends.
//!
//! Template identifiers are emitted bare whenever the target engine would
//! read them unchanged, so rendered SQL stays close to hand-written SQL.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sql_ast::Aggregation;

/// Words that always need quoting when used as identifiers.
const RESERVED: &[&str] = &[
    "all", "and", "as", "asc", "between", "by", "case", "cast", "create", "delete", "desc",
    "distinct", "drop", "else", "end", "exists", "from", "full", "group", "having", "in",
    "inner", "insert", "is", "join", "left", "like", "limit", "not", "null", "offset", "on",
    "or", "order", "right", "select", "table", "then", "union", "update", "user", "using",
    "when", "where", "with",
];

/// Dialects render identifiers and primitive expression pieces.
/// Expression tree walking lives in the SQL renderer; the dialect
/// only maps logical constructs to SQL fragments.
pub trait Dialect {
    /// Quote an identifier unconditionally.
    fn force_quote(&self, ident: &str) -> String;

    fn quote_ident(&self, ident: &str) -> String {
        if needs_quoting(ident) {
            self.force_quote(ident)
        } else {
            ident.to_string()
        }
    }

    fn render_cast(&self, expr: &str, data_type: &str) -> String {
        format!("CAST({expr} AS {data_type})")
    }

    fn render_aggregation(&self, agg: &Aggregation, expr: &str) -> String {
        match agg {
            Aggregation::Sum => format!("SUM({expr})"),
            Aggregation::Count => format!("COUNT({expr})"),
            Aggregation::Avg => format!("AVG({expr})"),
        }
    }
}

/// True unless `ident` is a lowercase word identifier that is not reserved.
pub fn needs_quoting(ident: &str) -> bool {
    let mut chars = ident.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    !(valid_start && valid_rest) || RESERVED.contains(&ident)
}

/// Dialect selector used in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    /// Double-quoted identifiers (DuckDB, PostgreSQL).
    #[default]
    Ansi,
    /// Backtick-quoted identifiers.
    Mysql,
}

impl DialectKind {
    pub fn dialect(&self) -> Arc<dyn Dialect + Send + Sync> {
        match self {
            DialectKind::Ansi => Arc::new(AnsiDialect),
            DialectKind::Mysql => Arc::new(MySqlDialect),
        }
    }
}

mod ansi;
mod mysql;

pub use ansi::AnsiDialect;
pub use mysql::MySqlDialect;
