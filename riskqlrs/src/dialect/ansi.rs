//! ANSI dialect: double-quoted identifiers. Used for DuckDB and PostgreSQL.

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiDialect;

impl Dialect for AnsiDialect {
    fn force_quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}
