use crate::error::{Result, RiskqlError};
use crate::schema_cache::SchemaSnapshot;
use crate::templates::SchemaBinding;

/// Checks that every table and column the binding names exists in the live
/// schema, so template SQL cannot reference identifiers the database lacks.
pub struct Validator {
    warn_only: bool,
}

impl Validator {
    pub fn new(warn_only: bool) -> Self {
        Self { warn_only }
    }

    /// Returns the list of problems found. In warn-only mode problems are
    /// logged and returned; otherwise the first one is an error.
    pub fn validate_binding(
        &self,
        binding: &SchemaBinding,
        snapshot: &SchemaSnapshot,
    ) -> Result<Vec<String>> {
        let mut problems = Vec::new();

        self.check_table(
            snapshot,
            &binding.counterparty_table,
            &binding.counterparty_columns(),
            &mut problems,
        )?;
        self.check_table(
            snapshot,
            &binding.trade_table,
            &binding.trade_columns(),
            &mut problems,
        )?;
        self.check_table(
            snapshot,
            &binding.concentration_table,
            &binding.concentration_columns(),
            &mut problems,
        )?;

        self.check(
            binding.counterparty_alias != binding.trade_alias,
            format!(
                "counterparty and trade tables share alias {}",
                binding.trade_alias
            ),
            &mut problems,
        )?;

        Ok(problems)
    }

    fn check_table(
        &self,
        snapshot: &SchemaSnapshot,
        table: &str,
        columns: &[&str],
        problems: &mut Vec<String>,
    ) -> Result<()> {
        let Some(schema) = snapshot.table(table) else {
            return self.check(false, format!("bound table {table} not found"), problems);
        };
        for col in columns {
            self.check(
                schema.has_column(col),
                format!("bound column {col} missing on table {table}"),
                problems,
            )?;
        }
        Ok(())
    }

    fn check(&self, condition: bool, message: String, problems: &mut Vec<String>) -> Result<()> {
        if condition {
            return Ok(());
        }
        if self.warn_only {
            tracing::warn!(problem = %message, "schema binding mismatch");
            problems.push(message);
            Ok(())
        } else {
            Err(RiskqlError::Validation(message))
        }
    }
}
