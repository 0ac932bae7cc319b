use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Table and column identifiers the template catalogue renders against.
///
/// Defaults describe the reference risk schema. Deployments whose tables are
/// named differently override individual fields under `[binding]` in the
/// config file or in a standalone YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaBinding {
    pub counterparty_table: String,
    pub trade_table: String,
    pub concentration_table: String,

    pub counterparty_id: String,
    pub counterparty_name: String,
    pub sector: String,
    pub rating: String,
    pub mpe: String,
    pub mpe_limit: String,

    /// Surrogate key of the trade table, counted by the trade-count report.
    pub trade_pk: String,
    pub trade_id: String,
    /// Trade column referencing `counterparty_id`.
    pub trade_counterparty: String,
    pub notional: String,
    pub currency: String,

    pub concentration_group: String,
    pub concentration_value: String,

    pub counterparty_alias: String,
    pub trade_alias: String,

    /// Target type for numeric-as-text columns.
    pub numeric_type: String,
}

impl Default for SchemaBinding {
    fn default() -> Self {
        Self {
            counterparty_table: "counterparty_new".to_string(),
            trade_table: "trade_new".to_string(),
            concentration_table: "concentration_new".to_string(),
            counterparty_id: "counterparty_id".to_string(),
            counterparty_name: "counterparty_name".to_string(),
            sector: "counterparty_sector".to_string(),
            rating: "internal_rating".to_string(),
            mpe: "mpe".to_string(),
            mpe_limit: "mpe_limit".to_string(),
            trade_pk: "id".to_string(),
            trade_id: "trade_id".to_string(),
            trade_counterparty: "reporting_counterparty_id".to_string(),
            notional: "notional_usd".to_string(),
            currency: "currency".to_string(),
            concentration_group: "concentration_group".to_string(),
            concentration_value: "concentration_value".to_string(),
            counterparty_alias: "cp".to_string(),
            trade_alias: "t".to_string(),
            numeric_type: "DECIMAL(15,2)".to_string(),
        }
    }
}

impl SchemaBinding {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Columns the templates read from the counterparty table.
    pub fn counterparty_columns(&self) -> [&str; 6] {
        [
            &self.counterparty_id,
            &self.counterparty_name,
            &self.sector,
            &self.rating,
            &self.mpe,
            &self.mpe_limit,
        ]
    }

    /// Columns the templates read from the trade table.
    pub fn trade_columns(&self) -> [&str; 5] {
        [
            &self.trade_pk,
            &self.trade_id,
            &self.trade_counterparty,
            &self.notional,
            &self.currency,
        ]
    }

    /// Columns the templates read from the concentration table.
    pub fn concentration_columns(&self) -> [&str; 2] {
        [&self.concentration_group, &self.concentration_value]
    }

    /// Schema rules included in LLM prompts, phrased in terms of the bound names.
    pub fn prompt_rules(&self) -> Vec<String> {
        let cp = &self.counterparty_table;
        let tr = &self.trade_table;
        vec![
            format!("For sector queries: use {} from the {cp} table", self.sector),
            format!("For exposure queries: use the {} column from the {cp} table", self.mpe),
            format!("For notional queries: use {} from the {tr} table", self.notional),
            format!(
                "Join tables: {cp}.{} = {tr}.{}",
                self.counterparty_id, self.trade_counterparty
            ),
            format!(
                "Always use table aliases: {} for {cp}, {} for {tr}",
                self.counterparty_alias, self.trade_alias
            ),
            format!(
                "Use CAST(column AS {}) for numeric calculations",
                self.numeric_type
            ),
            "For minimum/lowest: ORDER BY column ASC LIMIT 1".to_string(),
            "For maximum/highest: ORDER BY column DESC LIMIT 1".to_string(),
        ]
    }
}
