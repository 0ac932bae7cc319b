use crate::schema_cache::SchemaSnapshot;
use crate::templates::TemplateCatalog;

/// Table names with their first `max_columns` columns.
pub fn render_schema(schema: &SchemaSnapshot, max_columns: usize) -> String {
    let mut out = String::from("Database Schema:\n");
    for (table, info) in schema.tables() {
        out.push_str(&format!("\nTable: {table}\n"));
        for col in info.columns.iter().take(max_columns) {
            out.push_str(&format!("  - {} ({})\n", col.name, col.data_type));
        }
    }
    out
}

/// System prompt for prompted (non fine-tuned) models: schema, binding rules
/// and few-shot examples rendered by the catalogue itself.
pub fn system_prompt(catalog: &TemplateCatalog, schema: &SchemaSnapshot, max_columns: usize) -> String {
    let mut out = String::from("You are a SQL expert for this specific database.\n\n");
    out.push_str(&render_schema(schema, max_columns));

    out.push_str("\nCRITICAL RULES:\n");
    for rule in catalog.binding().prompt_rules() {
        out.push_str(&format!("- {rule}\n"));
    }

    out.push_str("\nEXAMPLES:\n");
    for example in catalog.examples() {
        out.push_str(&format!(
            "\nQuestion: {}\nIntent: {}\nSQL: ```sql\n{}\n```\n",
            example.question, example.intent, example.sql
        ));
    }

    out.push_str("\nGenerate ONLY the SQL query in a ```sql block, without explanation.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_cache::{ColumnSchema, TableSchema};

    fn snapshot() -> SchemaSnapshot {
        let columns = (0..12)
            .map(|i| ColumnSchema {
                name: format!("col_{i}"),
                data_type: "VARCHAR".to_string(),
                nullable: true,
            })
            .collect();
        let mut snapshot = SchemaSnapshot::new();
        snapshot.insert(
            "counterparty_new",
            TableSchema {
                columns,
                ..Default::default()
            },
        );
        snapshot
    }

    #[test]
    fn schema_is_truncated_per_table() {
        let rendered = render_schema(&snapshot(), 10);
        assert!(rendered.contains("Table: counterparty_new"));
        assert!(rendered.contains("  - col_9 (VARCHAR)"));
        assert!(!rendered.contains("col_10"));
    }

    #[test]
    fn prompt_carries_rules_and_examples() {
        let prompt = system_prompt(&TemplateCatalog::default(), &snapshot(), 3);
        assert!(prompt.contains("Join tables: counterparty_new.counterparty_id = trade_new.reporting_counterparty_id"));
        assert!(prompt.contains("Question: How many trades per counterparty?"));
        assert!(prompt.contains("Intent: count_query"));
        assert!(prompt.contains("ORDER BY total_exposure ASC LIMIT 1"));
        assert!(!prompt.contains("col_3"));
    }
}
