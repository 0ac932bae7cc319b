//! Fine-tuning dataset export: template SQL for a fixed question list, in a
//! plain JSON form and in chat-completion JSONL.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::generators::render_schema;
use crate::llm::ChatMessage;
use crate::schema_cache::SchemaSnapshot;
use crate::templates::TemplateCatalog;

pub const TRAINING_DATA_FILE: &str = "training_data.json";
pub const CHAT_TRAINING_FILE: &str = "openai_training.jsonl";
pub const SCHEMA_INFO_FILE: &str = "schema_info.json";

/// Question paraphrases grouped by the report they should produce.
pub const TRAINING_QUESTIONS: &[(&str, &str)] = &[
    ("Which are the top 5 counterparties by MPE value?", "top_counterparty_mpe"),
    ("Which are the top 10 counterparties by MPE value?", "top_counterparty_mpe"),
    ("Show me top counterparties by MPE", "top_counterparty_mpe"),
    ("Which rating bucket has the highest total notional exposure?", "rating_notional"),
    ("What rating has the most notional exposure?", "rating_notional"),
    ("Which rating group has highest notional?", "rating_notional"),
    ("Which counterparties have the highest total notional exposure?", "counterparty_highest_notional"),
    ("Which counterparties have the lowest total notional exposure?", "counterparty_lowest_notional"),
    ("Show counterparties with highest notional", "counterparty_highest_notional"),
    ("Show counterparties with lowest notional", "counterparty_lowest_notional"),
    ("How many trades exist per counterparty?", "trade_count"),
    ("Trade count by counterparty", "trade_count"),
    ("Number of trades per counterparty", "trade_count"),
    ("Count trades for each counterparty", "trade_count"),
    ("What is the highest single trade notional?", "highest_trade"),
    ("Largest trade by notional value", "highest_trade"),
    ("Show the biggest trade", "highest_trade"),
    ("Which counterparties have breached their MPE limits?", "limit_breach"),
    ("Show limit breaches", "limit_breach"),
    ("Counterparties exceeding limits", "limit_breach"),
    ("Who has breached limits?", "limit_breach"),
    ("What is the distribution of counterparties by rating?", "rating_distribution"),
    ("Rating distribution", "rating_distribution"),
    ("Show counterparties by rating", "rating_distribution"),
    ("What is the average trade notional exposure by sector?", "sector_average"),
    ("Average notional by sector", "sector_average"),
    ("Sector average exposure", "sector_average"),
    ("Which sector has the lowest exposure?", "sector_lowest"),
    ("Which sector has the minimum exposure?", "sector_lowest"),
    ("Sector with smallest exposure", "sector_lowest"),
    ("Which sector has least exposure?", "sector_lowest"),
    ("Sector with minimum exposure", "sector_lowest"),
    ("Which sector has the largest concentration exposure?", "sector_highest"),
    ("Sector with highest exposure", "sector_highest"),
    ("Which sector has most exposure?", "sector_highest"),
    ("Largest sector exposure", "sector_highest"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingExample {
    pub question: String,
    pub sql: String,
    pub pattern_type: String,
}

/// One line of the chat-format file.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRecord {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub examples: usize,
    pub files: Vec<PathBuf>,
}

/// Render every built-in question through the template catalogue.
pub fn generate_examples(catalog: &TemplateCatalog) -> Vec<TrainingExample> {
    TRAINING_QUESTIONS
        .iter()
        .map(|(question, pattern)| TrainingExample {
            question: question.to_string(),
            sql: catalog.sql_for(question),
            pattern_type: pattern.to_string(),
        })
        .collect()
}

pub fn chat_system_prompt(schema: &SchemaSnapshot, max_columns: usize) -> String {
    format!(
        "You are a SQL expert. Generate accurate SQL queries based on this database schema:\n\n{}",
        render_schema(schema, max_columns)
    )
}

pub fn chat_records(examples: &[TrainingExample], system_prompt: &str) -> Vec<ChatRecord> {
    examples
        .iter()
        .map(|example| ChatRecord {
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(example.question.clone()),
                ChatMessage::assistant(example.sql.clone()),
            ],
        })
        .collect()
}

/// Write the dataset, the chat-format dataset and the schema into `dir`,
/// creating it when missing.
pub fn export(
    dir: &Path,
    catalog: &TemplateCatalog,
    schema: &SchemaSnapshot,
    max_columns: usize,
) -> Result<ExportSummary> {
    fs::create_dir_all(dir)?;
    let examples = generate_examples(catalog);

    let data_path = dir.join(TRAINING_DATA_FILE);
    fs::write(&data_path, serde_json::to_string_pretty(&examples)?)?;

    let chat_path = dir.join(CHAT_TRAINING_FILE);
    let prompt = chat_system_prompt(schema, max_columns);
    let mut chat = fs::File::create(&chat_path)?;
    for record in chat_records(&examples, &prompt) {
        writeln!(chat, "{}", serde_json::to_string(&record)?)?;
    }

    let schema_path = dir.join(SCHEMA_INFO_FILE);
    fs::write(&schema_path, serde_json::to_string_pretty(schema)?)?;

    tracing::info!(
        examples = examples.len(),
        dir = %dir.display(),
        "exported training data"
    );
    Ok(ExportSummary {
        examples: examples.len(),
        files: vec![data_path, chat_path, schema_path],
    })
}
