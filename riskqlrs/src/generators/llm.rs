use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::extract::{extract_sql, validate_sql};
use super::{Drafted, FallbackReason, GeneratedSql, SqlGenerator, SqlSource};
use crate::config::ProviderConfig;
use crate::llm::{ChatClient, ChatMessage, ChatRequest};
use crate::templates::TemplateCatalog;

/// How the question is presented to the model.
#[derive(Debug, Clone)]
pub enum PromptMode {
    /// System prompt with schema, rules and examples, then the question.
    Prompted { system_prompt: String },
    /// A fine-tuned model that already knows the schema: the bare question.
    FineTuned,
}

/// Per-call model settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Overall budget for the call, retries included.
    pub timeout: Duration,
}

impl LlmSettings {
    pub fn from_provider(config: &ProviderConfig, model: impl Into<String>) -> Self {
        let attempts = u64::from(config.retries) + 1;
        Self {
            model: model.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_millis(config.timeout_ms.saturating_mul(attempts)),
        }
    }
}

pub struct LlmGenerator {
    client: Option<Arc<dyn ChatClient>>,
    catalog: Arc<TemplateCatalog>,
    mode: PromptMode,
    settings: LlmSettings,
}

impl LlmGenerator {
    pub fn new(
        client: Option<Arc<dyn ChatClient>>,
        catalog: Arc<TemplateCatalog>,
        mode: PromptMode,
        settings: LlmSettings,
    ) -> Self {
        Self {
            client,
            catalog,
            mode,
            settings,
        }
    }

    fn request(&self, question: &str) -> ChatRequest {
        let messages = match &self.mode {
            PromptMode::Prompted { system_prompt } => vec![
                ChatMessage::system(system_prompt.clone()),
                ChatMessage::user(question),
            ],
            PromptMode::FineTuned => vec![ChatMessage::user(question)],
        };
        ChatRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }

    /// Ask the model for SQL without applying the template fallback.
    pub async fn draft(&self, question: &str) -> Drafted {
        let Some(client) = &self.client else {
            return Drafted::Fallback(FallbackReason::NoClient);
        };
        let request = self.request(question);
        let reply = match tokio::time::timeout(self.settings.timeout, client.complete(&request)).await
        {
            Err(_) => return Drafted::Fallback(FallbackReason::Timeout),
            Ok(Err(e)) => return Drafted::Fallback(FallbackReason::ClientError(e.to_string())),
            Ok(Ok(reply)) => reply,
        };

        let sql = extract_sql(&reply);
        if validate_sql(&sql) {
            Drafted::Sql(sql)
        } else {
            Drafted::Fallback(FallbackReason::InvalidSql(sql))
        }
    }
}

#[async_trait]
impl SqlGenerator for LlmGenerator {
    async fn generate(&self, question: &str) -> GeneratedSql {
        match self.draft(question).await {
            Drafted::Sql(sql) => {
                tracing::debug!(model = %self.settings.model, sql = %sql, "llm sql");
                GeneratedSql {
                    sql,
                    source: SqlSource::Llm {
                        model: self.settings.model.clone(),
                    },
                }
            }
            Drafted::Fallback(reason) => {
                tracing::warn!(
                    model = %self.settings.model,
                    reason = %reason,
                    "falling back to template sql"
                );
                GeneratedSql {
                    sql: self.catalog.sql_for(question),
                    source: SqlSource::Fallback { reason },
                }
            }
        }
    }
}
