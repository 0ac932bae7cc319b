use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use super::{ChatClient, ChatRequest, ProbeReport, Provider};
use crate::config::ProviderConfig;
use crate::error::{Result, RiskqlError};

/// Placeholder bearer token accepted by local OpenAI-compatible servers.
const LOCAL_API_KEY: &str = "ollama";
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Ollama's native `/api/tags` listing.
#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Client for any server speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    config: ProviderConfig,
    api_key: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RiskqlError::Llm(format!("build http client: {e}")))?;
        let api_key = match config.provider {
            Provider::OpenAi => config.api_key(),
            Provider::Local => config.api_key().or_else(|| Some(LOCAL_API_KEY.to_string())),
        };
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        join_url(&self.config.base_url, path)
    }

    async fn complete_once(&self, request: &ChatRequest) -> Result<String> {
        let mut builder = self.http.post(self.endpoint("chat/completions")).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RiskqlError::Llm(format!("API error ({status}): {text}")));
        }

        let body: CompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| RiskqlError::Llm("response has no message content".to_string()))
    }

    async fn probe_openai(&self) -> Result<ProbeReport> {
        let key = self.api_key.as_ref().ok_or_else(|| {
            RiskqlError::Llm(format!(
                "{} is not set",
                self.config.api_key_env.as_deref().unwrap_or("API key")
            ))
        })?;
        let response = self
            .http
            .get(self.endpoint("models"))
            .bearer_auth(key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RiskqlError::Llm(format!(
                "model listing failed ({})",
                response.status()
            )));
        }
        let listing: ModelList = response.json().await?;
        Ok(ProbeReport {
            model: self.config.model.clone(),
            models: listing.data.into_iter().map(|m| m.id).collect(),
        })
    }

    async fn probe_local(&self) -> Result<ProbeReport> {
        let base = self
            .config
            .probe_url
            .clone()
            .unwrap_or_else(|| self.config.base_url.trim_end_matches("/v1").to_string());
        let response = self
            .http
            .get(join_url(&base, "api/tags"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RiskqlError::Llm(format!(
                "local server not ready ({})",
                response.status()
            )));
        }
        let tags: TagList = response.json().await?;
        if tags.models.is_empty() {
            return Err(RiskqlError::Llm("local server has no models installed".to_string()));
        }
        let models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        let model = pick_model(
            &models,
            self.config.preferred_model.as_deref(),
            &self.config.model,
        );
        Ok(ProbeReport { model, models })
    }
}

#[async_trait]
impl ChatClient for OpenAiCompatClient {
    fn provider(&self) -> Provider {
        self.config.provider
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let attempts = self.config.retries + 1;
        let mut last_err = None;
        for attempt in 1..=attempts {
            let start = Instant::now();
            match self.complete_once(request).await {
                Ok(content) => {
                    tracing::debug!(
                        provider = %self.config.provider,
                        model = %request.model,
                        attempt,
                        ms = start.elapsed().as_millis(),
                        "chat completion"
                    );
                    return Ok(content);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %self.config.provider,
                        attempt,
                        attempts,
                        error = %e,
                        "chat completion failed"
                    );
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| RiskqlError::Llm("no attempts made".to_string())))
    }

    async fn probe(&self) -> Result<ProbeReport> {
        match self.config.provider {
            Provider::OpenAi => self.probe_openai().await,
            Provider::Local => self.probe_local().await,
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Prefer the fine-tuned model when the server has it installed. Ollama names
/// carry a tag suffix (`llama2-sql:latest`), which is ignored for matching.
fn pick_model(installed: &[String], preferred: Option<&str>, fallback: &str) -> String {
    let installed_as = |wanted: &str| {
        installed
            .iter()
            .any(|name| name == wanted || name.split(':').next() == Some(wanted))
    };
    match preferred {
        Some(wanted) if installed_as(wanted) => wanted.to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_urls_without_double_slashes() {
        assert_eq!(
            join_url("http://localhost:11434/v1/", "/chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(join_url("http://h", "api/tags"), "http://h/api/tags");
    }

    #[test]
    fn prefers_installed_fine_tuned_model() {
        let installed = vec!["llama2:latest".to_string(), "llama2-sql:latest".to_string()];
        assert_eq!(pick_model(&installed, Some("llama2-sql"), "llama2"), "llama2-sql");
    }

    #[test]
    fn falls_back_to_base_model() {
        let installed = vec!["llama2:latest".to_string()];
        assert_eq!(pick_model(&installed, Some("llama2-sql"), "llama2"), "llama2");
        assert_eq!(pick_model(&installed, None, "llama2"), "llama2");
    }

    #[tokio::test]
    async fn openai_probe_requires_key() {
        let mut config = ProviderConfig::defaults(Provider::OpenAi);
        config.api_key_env = Some("RISKQL_TEST_UNSET_KEY".to_string());
        let client = OpenAiCompatClient::new(config).unwrap();
        let err = client.probe().await.unwrap_err();
        assert!(err.to_string().contains("RISKQL_TEST_UNSET_KEY"));
    }
}
