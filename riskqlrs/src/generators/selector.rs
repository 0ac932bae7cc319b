use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use super::llm::{LlmGenerator, LlmSettings, PromptMode};
use super::prompt::system_prompt;
use super::rule::RuleGenerator;
use super::SqlGenerator;
use crate::config::{ProviderConfig, RiskqlConfig};
use crate::error::RiskqlError;
use crate::llm::{ChatClient, OpenAiCompatClient, Provider};
use crate::schema_cache::SchemaSnapshot;
use crate::templates::TemplateCatalog;

/// Generator requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Rule,
    OpenAi,
    Local,
    Custom,
    Auto,
}

impl FromStr for GeneratorKind {
    type Err = RiskqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rule" => Ok(GeneratorKind::Rule),
            "openai" => Ok(GeneratorKind::OpenAi),
            "local" => Ok(GeneratorKind::Local),
            "custom" => Ok(GeneratorKind::Custom),
            "auto" => Ok(GeneratorKind::Auto),
            other => Err(RiskqlError::Validation(format!(
                "unknown generator type {other}"
            ))),
        }
    }
}

/// A provider client with the settings it should be called with.
pub struct Candidate {
    pub client: Arc<dyn ChatClient>,
    pub config: ProviderConfig,
}

/// A provider that passed its probe.
#[derive(Clone)]
struct Available {
    client: Arc<dyn ChatClient>,
    config: ProviderConfig,
    model: String,
}

pub struct Selection {
    pub generator: Box<dyn SqlGenerator>,
    /// Human-readable description of what was used, including degradations.
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub custom: bool,
    pub openai: bool,
    pub local: bool,
    pub rule: bool,
}

/// Picks a generator per request. Providers are probed once, when the
/// selector is built; a failed probe marks the provider unavailable for the
/// selector's lifetime.
pub struct GeneratorSelector {
    catalog: Arc<TemplateCatalog>,
    openai: Option<Available>,
    local: Option<Available>,
    custom_model: Option<String>,
    prompt_columns: usize,
}

impl GeneratorSelector {
    /// Build clients for every enabled provider in the config and probe them.
    pub async fn connect(config: &RiskqlConfig, catalog: Arc<TemplateCatalog>) -> Self {
        let mut candidates = Vec::new();
        for provider in [Provider::OpenAi, Provider::Local] {
            let provider_config = config.provider(provider);
            if !provider_config.enabled {
                tracing::info!(provider = %provider, "llm provider disabled");
                continue;
            }
            match OpenAiCompatClient::new(provider_config.clone()) {
                Ok(client) => candidates.push(Candidate {
                    client: Arc::new(client),
                    config: provider_config,
                }),
                Err(e) => tracing::warn!(provider = %provider, error = %e, "llm client unavailable"),
            }
        }
        Self::probe(
            catalog,
            candidates,
            config.custom_model(),
            config.generation.prompt_columns,
        )
        .await
    }

    /// Probe the given candidates and keep the ones that respond.
    pub async fn probe(
        catalog: Arc<TemplateCatalog>,
        candidates: Vec<Candidate>,
        custom_model: Option<String>,
        prompt_columns: usize,
    ) -> Self {
        let mut openai = None;
        let mut local = None;
        for candidate in candidates {
            let provider = candidate.client.provider();
            match candidate.client.probe().await {
                Ok(report) => {
                    tracing::info!(
                        provider = %provider,
                        model = %report.model,
                        models = report.models.len(),
                        "llm provider available"
                    );
                    let available = Available {
                        client: candidate.client,
                        config: candidate.config,
                        model: report.model,
                    };
                    match provider {
                        Provider::OpenAi => openai = Some(available),
                        Provider::Local => local = Some(available),
                    }
                }
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "llm provider unavailable")
                }
            }
        }
        if let (Some(model), true) = (&custom_model, openai.is_some()) {
            tracing::info!(model = %model, "fine-tuned model configured");
        }
        Self {
            catalog,
            openai,
            local,
            custom_model,
            prompt_columns,
        }
    }

    /// Selector with no LLM providers; every request is served from templates.
    pub fn rules_only(catalog: Arc<TemplateCatalog>) -> Self {
        Self {
            catalog,
            openai: None,
            local: None,
            custom_model: None,
            prompt_columns: 10,
        }
    }

    pub fn availability(&self) -> Availability {
        Availability {
            custom: self.custom().is_some(),
            openai: self.openai.is_some(),
            local: self.local.is_some(),
            rule: true,
        }
    }

    fn custom(&self) -> Option<(&Available, &str)> {
        match (&self.openai, &self.custom_model) {
            (Some(openai), Some(model)) => Some((openai, model.as_str())),
            _ => None,
        }
    }

    pub fn select(&self, requested: &str, schema: &SchemaSnapshot) -> Selection {
        let kind = match requested.parse::<GeneratorKind>() {
            Ok(kind) => kind,
            Err(_) => return self.rule("Rule-based (Default)"),
        };

        match kind {
            GeneratorKind::Rule => self.rule("Rule-based"),
            GeneratorKind::OpenAi => match &self.openai {
                Some(openai) => self.prompted(openai, schema, "Custom OpenAI GPT".to_string()),
                None => self.rule("Rule-based (OpenAI unavailable)"),
            },
            GeneratorKind::Local => match &self.local {
                Some(local) => self.prompted(local, schema, "Local LLM (Enhanced)".to_string()),
                None => self.rule("Rule-based (Local LLM unavailable)"),
            },
            GeneratorKind::Custom => match (self.custom(), &self.openai) {
                (Some((openai, model)), _) => {
                    self.fine_tuned(openai, model, format!("Custom Fine-tuned GPT ({model})"))
                }
                (None, Some(openai)) => {
                    self.prompted(openai, schema, "OpenAI GPT (Custom unavailable)".to_string())
                }
                (None, None) => self.rule("Rule-based (Custom unavailable)"),
            },
            GeneratorKind::Auto => {
                if let Some((openai, model)) = self.custom() {
                    self.fine_tuned(openai, model, "Custom Fine-tuned GPT (Auto)".to_string())
                } else if let Some(openai) = &self.openai {
                    self.prompted(openai, schema, "OpenAI GPT (Auto)".to_string())
                } else if let Some(local) = &self.local {
                    self.prompted(local, schema, "Local LLM (Auto)".to_string())
                } else {
                    self.rule("Rule-based (Auto)")
                }
            }
        }
    }

    fn rule(&self, label: &str) -> Selection {
        Selection {
            generator: Box::new(RuleGenerator::new(self.catalog.clone())),
            label: label.to_string(),
        }
    }

    fn prompted(&self, provider: &Available, schema: &SchemaSnapshot, label: String) -> Selection {
        let mode = PromptMode::Prompted {
            system_prompt: system_prompt(&self.catalog, schema, self.prompt_columns),
        };
        let settings = LlmSettings::from_provider(&provider.config, provider.model.clone());
        self.llm(provider, mode, settings, label)
    }

    fn fine_tuned(&self, provider: &Available, model: &str, label: String) -> Selection {
        let settings = LlmSettings::from_provider(&provider.config, model);
        self.llm(provider, PromptMode::FineTuned, settings, label)
    }

    fn llm(
        &self,
        provider: &Available,
        mode: PromptMode,
        settings: LlmSettings,
        label: String,
    ) -> Selection {
        Selection {
            generator: Box::new(LlmGenerator::new(
                Some(provider.client.clone()),
                self.catalog.clone(),
                mode,
                settings,
            )),
            label,
        }
    }
}
