//! Generator selection and LLM fallback with stub chat clients.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use riskql::config::ProviderConfig;
use riskql::error::{Result, RiskqlError};
use riskql::generators::{
    Candidate, FallbackReason, GeneratorSelector, LlmGenerator, LlmSettings, PromptMode,
    SqlGenerator, SqlSource,
};
use riskql::llm::{ChatClient, ChatRequest, ProbeReport, Provider};
use riskql::schema_cache::{ColumnSchema, SchemaSnapshot, TableSchema};
use riskql::TemplateCatalog;

enum Reply {
    Text(&'static str),
    Fail,
    Hang,
}

struct StubClient {
    provider: Provider,
    reachable: bool,
    reply: Reply,
    seen: Mutex<Vec<ChatRequest>>,
}

impl StubClient {
    fn new(provider: Provider, reachable: bool, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            provider,
            reachable,
            reply,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn last_request(&self) -> ChatRequest {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ChatClient for StubClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.seen.lock().unwrap().push(request.clone());
        match self.reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Fail => Err(RiskqlError::Llm("connection refused".to_string())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(String::new())
            }
        }
    }

    async fn probe(&self) -> Result<ProbeReport> {
        if self.reachable {
            Ok(ProbeReport {
                model: format!("{}-model", self.provider),
                models: Vec::new(),
            })
        } else {
            Err(RiskqlError::Llm("unreachable".to_string()))
        }
    }
}

fn candidate(client: Arc<StubClient>) -> Candidate {
    let provider = client.provider;
    Candidate {
        client,
        config: ProviderConfig::defaults(provider),
    }
}

fn snapshot() -> SchemaSnapshot {
    let mut snapshot = SchemaSnapshot::new();
    snapshot.insert(
        "counterparty_new",
        TableSchema {
            columns: vec![ColumnSchema {
                name: "counterparty_sector".to_string(),
                data_type: "VARCHAR".to_string(),
                nullable: true,
            }],
            ..TableSchema::default()
        },
    );
    snapshot
}

fn catalog() -> Arc<TemplateCatalog> {
    Arc::new(TemplateCatalog::default())
}

fn label(selector: &GeneratorSelector, requested: &str) -> String {
    selector.select(requested, &snapshot()).label
}

const QUESTION: &str = "Which sector has the minimum exposure?";
const LLM_SQL: &str = "SELECT counterparty_sector FROM counterparty_new";

#[tokio::test]
async fn rules_only_labels() {
    let selector = GeneratorSelector::rules_only(catalog());
    assert_eq!(label(&selector, "rule"), "Rule-based");
    assert_eq!(label(&selector, "openai"), "Rule-based (OpenAI unavailable)");
    assert_eq!(label(&selector, "local"), "Rule-based (Local LLM unavailable)");
    assert_eq!(label(&selector, "custom"), "Rule-based (Custom unavailable)");
    assert_eq!(label(&selector, "auto"), "Rule-based (Auto)");
    assert_eq!(label(&selector, "nonsense"), "Rule-based (Default)");
}

#[tokio::test]
async fn openai_with_custom_model_labels() {
    let openai = StubClient::new(Provider::OpenAi, true, Reply::Text(LLM_SQL));
    let selector = GeneratorSelector::probe(
        catalog(),
        vec![candidate(openai)],
        Some("ft:gpt-3.5-turbo:risk".to_string()),
        10,
    )
    .await;

    let availability = selector.availability();
    assert!(availability.custom && availability.openai && availability.rule);
    assert!(!availability.local);

    assert_eq!(label(&selector, "auto"), "Custom Fine-tuned GPT (Auto)");
    assert_eq!(
        label(&selector, "custom"),
        "Custom Fine-tuned GPT (ft:gpt-3.5-turbo:risk)"
    );
    assert_eq!(label(&selector, "openai"), "Custom OpenAI GPT");
    assert_eq!(label(&selector, "local"), "Rule-based (Local LLM unavailable)");
}

#[tokio::test]
async fn openai_without_custom_model_labels() {
    let openai = StubClient::new(Provider::OpenAi, true, Reply::Text(LLM_SQL));
    let local = StubClient::new(Provider::Local, true, Reply::Text(LLM_SQL));
    let selector =
        GeneratorSelector::probe(catalog(), vec![candidate(openai), candidate(local)], None, 10)
            .await;

    assert_eq!(label(&selector, "custom"), "OpenAI GPT (Custom unavailable)");
    assert_eq!(label(&selector, "auto"), "OpenAI GPT (Auto)");
    assert_eq!(label(&selector, "local"), "Local LLM (Enhanced)");
}

#[tokio::test]
async fn failed_probe_marks_provider_unavailable() {
    let openai = StubClient::new(Provider::OpenAi, false, Reply::Text(LLM_SQL));
    let local = StubClient::new(Provider::Local, true, Reply::Text(LLM_SQL));
    let selector = GeneratorSelector::probe(
        catalog(),
        vec![candidate(openai), candidate(local)],
        Some("ft:model".to_string()),
        10,
    )
    .await;

    assert!(!selector.availability().openai);
    assert!(!selector.availability().custom);
    assert_eq!(label(&selector, "auto"), "Local LLM (Auto)");
    assert_eq!(label(&selector, "custom"), "Rule-based (Custom unavailable)");
}

#[tokio::test]
async fn prompted_generator_sends_schema_and_uses_reply() {
    let local = StubClient::new(
        Provider::Local,
        true,
        Reply::Text("Sure:\n```sql\nSELECT counterparty_sector FROM counterparty_new\n```"),
    );
    let selector = GeneratorSelector::probe(catalog(), vec![candidate(local.clone())], None, 10).await;

    let generated = selector
        .select("local", &snapshot())
        .generator
        .generate(QUESTION)
        .await;
    assert_eq!(generated.sql, LLM_SQL);
    assert_eq!(
        generated.source,
        SqlSource::Llm {
            model: "local-model".to_string()
        }
    );

    let request = local.last_request();
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.messages[0].role, "system");
    assert!(request.messages[0].content.contains("Table: counterparty_new"));
    assert_eq!(request.messages[1].content, QUESTION);
}

#[tokio::test]
async fn fine_tuned_generator_sends_bare_question() {
    let openai = StubClient::new(Provider::OpenAi, true, Reply::Text(LLM_SQL));
    let selector = GeneratorSelector::probe(
        catalog(),
        vec![candidate(openai.clone())],
        Some("ft:model".to_string()),
        10,
    )
    .await;

    let generated = selector
        .select("custom", &snapshot())
        .generator
        .generate(QUESTION)
        .await;
    assert_eq!(generated.sql, LLM_SQL);

    let request = openai.last_request();
    assert_eq!(request.model, "ft:model");
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].role, "user");
}

fn llm_generator(client: Arc<StubClient>, timeout: Duration) -> LlmGenerator {
    let mut settings =
        LlmSettings::from_provider(&ProviderConfig::defaults(Provider::OpenAi), "gpt-test");
    settings.timeout = timeout;
    let client: Arc<dyn ChatClient> = client;
    LlmGenerator::new(Some(client), catalog(), PromptMode::FineTuned, settings)
}

#[tokio::test]
async fn failing_client_yields_template_sql() {
    let client = StubClient::new(Provider::OpenAi, true, Reply::Fail);
    let generated = llm_generator(client, Duration::from_secs(5))
        .generate(QUESTION)
        .await;

    assert_eq!(generated.sql, catalog().sql_for(QUESTION));
    assert!(matches!(
        generated.source,
        SqlSource::Fallback {
            reason: FallbackReason::ClientError(_)
        }
    ));
}

#[tokio::test]
async fn prose_reply_yields_template_sql() {
    let client = StubClient::new(
        Provider::OpenAi,
        true,
        Reply::Text("The answer is sector C with the lowest aggregate exposure."),
    );
    let generated = llm_generator(client, Duration::from_secs(5))
        .generate(QUESTION)
        .await;

    assert_eq!(generated.sql, catalog().sql_for(QUESTION));
    assert!(matches!(
        generated.source,
        SqlSource::Fallback {
            reason: FallbackReason::InvalidSql(_)
        }
    ));
}

#[tokio::test]
async fn slow_client_times_out_to_template_sql() {
    let client = StubClient::new(Provider::OpenAi, true, Reply::Hang);
    let generated = llm_generator(client, Duration::from_millis(20))
        .generate(QUESTION)
        .await;

    assert_eq!(generated.sql, catalog().sql_for(QUESTION));
    assert_eq!(
        generated.source,
        SqlSource::Fallback {
            reason: FallbackReason::Timeout
        }
    );
}

#[tokio::test]
async fn missing_client_yields_template_sql() {
    let generator = LlmGenerator::new(
        None,
        catalog(),
        PromptMode::FineTuned,
        LlmSettings::from_provider(&ProviderConfig::defaults(Provider::OpenAi), "gpt-test"),
    );
    let generated = generator.generate(QUESTION).await;
    assert!(generated.is_fallback());
    assert_eq!(generated.sql, catalog().sql_for(QUESTION));
}
