use thiserror::Error;

pub type Result<T> = std::result::Result<T, RiskqlError>;

#[derive(Debug, Error)]
pub enum RiskqlError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("execution error: {0}")]
    Execution(String),
    #[error("llm error: {0}")]
    Llm(String),
    #[error("timed out after {0} ms")]
    Timeout(u64),
    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for RiskqlError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RiskqlError::Llm(format!("request timed out: {err}"))
        } else {
            RiskqlError::Llm(err.to_string())
        }
    }
}
