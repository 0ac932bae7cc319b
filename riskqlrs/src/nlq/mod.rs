//! Question analysis: concept classification, intent resolution and
//! extraction of the parameters the template catalogue consumes.

mod classifier;
mod intent;

pub use classifier::{classify, tokenize, Concept, Concepts};
pub use intent::{
    extract_limit, resolve, Direction, Entity, Intent, Metric, QuerySpec, DEFAULT_LIMIT,
};

use serde::Serialize;

/// Everything derived from one question before SQL is rendered.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub concepts: Concepts,
    pub intent: Intent,
    pub spec: QuerySpec,
}

pub fn analyze(question: &str) -> Analysis {
    let concepts = classify(question);
    let intent = resolve(&concepts, question);
    let spec = QuerySpec::extract(&concepts, question);
    tracing::debug!(
        intent = %intent,
        concepts = concepts.len(),
        limit = spec.limit,
        "analyzed question"
    );
    Analysis {
        concepts,
        intent,
        spec,
    }
}
