use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::classifier::{Concept, Concepts};
use crate::sql_ast::SortDirection;

/// Default row count for top-N rankings.
pub const DEFAULT_LIMIT: u32 = 10;

/// Report shape a question resolves to; exactly one per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    RankingQuery,
    CountQuery,
    AggregationQuery,
    BreachQuery,
    DistributionQuery,
    BasicQuery,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::RankingQuery => "ranking_query",
            Intent::CountQuery => "count_query",
            Intent::AggregationQuery => "aggregation_query",
            Intent::BreachQuery => "breach_query",
            Intent::DistributionQuery => "distribution_query",
            Intent::BasicQuery => "basic_query",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SUPERLATIVES: &[Concept] = &[Concept::Highest, Concept::Lowest];

/// Combine concepts into one intent. First matching rule wins; breach and
/// count outrank ranking so that "counterparties that breached limits,
/// highest first" stays a breach report.
pub fn resolve(concepts: &Concepts, question: &str) -> Intent {
    let raw = question.to_lowercase();

    if concepts.contains(Concept::Breach) || raw.contains("limit") {
        return Intent::BreachQuery;
    }
    if concepts.contains(Concept::Count) || raw.contains("how many") {
        return Intent::CountQuery;
    }
    if concepts.contains_any(SUPERLATIVES)
        && concepts.contains_any(&[Concept::Counterparty, Concept::Sector, Concept::Rating])
    {
        return Intent::RankingQuery;
    }
    if concepts.contains(Concept::Average)
        || (concepts.contains_any(SUPERLATIVES)
            && concepts.contains_any(&[Concept::Exposure, Concept::Notional]))
    {
        return Intent::AggregationQuery;
    }
    if concepts.contains(Concept::Distribution) {
        return Intent::DistributionQuery;
    }
    Intent::BasicQuery
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Counterparty,
    Sector,
    Rating,
    Trade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Exposure,
    Notional,
    Trades,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Highest,
    Lowest,
}

/// Parameters feeding template selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerySpec {
    pub entity: Entity,
    pub metric: Metric,
    pub direction: Direction,
    pub limit: u32,
    pub order: SortDirection,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            entity: Entity::Counterparty,
            metric: Metric::Exposure,
            direction: Direction::Highest,
            limit: DEFAULT_LIMIT,
            order: SortDirection::Desc,
        }
    }
}

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex"));

impl QuerySpec {
    pub fn extract(concepts: &Concepts, question: &str) -> Self {
        let entity = if concepts.contains(Concept::Counterparty) {
            Entity::Counterparty
        } else if concepts.contains(Concept::Sector) {
            Entity::Sector
        } else if concepts.contains(Concept::Rating) {
            Entity::Rating
        } else if concepts.contains(Concept::Trade) {
            Entity::Trade
        } else {
            Entity::Counterparty
        };

        let metric = if concepts.contains(Concept::Mpe) {
            Metric::Exposure
        } else if concepts.contains(Concept::Notional) {
            Metric::Notional
        } else if concepts.contains(Concept::Exposure) {
            Metric::Exposure
        } else if concepts.contains(Concept::Trade) {
            Metric::Trades
        } else {
            Metric::Exposure
        };

        let (direction, order) = if concepts.contains(Concept::Lowest) {
            (Direction::Lowest, SortDirection::Asc)
        } else {
            (Direction::Highest, SortDirection::Desc)
        };

        Self {
            entity,
            metric,
            direction,
            limit: extract_limit(question),
            order,
        }
    }
}

/// First numeric literal in the question; zero or out-of-range values count
/// as absent.
pub fn extract_limit(question: &str) -> u32 {
    NUMBER
        .find(question)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_LIMIT)
}
