//! Fixed catalogue of report templates, built as SQL AST and rendered through
//! the configured dialect.
//!
//! Every identifier comes from the [`SchemaBinding`]; the only per-question
//! variables are sort order and row limit. Rendering is pure: the same
//! question always yields byte-identical SQL.

mod binding;

pub use binding::SchemaBinding;

use std::sync::Arc;

use crate::dialect::{Dialect, DialectKind};
use crate::nlq::{self, Analysis, Concept, Entity, Intent, Metric, QuerySpec};
use crate::sql_ast::{
    Aggregation, Join, OrderItem, SelectItem, SelectQuery, SortDirection, SqlBinaryOperator,
    SqlExpr, SqlJoinType, SqlRenderer, TableRef,
};

/// Row cap of the fallback `SELECT *` report.
pub const BASIC_LIMIT: u64 = 20;
/// Row cap of the counterparty notional ranking, independent of the question.
pub const NOTIONAL_RANKING_LIMIT: u64 = 20;

/// A rendered few-shot example: question, intent label and template SQL.
#[derive(Debug, Clone)]
pub struct Example {
    pub question: &'static str,
    pub intent: Intent,
    pub sql: String,
}

const EXAMPLE_QUESTIONS: &[&str] = &[
    "Which sector has the minimum exposure?",
    "Which counterparties have the highest notional?",
    "How many trades per counterparty?",
];

#[derive(Clone)]
pub struct TemplateCatalog {
    binding: SchemaBinding,
    dialect: Arc<dyn Dialect + Send + Sync>,
}

impl std::fmt::Debug for TemplateCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCatalog")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::new(SchemaBinding::default(), DialectKind::default())
    }
}

impl TemplateCatalog {
    pub fn new(binding: SchemaBinding, dialect: DialectKind) -> Self {
        Self {
            binding,
            dialect: dialect.dialect(),
        }
    }

    pub fn binding(&self) -> &SchemaBinding {
        &self.binding
    }

    /// Analyze a question and render its template.
    pub fn sql_for(&self, question: &str) -> String {
        let analysis = nlq::analyze(question);
        self.build(&analysis, question)
    }

    /// Render the template for an analyzed question. Total: unmatched
    /// combinations fall back to the basic report.
    pub fn build(&self, analysis: &Analysis, question: &str) -> String {
        let query = self.plan(analysis, question);
        SqlRenderer::new(self.dialect.as_ref()).render_select(&query)
    }

    /// The three few-shot examples used in LLM prompts.
    pub fn examples(&self) -> Vec<Example> {
        EXAMPLE_QUESTIONS
            .iter()
            .map(|question| {
                let analysis = nlq::analyze(question);
                Example {
                    question,
                    intent: analysis.intent,
                    sql: self.build(&analysis, question),
                }
            })
            .collect()
    }

    fn plan(&self, analysis: &Analysis, question: &str) -> SelectQuery {
        let spec = &analysis.spec;
        match analysis.intent {
            Intent::RankingQuery => self.ranking(spec, question),
            Intent::CountQuery => self.trade_count(SortDirection::Desc, None),
            Intent::AggregationQuery
                if analysis.concepts.contains(Concept::Average)
                    && analysis.concepts.contains(Concept::Sector) =>
            {
                self.average_notional_by_sector()
            }
            Intent::AggregationQuery | Intent::BasicQuery => {
                self.extreme_or_basic(analysis, question)
            }
            Intent::BreachQuery => self.breaches(),
            Intent::DistributionQuery => self.rating_distribution(),
        }
    }

    /// Superlative questions with no counterparty, sector or rating entity
    /// still name a single extreme row: one concentration group or one trade.
    fn extreme_or_basic(&self, analysis: &Analysis, question: &str) -> SelectQuery {
        let spec = &analysis.spec;
        if !analysis.concepts.contains_any(&[Concept::Highest, Concept::Lowest]) {
            return self.basic(question);
        }
        if question.to_lowercase().contains("concentration") {
            self.exposure_by_concentration_group(spec.order)
        } else if spec.entity == Entity::Trade {
            self.single_trade(spec.order)
        } else {
            self.basic(question)
        }
    }

    fn ranking(&self, spec: &QuerySpec, question: &str) -> SelectQuery {
        let limit = u64::from(spec.limit);
        match (spec.entity, spec.metric) {
            (Entity::Counterparty, Metric::Notional) => self.notional_by_counterparty(spec.order),
            (Entity::Counterparty, Metric::Exposure) => self.counterparties_by_mpe(spec.order, limit),
            (Entity::Counterparty, Metric::Trades) => self.trade_count(spec.order, Some(limit)),
            (Entity::Sector, Metric::Exposure) => self.exposure_by_sector(spec.order),
            (Entity::Rating, Metric::Notional) => self.notional_by_rating(spec.order),
            _ => self.basic(question),
        }
    }

    fn num(&self, expr: SqlExpr) -> SqlExpr {
        expr.cast(&self.binding.numeric_type)
    }

    fn cp(&self, column: &str) -> SqlExpr {
        SqlExpr::qualified(&self.binding.counterparty_alias, column)
    }

    fn tr(&self, column: &str) -> SqlExpr {
        SqlExpr::qualified(&self.binding.trade_alias, column)
    }

    fn counterparty_ref(&self, aliased: bool) -> TableRef {
        let alias = aliased.then_some(self.binding.counterparty_alias.as_str());
        TableRef::new(&self.binding.counterparty_table, alias)
    }

    fn trade_ref(&self) -> TableRef {
        TableRef::new(&self.binding.trade_table, Some(&self.binding.trade_alias))
    }

    fn trade_join(&self, join_type: SqlJoinType) -> Join {
        let b = &self.binding;
        Join {
            join_type,
            table: self.trade_ref(),
            on: vec![self
                .cp(&b.counterparty_id)
                .binary(SqlBinaryOperator::Eq, self.tr(&b.trade_counterparty))],
        }
    }

    fn counterparties_by_mpe(&self, order: SortDirection, limit: u64) -> SelectQuery {
        let b = &self.binding;
        let mpe = self.num(SqlExpr::column(&b.mpe));
        SelectQuery {
            select: vec![
                SelectItem::bare(SqlExpr::column(&b.counterparty_name)),
                SelectItem::bare(SqlExpr::column(&b.counterparty_id)),
                SelectItem::aliased(mpe.clone(), "mpe_value"),
            ],
            from: self.counterparty_ref(false),
            order_by: vec![OrderItem {
                expr: mpe,
                direction: order,
            }],
            limit: Some(limit),
            ..Default::default()
        }
    }

    fn notional_by_counterparty(&self, order: SortDirection) -> SelectQuery {
        let b = &self.binding;
        SelectQuery {
            select: vec![
                SelectItem::bare(self.cp(&b.counterparty_name)),
                SelectItem::aliased(
                    self.num(self.tr(&b.notional)).aggregate(Aggregation::Sum),
                    "total_notional",
                ),
            ],
            from: self.counterparty_ref(true),
            joins: vec![self.trade_join(SqlJoinType::Inner)],
            group_by: vec![self.cp(&b.counterparty_id), self.cp(&b.counterparty_name)],
            order_by: vec![OrderItem {
                expr: SqlExpr::column("total_notional"),
                direction: order,
            }],
            limit: Some(NOTIONAL_RANKING_LIMIT),
            ..Default::default()
        }
    }

    fn trade_count(&self, order: SortDirection, limit: Option<u64>) -> SelectQuery {
        let b = &self.binding;
        SelectQuery {
            select: vec![
                SelectItem::bare(self.cp(&b.counterparty_name)),
                SelectItem::aliased(
                    self.tr(&b.trade_pk).aggregate(Aggregation::Count),
                    "trade_count",
                ),
            ],
            from: self.counterparty_ref(true),
            joins: vec![self.trade_join(SqlJoinType::Left)],
            group_by: vec![self.cp(&b.counterparty_id), self.cp(&b.counterparty_name)],
            order_by: vec![OrderItem {
                expr: SqlExpr::column("trade_count"),
                direction: order,
            }],
            limit,
            ..Default::default()
        }
    }

    fn exposure_by_sector(&self, order: SortDirection) -> SelectQuery {
        let b = &self.binding;
        SelectQuery {
            select: vec![
                SelectItem::bare(SqlExpr::column(&b.sector)),
                SelectItem::aliased(
                    self.num(SqlExpr::column(&b.mpe)).aggregate(Aggregation::Sum),
                    "total_exposure",
                ),
            ],
            from: self.counterparty_ref(false),
            filters: vec![SqlExpr::column(&b.sector).is_not_null()],
            group_by: vec![SqlExpr::column(&b.sector)],
            order_by: vec![OrderItem {
                expr: SqlExpr::column("total_exposure"),
                direction: order,
            }],
            limit: Some(1),
            ..Default::default()
        }
    }

    fn notional_by_rating(&self, order: SortDirection) -> SelectQuery {
        let b = &self.binding;
        SelectQuery {
            select: vec![
                SelectItem::bare(self.cp(&b.rating)),
                SelectItem::aliased(
                    self.num(self.tr(&b.notional)).aggregate(Aggregation::Sum),
                    "total_notional",
                ),
            ],
            from: self.counterparty_ref(true),
            joins: vec![self.trade_join(SqlJoinType::Inner)],
            group_by: vec![self.cp(&b.rating)],
            order_by: vec![OrderItem {
                expr: SqlExpr::column("total_notional"),
                direction: order,
            }],
            limit: Some(1),
            ..Default::default()
        }
    }

    fn average_notional_by_sector(&self) -> SelectQuery {
        let b = &self.binding;
        SelectQuery {
            select: vec![
                SelectItem::bare(self.cp(&b.sector)),
                SelectItem::aliased(
                    self.num(self.tr(&b.notional)).aggregate(Aggregation::Avg),
                    "avg_notional",
                ),
            ],
            from: self.trade_ref(),
            joins: vec![Join {
                join_type: SqlJoinType::Inner,
                table: self.counterparty_ref(true),
                on: vec![self
                    .tr(&b.trade_counterparty)
                    .binary(SqlBinaryOperator::Eq, self.cp(&b.counterparty_id))],
            }],
            filters: vec![self.cp(&b.sector).is_not_null()],
            group_by: vec![self.cp(&b.sector)],
            order_by: vec![OrderItem {
                expr: SqlExpr::column("avg_notional"),
                direction: SortDirection::Desc,
            }],
            ..Default::default()
        }
    }

    fn breaches(&self) -> SelectQuery {
        let b = &self.binding;
        let mpe = self.num(SqlExpr::column(&b.mpe));
        let limit = self.num(SqlExpr::column(&b.mpe_limit));
        SelectQuery {
            select: vec![
                SelectItem::bare(SqlExpr::column(&b.counterparty_name)),
                SelectItem::aliased(mpe.clone(), "current_mpe"),
                SelectItem::aliased(limit.clone(), "mpe_limit"),
            ],
            from: self.counterparty_ref(false),
            filters: vec![mpe.binary(SqlBinaryOperator::Gt, limit)],
            order_by: vec![OrderItem {
                expr: SqlExpr::column("current_mpe"),
                direction: SortDirection::Desc,
            }],
            ..Default::default()
        }
    }

    fn rating_distribution(&self) -> SelectQuery {
        let b = &self.binding;
        SelectQuery {
            select: vec![
                SelectItem::bare(SqlExpr::column(&b.rating)),
                SelectItem::aliased(SqlExpr::Star.aggregate(Aggregation::Count), "count"),
                SelectItem::aliased(
                    self.num(SqlExpr::column(&b.mpe)).aggregate(Aggregation::Sum),
                    "total_exposure",
                ),
            ],
            from: self.counterparty_ref(false),
            filters: vec![SqlExpr::column(&b.rating).is_not_null()],
            group_by: vec![SqlExpr::column(&b.rating)],
            order_by: vec![OrderItem {
                expr: SqlExpr::column("total_exposure"),
                direction: SortDirection::Desc,
            }],
            ..Default::default()
        }
    }

    fn single_trade(&self, order: SortDirection) -> SelectQuery {
        let b = &self.binding;
        SelectQuery {
            select: vec![
                SelectItem::bare(self.tr(&b.trade_id)),
                SelectItem::bare(self.cp(&b.counterparty_name)),
                SelectItem::bare(self.tr(&b.notional)),
                SelectItem::bare(self.tr(&b.currency)),
            ],
            from: self.trade_ref(),
            joins: vec![Join {
                join_type: SqlJoinType::Inner,
                table: self.counterparty_ref(true),
                on: vec![self
                    .tr(&b.trade_counterparty)
                    .binary(SqlBinaryOperator::Eq, self.cp(&b.counterparty_id))],
            }],
            order_by: vec![OrderItem {
                expr: self.num(self.tr(&b.notional)),
                direction: order,
            }],
            limit: Some(1),
            ..Default::default()
        }
    }

    fn exposure_by_concentration_group(&self, order: SortDirection) -> SelectQuery {
        let b = &self.binding;
        SelectQuery {
            select: vec![
                SelectItem::bare(SqlExpr::column(&b.concentration_group)),
                SelectItem::aliased(
                    self.num(SqlExpr::column(&b.concentration_value))
                        .aggregate(Aggregation::Sum),
                    "total_exposure",
                ),
            ],
            from: TableRef::new(&b.concentration_table, None),
            filters: vec![SqlExpr::column(&b.concentration_group).is_not_null()],
            group_by: vec![SqlExpr::column(&b.concentration_group)],
            order_by: vec![OrderItem {
                expr: SqlExpr::column("total_exposure"),
                direction: order,
            }],
            limit: Some(1),
            ..Default::default()
        }
    }

    fn basic(&self, question: &str) -> SelectQuery {
        SelectQuery {
            select: vec![SelectItem::bare(SqlExpr::Star)],
            from: TableRef::new(self.basic_table(question), None),
            limit: Some(BASIC_LIMIT),
            ..Default::default()
        }
    }

    /// Table for the `SELECT *` report, picked by raw substrings.
    fn basic_table(&self, question: &str) -> &str {
        let raw = question.to_lowercase();
        let b = &self.binding;
        if raw.contains("concentration") {
            &b.concentration_table
        } else if raw.contains("counterpart") {
            &b.counterparty_table
        } else if raw.contains("trade") {
            &b.trade_table
        } else {
            &b.concentration_table
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(question: &str) -> String {
        TemplateCatalog::default().sql_for(question)
    }

    #[test]
    fn sector_exposure_direction_words() {
        for word in ["minimum", "lowest", "smallest", "least"] {
            let out = sql(&format!("Which sector has the {word} exposure?"));
            assert!(out.ends_with("ORDER BY total_exposure ASC LIMIT 1"), "{word}: {out}");
        }
        for word in ["maximum", "highest", "largest"] {
            let out = sql(&format!("Which sector has the {word} exposure?"));
            assert!(out.ends_with("ORDER BY total_exposure DESC LIMIT 1"), "{word}: {out}");
        }
    }

    #[test]
    fn sector_exposure_full_text() {
        assert_eq!(
            sql("Which sector has the lowest exposure?"),
            "SELECT counterparty_sector, SUM(CAST(mpe AS DECIMAL(15,2))) AS total_exposure \
             FROM counterparty_new WHERE counterparty_sector IS NOT NULL \
             GROUP BY counterparty_sector ORDER BY total_exposure ASC LIMIT 1"
        );
    }

    #[test]
    fn counterparty_mpe_limit_from_question() {
        assert!(sql("top 7 counterparties by MPE").ends_with("DESC LIMIT 7"));
        assert!(sql("top counterparties by MPE").ends_with("DESC LIMIT 10"));
        assert_eq!(
            sql("bottom 3 clients by mpe"),
            "SELECT counterparty_name, counterparty_id, CAST(mpe AS DECIMAL(15,2)) AS mpe_value \
             FROM counterparty_new ORDER BY CAST(mpe AS DECIMAL(15,2)) ASC LIMIT 3"
        );
    }

    #[test]
    fn counterparty_notional_is_capped_at_twenty() {
        assert_eq!(
            sql("Which 5 counterparties have the highest notional?"),
            "SELECT cp.counterparty_name, SUM(CAST(t.notional_usd AS DECIMAL(15,2))) AS total_notional \
             FROM counterparty_new cp JOIN trade_new t ON cp.counterparty_id = t.reporting_counterparty_id \
             GROUP BY cp.counterparty_id, cp.counterparty_name ORDER BY total_notional DESC LIMIT 20"
        );
    }

    #[test]
    fn counterparty_trade_ranking_follows_direction() {
        assert!(sql("clients with fewer trades")
            .ends_with("GROUP BY cp.counterparty_id, cp.counterparty_name ORDER BY trade_count ASC LIMIT 10"));
    }

    #[test]
    fn rating_notional_ranking() {
        assert_eq!(
            sql("which rating has the highest notional"),
            "SELECT cp.internal_rating, SUM(CAST(t.notional_usd AS DECIMAL(15,2))) AS total_notional \
             FROM counterparty_new cp JOIN trade_new t ON cp.counterparty_id = t.reporting_counterparty_id \
             GROUP BY cp.internal_rating ORDER BY total_notional DESC LIMIT 1"
        );
    }

    #[test]
    fn unsupported_ranking_pair_falls_back() {
        assert_eq!(
            sql("which sector has the highest notional trade"),
            "SELECT * FROM trade_new LIMIT 20"
        );
    }

    #[test]
    fn count_report() {
        assert_eq!(
            sql("How many trades exist per counterparty?"),
            "SELECT cp.counterparty_name, COUNT(t.id) AS trade_count \
             FROM counterparty_new cp LEFT JOIN trade_new t ON cp.counterparty_id = t.reporting_counterparty_id \
             GROUP BY cp.counterparty_id, cp.counterparty_name ORDER BY trade_count DESC"
        );
    }

    #[test]
    fn breach_report_ignores_ranking_words() {
        let expected = "SELECT counterparty_name, CAST(mpe AS DECIMAL(15,2)) AS current_mpe, \
             CAST(mpe_limit AS DECIMAL(15,2)) AS mpe_limit FROM counterparty_new \
             WHERE CAST(mpe AS DECIMAL(15,2)) > CAST(mpe_limit AS DECIMAL(15,2)) \
             ORDER BY current_mpe DESC";
        assert_eq!(sql("Which counterparties have breached their MPE limits?"), expected);
        assert_eq!(sql("top 5 highest counterparties that exceeded limits"), expected);
    }

    #[test]
    fn distribution_report() {
        assert_eq!(
            sql("show the distribution of exposure"),
            "SELECT internal_rating, COUNT(*) AS count, SUM(CAST(mpe AS DECIMAL(15,2))) AS total_exposure \
             FROM counterparty_new WHERE internal_rating IS NOT NULL \
             GROUP BY internal_rating ORDER BY total_exposure DESC"
        );
    }

    #[test]
    fn average_notional_per_sector() {
        assert_eq!(
            sql("average notional per sector"),
            "SELECT cp.counterparty_sector, AVG(CAST(t.notional_usd AS DECIMAL(15,2))) AS avg_notional \
             FROM trade_new t JOIN counterparty_new cp ON t.reporting_counterparty_id = cp.counterparty_id \
             WHERE cp.counterparty_sector IS NOT NULL GROUP BY cp.counterparty_sector ORDER BY avg_notional DESC"
        );
        assert_eq!(sql("average trade size"), "SELECT * FROM trade_new LIMIT 20");
    }

    #[test]
    fn highest_single_trade() {
        let expected = "SELECT t.trade_id, cp.counterparty_name, t.notional_usd, t.currency \
             FROM trade_new t JOIN counterparty_new cp ON t.reporting_counterparty_id = cp.counterparty_id \
             ORDER BY CAST(t.notional_usd AS DECIMAL(15,2)) DESC LIMIT 1";
        assert_eq!(sql("What is the highest single trade notional?"), expected);
        assert_eq!(sql("Largest trade by notional value"), expected);
        assert_eq!(sql("Show the biggest trade"), expected);
        assert!(sql("smallest deal").ends_with("ASC LIMIT 1"));
    }

    #[test]
    fn concentration_group_exposure() {
        assert_eq!(
            sql("Which concentration group has the lowest exposure?"),
            "SELECT concentration_group, SUM(CAST(concentration_value AS DECIMAL(15,2))) AS total_exposure \
             FROM concentration_new WHERE concentration_group IS NOT NULL \
             GROUP BY concentration_group ORDER BY total_exposure ASC LIMIT 1"
        );
        assert!(sql("concentration group with maximum exposure").ends_with("DESC LIMIT 1"));
        // a sector entity keeps the sector ranking
        assert!(sql("Which sector has the largest concentration exposure?")
            .starts_with("SELECT counterparty_sector"));
    }

    #[test]
    fn every_bound_column_is_rendered() {
        let catalog = TemplateCatalog::default();
        let rendered: Vec<String> = [
            "top 5 counterparties by MPE",
            "Which counterparties have the highest notional?",
            "How many trades per counterparty?",
            "Which sector has the lowest exposure?",
            "which rating has the highest notional",
            "average notional per sector",
            "Show limit breaches",
            "rating distribution",
            "Show the biggest trade",
            "Which concentration group has the lowest exposure?",
        ]
        .iter()
        .map(|q| catalog.sql_for(q))
        .collect();

        let b = catalog.binding();
        let columns = b
            .counterparty_columns()
            .into_iter()
            .chain(b.trade_columns())
            .chain(b.concentration_columns());
        for column in columns {
            assert!(
                rendered.iter().any(|sql| sql.contains(column)),
                "{column} is validated but never rendered"
            );
        }
    }

    #[test]
    fn basic_table_selection() {
        assert_eq!(sql(""), "SELECT * FROM concentration_new LIMIT 20");
        assert_eq!(sql("list counterparts"), "SELECT * FROM counterparty_new LIMIT 20");
        assert_eq!(sql("show trade data"), "SELECT * FROM trade_new LIMIT 20");
        assert_eq!(
            sql("concentration for each counterparty"),
            "SELECT * FROM concentration_new LIMIT 20"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let q = "Which sector has the lowest exposure?";
        assert_eq!(sql(q), sql(q));
    }

    #[test]
    fn binding_overrides_change_identifiers() {
        let binding = SchemaBinding {
            counterparty_table: "Cpty".to_string(),
            sector: "industry_code".to_string(),
            mpe: "peak_exposure".to_string(),
            numeric_type: "NUMERIC(20,4)".to_string(),
            ..Default::default()
        };
        let catalog = TemplateCatalog::new(binding, DialectKind::Ansi);
        assert_eq!(
            catalog.sql_for("Which sector has the lowest exposure?"),
            "SELECT industry_code, SUM(CAST(peak_exposure AS NUMERIC(20,4))) AS total_exposure \
             FROM \"Cpty\" WHERE industry_code IS NOT NULL \
             GROUP BY industry_code ORDER BY total_exposure ASC LIMIT 1"
        );
    }

    #[test]
    fn examples_render_through_catalog() {
        let examples = TemplateCatalog::default().examples();
        assert_eq!(examples.len(), 3);
        assert_eq!(examples[0].intent, Intent::RankingQuery);
        assert!(examples[0].sql.contains("ASC LIMIT 1"));
        assert_eq!(examples[2].intent, Intent::CountQuery);
    }
}
