use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Count,
    Avg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub enum SqlExpr {
    Column {
        table: Option<String>,
        name: String,
    },
    /// `*`, valid as a select item or as the argument of `COUNT`.
    Star,
    Cast {
        expr: Box<SqlExpr>,
        data_type: String,
    },
    BinaryOp {
        op: SqlBinaryOperator,
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
    },
    Aggregate {
        agg: Aggregation,
        expr: Box<SqlExpr>,
    },
    IsNull {
        expr: Box<SqlExpr>,
        negated: bool,
    },
}

impl SqlExpr {
    pub fn column(name: &str) -> Self {
        SqlExpr::Column {
            table: None,
            name: name.to_string(),
        }
    }

    pub fn qualified(table: &str, name: &str) -> Self {
        SqlExpr::Column {
            table: Some(table.to_string()),
            name: name.to_string(),
        }
    }

    pub fn cast(self, data_type: &str) -> Self {
        SqlExpr::Cast {
            expr: Box::new(self),
            data_type: data_type.to_string(),
        }
    }

    pub fn aggregate(self, agg: Aggregation) -> Self {
        SqlExpr::Aggregate {
            agg,
            expr: Box::new(self),
        }
    }

    pub fn is_not_null(self) -> Self {
        SqlExpr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn binary(self, op: SqlBinaryOperator, right: SqlExpr) -> Self {
        SqlExpr::BinaryOp {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SqlBinaryOperator {
    Eq,
    Gt,
}

#[derive(Debug, Clone)]
pub struct SelectItem {
    pub expr: SqlExpr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn bare(expr: SqlExpr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: SqlExpr, alias: &str) -> Self {
        Self {
            expr,
            alias: Some(alias.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: &str, alias: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            alias: alias.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SqlJoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone)]
pub struct Join {
    pub join_type: SqlJoinType,
    pub table: TableRef,
    pub on: Vec<SqlExpr>,
}

#[derive(Debug, Clone)]
pub struct OrderItem {
    pub expr: SqlExpr,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub select: Vec<SelectItem>,
    pub from: TableRef,
    pub joins: Vec<Join>,
    pub filters: Vec<SqlExpr>,
    pub group_by: Vec<SqlExpr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
}

pub struct SqlRenderer<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> SqlRenderer<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    pub fn render_select(&self, query: &SelectQuery) -> String {
        let select_items: Vec<String> = query
            .select
            .iter()
            .map(|item| {
                let expr_sql = self.render_expr(&item.expr);
                match &item.alias {
                    Some(alias) => format!("{expr_sql} AS {}", self.dialect.quote_ident(alias)),
                    None => expr_sql,
                }
            })
            .collect();

        let mut sql = format!(
            "SELECT {} FROM {}",
            select_items.join(", "),
            self.render_table_ref(&query.from)
        );

        for join in &query.joins {
            let join_kw = match join.join_type {
                SqlJoinType::Inner => "JOIN",
                SqlJoinType::Left => "LEFT JOIN",
            };
            let on_clause: Vec<String> = join.on.iter().map(|e| self.render_expr(e)).collect();
            sql.push_str(&format!(
                " {join_kw} {} ON {}",
                self.render_table_ref(&join.table),
                on_clause.join(" AND ")
            ));
        }

        if !query.filters.is_empty() {
            let filters: Vec<String> = query.filters.iter().map(|f| self.render_expr(f)).collect();
            sql.push_str(&format!(" WHERE {}", filters.join(" AND ")));
        }

        if !query.group_by.is_empty() {
            let groups: Vec<String> = query.group_by.iter().map(|g| self.render_expr(g)).collect();
            sql.push_str(&format!(" GROUP BY {}", groups.join(", ")));
        }

        if !query.order_by.is_empty() {
            let orders: Vec<String> = query
                .order_by
                .iter()
                .map(|o| format!("{} {}", self.render_expr(&o.expr), o.direction.as_sql()))
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        sql
    }

    fn render_table_ref(&self, table: &TableRef) -> String {
        match &table.alias {
            Some(alias) => format!(
                "{} {}",
                self.dialect.quote_ident(&table.name),
                self.dialect.quote_ident(alias)
            ),
            None => self.dialect.quote_ident(&table.name),
        }
    }

    fn render_expr(&self, expr: &SqlExpr) -> String {
        match expr {
            SqlExpr::Column { table, name } => match table {
                Some(t) => format!(
                    "{}.{}",
                    self.dialect.quote_ident(t),
                    self.dialect.quote_ident(name)
                ),
                None => self.dialect.quote_ident(name),
            },
            SqlExpr::Star => "*".to_string(),
            SqlExpr::Cast { expr, data_type } => {
                self.dialect.render_cast(&self.render_expr(expr), data_type)
            }
            SqlExpr::BinaryOp { op, left, right } => {
                let op_sql = match op {
                    SqlBinaryOperator::Eq => "=",
                    SqlBinaryOperator::Gt => ">",
                };
                format!(
                    "{} {} {}",
                    self.render_expr(left),
                    op_sql,
                    self.render_expr(right)
                )
            }
            SqlExpr::Aggregate { agg, expr } => self
                .dialect
                .render_aggregation(agg, &self.render_expr(expr)),
            SqlExpr::IsNull { expr, negated } => {
                let not_kw = if *negated { "NOT " } else { "" };
                format!("{} IS {not_kw}NULL", self.render_expr(expr))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{AnsiDialect, MySqlDialect};

    fn join_query() -> SelectQuery {
        SelectQuery {
            select: vec![
                SelectItem::bare(SqlExpr::qualified("cp", "counterparty_name")),
                SelectItem::aliased(
                    SqlExpr::qualified("t", "id").aggregate(Aggregation::Count),
                    "trade_count",
                ),
            ],
            from: TableRef::new("counterparty_new", Some("cp")),
            joins: vec![Join {
                join_type: SqlJoinType::Left,
                table: TableRef::new("trade_new", Some("t")),
                on: vec![SqlExpr::qualified("cp", "counterparty_id").binary(
                    SqlBinaryOperator::Eq,
                    SqlExpr::qualified("t", "reporting_counterparty_id"),
                )],
            }],
            filters: vec![],
            group_by: vec![SqlExpr::qualified("cp", "counterparty_name")],
            order_by: vec![OrderItem {
                expr: SqlExpr::column("trade_count"),
                direction: SortDirection::Desc,
            }],
            limit: Some(5),
        }
    }

    #[test]
    fn renders_join_group_order_limit() {
        let sql = SqlRenderer::new(&AnsiDialect).render_select(&join_query());
        assert_eq!(
            sql,
            "SELECT cp.counterparty_name, COUNT(t.id) AS trade_count \
             FROM counterparty_new cp \
             LEFT JOIN trade_new t ON cp.counterparty_id = t.reporting_counterparty_id \
             GROUP BY cp.counterparty_name ORDER BY trade_count DESC LIMIT 5"
        );
    }

    #[test]
    fn renders_cast_filters_and_null_checks() {
        let mpe = SqlExpr::column("mpe").cast("DECIMAL(15,2)");
        let query = SelectQuery {
            select: vec![SelectItem::bare(SqlExpr::Star)],
            from: TableRef::new("counterparty_new", None),
            filters: vec![
                mpe.clone().binary(
                    SqlBinaryOperator::Gt,
                    SqlExpr::column("mpe_limit").cast("DECIMAL(15,2)"),
                ),
                SqlExpr::column("counterparty_sector").is_not_null(),
            ],
            ..Default::default()
        };
        let sql = SqlRenderer::new(&AnsiDialect).render_select(&query);
        assert_eq!(
            sql,
            "SELECT * FROM counterparty_new \
             WHERE CAST(mpe AS DECIMAL(15,2)) > CAST(mpe_limit AS DECIMAL(15,2)) \
             AND counterparty_sector IS NOT NULL"
        );
    }

    #[test]
    fn quotes_awkward_identifiers_per_dialect() {
        let query = SelectQuery {
            select: vec![SelectItem::aliased(SqlExpr::Star.aggregate(Aggregation::Count), "order")],
            from: TableRef::new("Trades", None),
            ..Default::default()
        };
        assert_eq!(
            SqlRenderer::new(&AnsiDialect).render_select(&query),
            "SELECT COUNT(*) AS \"order\" FROM \"Trades\""
        );
        assert_eq!(
            SqlRenderer::new(&MySqlDialect).render_select(&query),
            "SELECT COUNT(*) AS `order` FROM `Trades`"
        );
    }
}
