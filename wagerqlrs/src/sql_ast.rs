use chrono::NaiveDateTime;

use crate::columns::Aggregation;
use crate::dialect::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeGrain {
    Hour,
    Day,
    Week,
    Month,
}

impl TimeGrain {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeGrain::Hour => "hour",
            TimeGrain::Day => "day",
            TimeGrain::Week => "week",
            TimeGrain::Month => "month",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hour" => Some(TimeGrain::Hour),
            "day" => Some(TimeGrain::Day),
            "week" => Some(TimeGrain::Week),
            "month" => Some(TimeGrain::Month),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Function {
    DateTrunc(TimeGrain),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Type of a bound parameter, used by dialects that need an explicit cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Integer,
    Float,
    Timestamp,
}

/// A value bound to a query placeholder. Values never appear in SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
}

impl QueryParam {
    pub fn kind(&self) -> ParamKind {
        match self {
            QueryParam::Text(_) => ParamKind::Text,
            QueryParam::Integer(_) => ParamKind::Integer,
            QueryParam::Float(_) => ParamKind::Float,
            QueryParam::Timestamp(_) => ParamKind::Timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    Column {
        name: String,
    },
    /// Zero-based index into the query's parameter list.
    Param {
        index: usize,
        kind: ParamKind,
    },
    Function {
        func: Function,
        args: Vec<SqlExpr>,
    },
    Aggregate {
        agg: Aggregation,
        expr: Box<SqlExpr>,
    },
    /// Bare `*`, only rendered as a `COUNT` argument.
    Star,
    BinaryOp {
        op: SqlBinaryOperator,
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
    },
    Between {
        expr: Box<SqlExpr>,
        low: Box<SqlExpr>,
        high: Box<SqlExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlBinaryOperator {
    Eq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: SqlExpr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
    pub subquery: Option<Box<SelectQuery>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: SqlExpr,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub distinct: bool,
    pub select: Vec<SelectItem>,
    pub from: TableRef,
    pub filters: Vec<SqlExpr>,
    pub group_by: Vec<SqlExpr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<SqlExpr>,
    pub offset: Option<SqlExpr>,
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

        let distinct_kw = if query.distinct { "DISTINCT " } else { "" };
        let mut sql = format!(
            "SELECT {distinct_kw}{} FROM {}",
            select_items.join(", "),
            self.render_table_ref(&query.from)
        );

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
                .map(|o| {
                    let expr = self.render_expr(&o.expr);
                    let dir = match o.direction {
                        SortDirection::Asc => "ASC",
                        SortDirection::Desc => "DESC",
                    };
                    format!("{expr} {dir}")
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        if let Some(limit) = &query.limit {
            sql.push_str(&format!(" LIMIT {}", self.render_expr(limit)));
        }
        if let Some(offset) = &query.offset {
            sql.push_str(&format!(" OFFSET {}", self.render_expr(offset)));
        }

        sql
    }

    fn render_table_ref(&self, table: &TableRef) -> String {
        let base = match &table.subquery {
            Some(inner) => format!("({})", self.render_select(inner)),
            None => self.dialect.qualify_table(&table.name),
        };
        match &table.alias {
            Some(alias) => format!("{base} AS {}", self.dialect.quote_ident(alias)),
            None => base,
        }
    }

    fn render_expr(&self, expr: &SqlExpr) -> String {
        match expr {
            SqlExpr::Column { name } => self.dialect.quote_ident(name),
            SqlExpr::Param { index, kind } => self.dialect.render_param(*index, *kind),
            SqlExpr::Function { func, args } => {
                let rendered_args: Vec<String> = args.iter().map(|a| self.render_expr(a)).collect();
                self.dialect.render_function(func, rendered_args)
            }
            SqlExpr::Aggregate { agg, expr } => self
                .dialect
                .render_aggregation(agg, &self.render_expr(expr)),
            SqlExpr::Star => "*".to_string(),
            SqlExpr::BinaryOp { op, left, right } => {
                let op_sql = match op {
                    SqlBinaryOperator::Eq => "=",
                };
                format!(
                    "({} {} {})",
                    self.render_expr(left),
                    op_sql,
                    self.render_expr(right)
                )
            }
            SqlExpr::Between { expr, low, high } => format!(
                "({} BETWEEN {} AND {})",
                self.render_expr(expr),
                self.render_expr(low),
                self.render_expr(high)
            ),
        }
    }
}
