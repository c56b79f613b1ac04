//! Renders validated specs into parameterized SQL.
//!
//! Identifiers only ever come from registry descriptors and are quoted by the
//! dialect. Values (dates, scope ids, limit, offset) are always bound
//! parameters. The count query shares the data query's predicate but is built
//! with its own parameter list.

use serde::{Deserialize, Serialize};

use crate::columns::{Aggregation, ColumnDescriptor};
use crate::dialect::Dialect;
use crate::spec_builder::{
    AggregationQuerySpec, DimensionSelection, DistinctSpec, MetricSelection, Ordering,
    ScopeFilter, TimeFilter,
};
use crate::sql_ast::{
    Function, OrderItem, QueryParam, SelectItem, SelectQuery, SortDirection, SqlBinaryOperator,
    SqlExpr, SqlRenderer, TableRef,
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
pub const TOTAL_ROWS_ALIAS: &str = "total_rows";
const GROUPS_ALIAS: &str = "groups";

/// What the count query counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStrategy {
    /// Rows of the fact table matching the filter predicate.
    #[default]
    MatchingRows,
    /// Result groups produced by the data query.
    Groups,
}

/// SQL text plus the values for its placeholders, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPair {
    pub data: CompiledQuery,
    pub count: CompiledQuery,
}

#[derive(Default)]
struct ParamBinder {
    params: Vec<QueryParam>,
}

impl ParamBinder {
    fn bind(&mut self, value: QueryParam) -> SqlExpr {
        let expr = SqlExpr::Param {
            index: self.params.len(),
            kind: value.kind(),
        };
        self.params.push(value);
        expr
    }
}

pub struct QueryCompiler<'d> {
    dialect: &'d dyn Dialect,
    table: String,
    count_strategy: CountStrategy,
}

impl<'d> QueryCompiler<'d> {
    pub fn new(dialect: &'d dyn Dialect, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
            count_strategy: CountStrategy::default(),
        }
    }

    pub fn with_count_strategy(mut self, strategy: CountStrategy) -> Self {
        self.count_strategy = strategy;
        self
    }

    pub fn compile(&self, spec: &AggregationQuerySpec) -> CompiledPair {
        CompiledPair {
            data: self.compile_data(spec),
            count: self.compile_count(spec),
        }
    }

    pub fn compile_data(&self, spec: &AggregationQuerySpec) -> CompiledQuery {
        let mut binder = ParamBinder::default();

        let mut select: Vec<SelectItem> = spec
            .dimensions()
            .iter()
            .map(|dim| SelectItem {
                expr: dimension_expr(dim),
                alias: Some(dim.alias.clone()),
            })
            .collect();
        select.push(SelectItem {
            expr: metric_expr(spec.metric()),
            alias: Some(spec.metric().alias.clone()),
        });

        let filters = predicate(spec.time_filter(), spec.filters(), &mut binder);
        let group_by = spec.dimensions().iter().map(dimension_expr).collect();
        let order_by = order_items(spec);
        let page = spec.page();
        let limit = binder.bind(QueryParam::Integer(page.size() as i64));
        let offset = binder.bind(QueryParam::Integer(page.offset() as i64));

        let query = SelectQuery {
            select,
            from: self.table_ref(),
            filters,
            group_by,
            order_by,
            limit: Some(limit),
            offset: Some(offset),
            ..Default::default()
        };
        self.finish(&query, binder)
    }

    pub fn compile_count(&self, spec: &AggregationQuerySpec) -> CompiledQuery {
        let mut binder = ParamBinder::default();
        let filters = predicate(spec.time_filter(), spec.filters(), &mut binder);
        let count_item = SelectItem {
            expr: SqlExpr::Aggregate {
                agg: Aggregation::Count,
                expr: Box::new(SqlExpr::Star),
            },
            alias: Some(TOTAL_ROWS_ALIAS.to_string()),
        };

        let query = match self.count_strategy {
            CountStrategy::MatchingRows => SelectQuery {
                select: vec![count_item],
                from: self.table_ref(),
                filters,
                ..Default::default()
            },
            CountStrategy::Groups => {
                // Without dimensions the data query yields exactly one aggregate row.
                let select = if spec.dimensions().is_empty() {
                    vec![SelectItem {
                        expr: metric_expr(spec.metric()),
                        alias: None,
                    }]
                } else {
                    spec.dimensions()
                        .iter()
                        .map(|dim| SelectItem {
                            expr: dimension_expr(dim),
                            alias: Some(dim.alias.clone()),
                        })
                        .collect()
                };
                let inner = SelectQuery {
                    select,
                    from: self.table_ref(),
                    filters,
                    group_by: spec.dimensions().iter().map(dimension_expr).collect(),
                    ..Default::default()
                };
                SelectQuery {
                    select: vec![count_item],
                    from: TableRef {
                        name: String::new(),
                        alias: Some(GROUPS_ALIAS.to_string()),
                        subquery: Some(Box::new(inner)),
                    },
                    ..Default::default()
                }
            }
        };
        self.finish(&query, binder)
    }

    pub fn compile_distinct(&self, spec: &DistinctSpec) -> CompiledQuery {
        let mut binder = ParamBinder::default();
        let select = spec
            .columns()
            .iter()
            .map(|column| SelectItem {
                expr: column_expr(column),
                alias: None,
            })
            .collect();
        let filters = predicate(None, spec.filters(), &mut binder);
        let order_by = spec
            .columns()
            .iter()
            .map(|column| OrderItem {
                expr: column_expr(column),
                direction: SortDirection::Asc,
            })
            .collect();
        let page = spec.page();
        let limit = binder.bind(QueryParam::Integer(page.size() as i64));
        let offset = binder.bind(QueryParam::Integer(page.offset() as i64));

        let query = SelectQuery {
            distinct: true,
            select,
            from: self.table_ref(),
            filters,
            order_by,
            limit: Some(limit),
            offset: Some(offset),
            ..Default::default()
        };
        self.finish(&query, binder)
    }

    fn table_ref(&self) -> TableRef {
        TableRef {
            name: self.table.clone(),
            ..Default::default()
        }
    }

    fn finish(&self, query: &SelectQuery, binder: ParamBinder) -> CompiledQuery {
        let sql = SqlRenderer::new(self.dialect).render_select(query);
        CompiledQuery {
            sql,
            params: binder.params,
        }
    }
}

fn column_expr(column: &ColumnDescriptor) -> SqlExpr {
    SqlExpr::Column {
        name: column.name.clone(),
    }
}

fn dimension_expr(dim: &DimensionSelection) -> SqlExpr {
    let column = column_expr(&dim.column);
    match dim.grain {
        Some(grain) => SqlExpr::Function {
            func: Function::DateTrunc(grain),
            args: vec![column],
        },
        None => column,
    }
}

fn metric_expr(metric: &MetricSelection) -> SqlExpr {
    let expr = if metric.column.is_count() {
        SqlExpr::Star
    } else {
        column_expr(&metric.column)
    };
    SqlExpr::Aggregate {
        agg: metric.column.aggregation,
        expr: Box::new(expr),
    }
}

/// The filter predicate shared by data and count queries.
fn predicate(
    time_filter: Option<&TimeFilter>,
    filters: &[ScopeFilter],
    binder: &mut ParamBinder,
) -> Vec<SqlExpr> {
    let mut exprs = Vec::new();
    if let Some(time) = time_filter {
        let low = binder.bind(QueryParam::Timestamp(time.range.start));
        let high = binder.bind(QueryParam::Timestamp(time.range.end));
        exprs.push(SqlExpr::Between {
            expr: Box::new(column_expr(&time.column)),
            low: Box::new(low),
            high: Box::new(high),
        });
    }
    for filter in filters {
        let value = binder.bind(filter.value.clone());
        exprs.push(SqlExpr::BinaryOp {
            op: SqlBinaryOperator::Eq,
            left: Box::new(column_expr(&filter.column)),
            right: Box::new(value),
        });
    }
    exprs
}

fn order_items(spec: &AggregationQuerySpec) -> Vec<OrderItem> {
    let dimensions_asc = spec.dimensions().iter().map(|dim| OrderItem {
        expr: SqlExpr::Column {
            name: dim.alias.clone(),
        },
        direction: SortDirection::Asc,
    });
    match spec.ordering() {
        Ordering::DimensionsAsc => dimensions_asc.collect(),
        Ordering::MetricDesc => std::iter::once(OrderItem {
            expr: SqlExpr::Column {
                name: spec.metric().alias.clone(),
            },
            direction: SortDirection::Desc,
        })
        .chain(dimensions_asc)
        .collect(),
        Ordering::Unordered => Vec::new(),
    }
}
