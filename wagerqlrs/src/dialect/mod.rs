//! SQL dialect abstractions for different database backends.
//!
//! Each dialect is implemented in its own file.

use crate::columns::Aggregation;
use crate::sql_ast::{Function, ParamKind};

/// Dialects render identifiers, placeholders and primitive expression pieces.
/// Expression tree walking lives in the SQL renderer; the dialect only maps
/// logical constructs to SQL fragments.
pub trait Dialect {
    fn quote_ident(&self, ident: &str) -> String;

    /// Quote a possibly schema-qualified table name segment by segment.
    fn qualify_table(&self, table: &str) -> String {
        table
            .split('.')
            .map(|segment| self.quote_ident(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Placeholder for the zero-based parameter `idx`.
    fn placeholder(&self, idx: usize) -> String {
        format!("${}", idx + 1)
    }

    fn double_type(&self) -> &'static str {
        "DOUBLE"
    }

    fn render_param(&self, idx: usize, kind: ParamKind) -> String {
        let placeholder = self.placeholder(idx);
        match kind {
            ParamKind::Timestamp => format!("CAST({placeholder} AS TIMESTAMP)"),
            ParamKind::Float => format!("CAST({placeholder} AS {})", self.double_type()),
            ParamKind::Text | ParamKind::Integer => placeholder,
        }
    }

    fn render_function(&self, func: &Function, args: Vec<String>) -> String {
        match func {
            Function::DateTrunc(grain) => {
                format!("date_trunc('{}', {})", grain.as_str(), args.join(", "))
            }
        }
    }

    fn render_aggregation(&self, agg: &Aggregation, expr: &str) -> String {
        match agg {
            Aggregation::Sum => format!("SUM({expr})"),
            Aggregation::Count => format!("COUNT({expr})"),
        }
    }
}

// Dialects carry no driver dependency and are compiled regardless of backend features.
mod duckdb;
pub use self::duckdb::DuckDbDialect;

mod postgres;
pub use self::postgres::PostgresDialect;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_doubles_embedded_quotes() {
        let dialect = PostgresDialect;
        assert_eq!(dialect.quote_ident("sport"), "\"sport\"");
        assert_eq!(dialect.quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn qualifies_schema_tables_per_segment() {
        let dialect = PostgresDialect;
        assert_eq!(
            dialect.qualify_table("analytics.bet_transactions"),
            "\"analytics\".\"bet_transactions\""
        );
    }

    #[test]
    fn timestamp_params_are_cast() {
        let dialect = DuckDbDialect;
        assert_eq!(
            dialect.render_param(1, ParamKind::Timestamp),
            "CAST($2 AS TIMESTAMP)"
        );
        assert_eq!(dialect.render_param(0, ParamKind::Integer), "$1");
        assert_eq!(
            PostgresDialect.render_param(2, ParamKind::Float),
            "CAST($3 AS DOUBLE PRECISION)"
        );
    }
}
