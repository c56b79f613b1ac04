//! Exact SQL produced for each request shape.

use chrono::{NaiveDate, NaiveDateTime};
use wagerql::columns::ColumnRegistry;
use wagerql::compiler::{CountStrategy, QueryCompiler};
use wagerql::dialect::{DuckDbDialect, PostgresDialect};
use wagerql::request::{
    CustomGraphParams, DimensionalParams, DistinctParams, PageParams, TimeSeriesParams,
};
use wagerql::sql_ast::QueryParam;
use wagerql::{EngineError, PageLimits, SpecBuilder};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32, micro: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_micro_opt(h, min, s, micro)
        .unwrap()
}

fn s(value: &str) -> Option<String> {
    Some(value.to_string())
}

#[test]
fn time_series_sql_and_params() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_time_series(&TimeSeriesParams {
            market_type: s("player_props"),
            start_date: s("2024-01-01"),
            end_date: s("2024-01-31"),
            client_id: s("c1"),
            ..Default::default()
        })
        .unwrap();
    let pair = QueryCompiler::new(&PostgresDialect, registry.table()).compile(&spec);

    assert_eq!(
        pair.data.sql,
        concat!(
            r#"SELECT date_trunc('day', "accepted_datetime_utc") AS "date", SUM("book_risk_component") AS "bet_handle" "#,
            r#"FROM "bet_transactions" "#,
            r#"WHERE ("accepted_datetime_utc" BETWEEN CAST($1 AS TIMESTAMP) AND CAST($2 AS TIMESTAMP)) "#,
            r#"AND ("market_type" = $3) AND ("client_id" = $4) "#,
            r#"GROUP BY date_trunc('day', "accepted_datetime_utc") "#,
            r#"ORDER BY "date" ASC LIMIT $5 OFFSET $6"#
        )
    );
    assert_eq!(
        pair.data.params,
        vec![
            QueryParam::Timestamp(at(2024, 1, 1, 0, 0, 0, 0)),
            QueryParam::Timestamp(at(2024, 1, 31, 23, 59, 59, 999_999)),
            QueryParam::Text("player_props".to_string()),
            QueryParam::Text("c1".to_string()),
            QueryParam::Integer(250),
            QueryParam::Integer(0),
        ]
    );

    assert_eq!(
        pair.count.sql,
        concat!(
            r#"SELECT COUNT(*) AS "total_rows" FROM "bet_transactions" "#,
            r#"WHERE ("accepted_datetime_utc" BETWEEN CAST($1 AS TIMESTAMP) AND CAST($2 AS TIMESTAMP)) "#,
            r#"AND ("market_type" = $3) AND ("client_id" = $4)"#
        )
    );
    assert_eq!(pair.count.params, pair.data.params[..4].to_vec());
}

#[test]
fn time_series_grain_changes_bucket() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_time_series(&TimeSeriesParams {
            market_type: s("player_props"),
            start_date: s("2024-01-01"),
            end_date: s("2024-03-31"),
            grain: s("week"),
            ..Default::default()
        })
        .unwrap();
    let sql = QueryCompiler::new(&DuckDbDialect, registry.table())
        .compile_data(&spec)
        .sql;
    assert!(
        sql.starts_with(r#"SELECT date_trunc('week', "accepted_datetime_utc") AS "date""#),
        "{sql}"
    );
}

#[test]
fn dimensional_groups_by_dimension_and_ranks_by_handle() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_dimensional(&DimensionalParams {
            dimension: s("sport"),
            page: PageParams::new(3, 20),
            ..Default::default()
        })
        .unwrap();
    let pair = QueryCompiler::new(&PostgresDialect, registry.table()).compile(&spec);

    assert_eq!(
        pair.data.sql,
        r#"SELECT "sport" AS "sport", SUM("book_risk_component") AS "bet_handle" FROM "bet_transactions" GROUP BY "sport" ORDER BY "bet_handle" DESC, "sport" ASC LIMIT $1 OFFSET $2"#
    );
    assert_eq!(
        pair.data.params,
        vec![QueryParam::Integer(20), QueryParam::Integer(40)]
    );
    assert_eq!(
        pair.count.sql,
        r#"SELECT COUNT(*) AS "total_rows" FROM "bet_transactions""#
    );
    assert!(pair.count.params.is_empty());
}

#[test]
fn dimensional_group_count() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_dimensional(&DimensionalParams {
            dimension: s("stat_type"),
            usage_id: s("u7"),
            ..Default::default()
        })
        .unwrap();
    let count = QueryCompiler::new(&PostgresDialect, registry.table())
        .with_count_strategy(CountStrategy::Groups)
        .compile_count(&spec);
    assert_eq!(
        count.sql,
        r#"SELECT COUNT(*) AS "total_rows" FROM (SELECT "stat_type" AS "stat_type" FROM "bet_transactions" WHERE ("usage_id" = $1) GROUP BY "stat_type") AS "groups""#
    );
    assert_eq!(count.params, vec![QueryParam::Text("u7".to_string())]);
}

#[test]
fn custom_graph_selects_exactly_requested_columns() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_custom_graph(&CustomGraphParams {
            y_column: s("book_profit_gross"),
            x_columns: s("sport,stat_type"),
            ..Default::default()
        })
        .unwrap();
    let data = QueryCompiler::new(&PostgresDialect, registry.table()).compile_data(&spec);
    assert_eq!(
        data.sql,
        r#"SELECT "sport" AS "sport", "stat_type" AS "stat_type", SUM("book_profit_gross") AS "book_profit_gross" FROM "bet_transactions" GROUP BY "sport", "stat_type" ORDER BY "sport" ASC, "stat_type" ASC LIMIT $1 OFFSET $2"#
    );
}

#[test]
fn custom_graph_with_time_window() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_custom_graph(&CustomGraphParams {
            y_column: s("line_movement"),
            x_columns: s("player_name"),
            start_date: s("2024-03-01"),
            start_time: s("19:00"),
            end_date: s("2024-03-02"),
            end_time: s("02:00:00"),
            client_id: s("c1"),
            ..Default::default()
        })
        .unwrap();
    let data = QueryCompiler::new(&PostgresDialect, registry.table()).compile_data(&spec);
    assert!(
        data.sql.contains(
            r#"WHERE ("accepted_datetime_utc" BETWEEN CAST($1 AS TIMESTAMP) AND CAST($2 AS TIMESTAMP)) AND ("client_id" = $3)"#
        ),
        "{}",
        data.sql
    );
    assert_eq!(
        data.params[..3].to_vec(),
        vec![
            QueryParam::Timestamp(at(2024, 3, 1, 19, 0, 0, 0)),
            QueryParam::Timestamp(at(2024, 3, 2, 2, 0, 0, 0)),
            QueryParam::Text("c1".to_string()),
        ]
    );
}

#[test]
fn custom_graph_without_dimensions_is_a_single_aggregate() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_custom_graph(&CustomGraphParams {
            y_column: s("book_profit_gross"),
            ..Default::default()
        })
        .unwrap();
    let data = QueryCompiler::new(&PostgresDialect, registry.table()).compile_data(&spec);
    assert_eq!(
        data.sql,
        r#"SELECT SUM("book_profit_gross") AS "book_profit_gross" FROM "bet_transactions" LIMIT $1 OFFSET $2"#
    );
}

#[test]
fn distinct_listing_sql() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_distinct(&DistinctParams {
            columns: s("sport, stat_type"),
            client_id: s("c1"),
            ..Default::default()
        })
        .unwrap();
    let query = QueryCompiler::new(&DuckDbDialect, registry.table()).compile_distinct(&spec);
    assert_eq!(
        query.sql,
        r#"SELECT DISTINCT "sport", "stat_type" FROM "bet_transactions" WHERE ("client_id" = $1) ORDER BY "sport" ASC, "stat_type" ASC LIMIT $2 OFFSET $3"#
    );
    assert_eq!(query.params.len(), 3);
}

#[test]
fn schema_qualified_table_is_quoted_per_segment() {
    let registry = ColumnRegistry::builtin().with_table("analytics.bet_transactions");
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_dimensional(&DimensionalParams {
            dimension: s("sport"),
            ..Default::default()
        })
        .unwrap();
    let pair = QueryCompiler::new(&PostgresDialect, registry.table()).compile(&spec);
    assert!(pair.data.sql.contains(r#"FROM "analytics"."bet_transactions""#));
    assert!(pair.count.sql.ends_with(r#"FROM "analytics"."bet_transactions""#));
}

#[test]
fn hostile_values_never_reach_sql_text() {
    let registry = ColumnRegistry::builtin();
    let hostile = "c1'; DROP TABLE bet_transactions; --";
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_dimensional(&DimensionalParams {
            dimension: s("sport"),
            client_id: s(hostile),
            ..Default::default()
        })
        .unwrap();
    let pair = QueryCompiler::new(&PostgresDialect, registry.table()).compile(&spec);
    assert!(!pair.data.sql.contains("DROP"));
    assert!(!pair.count.sql.contains("DROP"));
    assert_eq!(pair.data.params[0], QueryParam::Text(hostile.to_string()));
}

#[test]
fn hostile_identifiers_are_rejected_before_compilation() {
    let registry = ColumnRegistry::builtin();
    let builder = SpecBuilder::new(&registry, PageLimits::default());
    let err = builder
        .build_dimensional(&DimensionalParams {
            dimension: s(r#"sport" ; DROP TABLE bet_transactions; --"#),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidColumn(_)));

    let err = builder
        .build_custom_graph(&CustomGraphParams {
            y_column: s("book_profit_gross"),
            x_columns: s("sport,1=1"),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidColumn(_)));
}
