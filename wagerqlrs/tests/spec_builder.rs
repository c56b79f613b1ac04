use wagerql::columns::ColumnRegistry;
use wagerql::request::{
    CustomGraphParams, DimensionalParams, DistinctParams, PageParams, TimeSeriesParams,
};
use wagerql::spec_builder::{Ordering, SpecKind, DATE_ALIAS, HANDLE_ALIAS};
use wagerql::sql_ast::TimeGrain;
use wagerql::{EngineError, PageLimits, SpecBuilder};

fn s(value: &str) -> Option<String> {
    Some(value.to_string())
}

fn time_series(start: &str, end: &str) -> TimeSeriesParams {
    TimeSeriesParams {
        market_type: s("player_props"),
        start_date: s(start),
        end_date: s(end),
        ..Default::default()
    }
}

#[test]
fn time_series_defaults() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_time_series(&time_series("2024-01-01", "2024-01-31"))
        .unwrap();
    assert_eq!(spec.kind(), SpecKind::TimeSeries);
    assert_eq!(spec.metric().alias, HANDLE_ALIAS);
    assert_eq!(spec.metric().column.name, "book_risk_component");
    assert_eq!(spec.dimensions().len(), 1);
    assert_eq!(spec.dimensions()[0].alias, DATE_ALIAS);
    assert_eq!(spec.dimensions()[0].grain, Some(TimeGrain::Day));
    assert_eq!(spec.ordering(), Ordering::DimensionsAsc);
    assert_eq!(spec.filters().len(), 1);
    assert_eq!(spec.page().number(), 1);
    assert_eq!(spec.page().size(), 250);
}

#[test]
fn time_series_requires_market_and_dates() {
    let registry = ColumnRegistry::builtin();
    let builder = SpecBuilder::new(&registry, PageLimits::default());

    let mut params = time_series("2024-01-01", "2024-01-31");
    params.market_type = s("  ");
    assert!(matches!(
        builder.build_time_series(&params),
        Err(EngineError::MissingParameter(name)) if name == "marketType"
    ));

    let mut params = time_series("2024-01-01", "2024-01-31");
    params.end_date = None;
    assert!(matches!(
        builder.build_time_series(&params),
        Err(EngineError::MissingParameter(name)) if name == "endDate"
    ));
}

#[test]
fn reversed_range_is_invalid() {
    let registry = ColumnRegistry::builtin();
    let err = SpecBuilder::new(&registry, PageLimits::default())
        .build_time_series(&time_series("2024-02-01", "2024-01-01"))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDateRange(_)));
    assert_eq!(err.status_code(), 400);
}

#[test]
fn single_day_range_is_valid() {
    let registry = ColumnRegistry::builtin();
    assert!(SpecBuilder::new(&registry, PageLimits::default())
        .build_time_series(&time_series("2024-01-01", "2024-01-01"))
        .is_ok());
}

#[test]
fn unknown_grain_is_invalid_parameter() {
    let registry = ColumnRegistry::builtin();
    let mut params = time_series("2024-01-01", "2024-01-31");
    params.grain = s("fortnight");
    let err = SpecBuilder::new(&registry, PageLimits::default())
        .build_time_series(&params)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidParameter(_)));
}

#[test]
fn dimensional_requires_registered_dimension() {
    let registry = ColumnRegistry::builtin();
    let builder = SpecBuilder::new(&registry, PageLimits::default());
    assert!(matches!(
        builder.build_dimensional(&DimensionalParams::default()),
        Err(EngineError::MissingParameter(_))
    ));
    for name in ["nonexistent", "book_risk_component", "SPORT"] {
        let err = builder
            .build_dimensional(&DimensionalParams {
                dimension: s(name),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidColumn(_)), "{name}");
    }
}

#[test]
fn dimensional_scope_filters_are_optional() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_dimensional(&DimensionalParams {
            dimension: s("stat_type"),
            client_id: s("c1"),
            usage_id: s("u1"),
            ..Default::default()
        })
        .unwrap();
    let columns: Vec<_> = spec.filters().iter().map(|f| f.column.name.as_str()).collect();
    assert_eq!(columns, ["client_id", "usage_id"]);
    assert_eq!(spec.ordering(), Ordering::MetricDesc);
}

#[test]
fn custom_graph_needs_an_axis() {
    let registry = ColumnRegistry::builtin();
    let err = SpecBuilder::new(&registry, PageLimits::default())
        .build_custom_graph(&CustomGraphParams::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingParameter(_)));
}

#[test]
fn custom_graph_defaults_to_count_metric() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_custom_graph(&CustomGraphParams {
            x_columns: s("sport"),
            ..Default::default()
        })
        .unwrap();
    assert!(spec.metric().column.is_count());
    assert_eq!(spec.metric().alias, "bet_count");
}

#[test]
fn custom_graph_rejects_duplicates_and_wrong_roles() {
    let registry = ColumnRegistry::builtin();
    let builder = SpecBuilder::new(&registry, PageLimits::default());
    let dup = builder
        .build_custom_graph(&CustomGraphParams {
            y_column: s("book_profit_gross"),
            x_columns: s("sport,sport"),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(dup, EngineError::InvalidColumn(_)));

    let wrong_role = builder
        .build_custom_graph(&CustomGraphParams {
            y_column: s("sport"),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(wrong_role, EngineError::InvalidColumn(_)));
}

#[test]
fn custom_graph_one_sided_range_is_missing_parameter() {
    let registry = ColumnRegistry::builtin();
    let err = SpecBuilder::new(&registry, PageLimits::default())
        .build_custom_graph(&CustomGraphParams {
            y_column: s("book_profit_gross"),
            start_date: s("2024-03-01"),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingParameter(name) if name == "endDate"));
}

#[test]
fn custom_graph_same_day_reversed_times_is_invalid() {
    let registry = ColumnRegistry::builtin();
    let err = SpecBuilder::new(&registry, PageLimits::default())
        .build_custom_graph(&CustomGraphParams {
            y_column: s("book_profit_gross"),
            start_date: s("2024-03-01"),
            start_time: s("18:00"),
            end_date: s("2024-03-01"),
            end_time: s("09:00"),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDateRange(_)));
}

#[test]
fn pagination_errors_surface_from_builder() {
    let registry = ColumnRegistry::builtin();
    let builder = SpecBuilder::new(&registry, PageLimits::default());
    for (page, size) in [("0", "10"), ("abc", "10"), ("1", "-5"), ("1", "10001")] {
        let err = builder
            .build_dimensional(&DimensionalParams {
                dimension: s("sport"),
                page: PageParams::new(page, size),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPagination(_)), "{page}/{size}");
    }
}

#[test]
fn configured_limits_apply() {
    let registry = ColumnRegistry::builtin();
    let limits = PageLimits {
        default_page_size: 25,
        max_page_size: 100,
    };
    let builder = SpecBuilder::new(&registry, limits);
    let spec = builder
        .build_distinct(&DistinctParams {
            columns: s("sport"),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(spec.page().size(), 25);
    assert!(builder
        .build_distinct(&DistinctParams {
            columns: s("sport"),
            page: PageParams::new(1, 101),
            ..Default::default()
        })
        .is_err());
}

#[test]
fn distinct_requires_columns() {
    let registry = ColumnRegistry::builtin();
    let err = SpecBuilder::new(&registry, PageLimits::default())
        .build_distinct(&DistinctParams::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingParameter(name) if name == "columns"));
}

#[test]
fn blank_pagination_values_are_rejected() {
    let registry = ColumnRegistry::builtin();
    let builder = SpecBuilder::new(&registry, PageLimits::default());
    let blank = [
        PageParams {
            page: s("   "),
            page_size: None,
        },
        PageParams {
            page: None,
            page_size: s(""),
        },
    ];
    for page in blank {
        let err = builder
            .build_dimensional(&DimensionalParams {
                dimension: s("sport"),
                page: page.clone(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPagination(_)), "{page:?}");
    }
}

#[test]
fn absent_pagination_values_take_defaults() {
    let registry = ColumnRegistry::builtin();
    let spec = SpecBuilder::new(&registry, PageLimits::default())
        .build_dimensional(&DimensionalParams {
            dimension: s("sport"),
            page: PageParams::default(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!((spec.page().number(), spec.page().size()), (1, 250));
}
