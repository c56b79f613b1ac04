//! Turns raw request parameters into validated aggregation query specs.
//!
//! Every column name is resolved through the [`ColumnRegistry`] here, before
//! anything is compiled. A spec that comes out of this module only carries
//! registry descriptors, typed parameter values and a validated page, so the
//! compiler never sees caller-supplied identifiers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::columns::{ColumnDescriptor, ColumnRegistry, ValueType};
use crate::error::{EngineError, Result};
use crate::pagination::{Page, PageLimits};
use crate::request::{
    CustomGraphParams, DimensionalParams, DistinctParams, PageParams, TimeSeriesParams,
};
use crate::sql_ast::{QueryParam, TimeGrain};

pub const MARKET_TYPE_COLUMN: &str = "market_type";
pub const CLIENT_COLUMN: &str = "client_id";
pub const USAGE_COLUMN: &str = "usage_id";

pub const DATE_ALIAS: &str = "date";
pub const HANDLE_ALIAS: &str = "bet_handle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    TimeSeries,
    Dimensional,
    CustomGraph,
}

impl SpecKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecKind::TimeSeries => "time_series",
            SpecKind::Dimensional => "dimensional",
            SpecKind::CustomGraph => "custom_graph",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionSelection {
    pub column: ColumnDescriptor,
    /// Truncate a timestamp column to this grain before grouping.
    pub grain: Option<TimeGrain>,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSelection {
    pub column: ColumnDescriptor,
    pub alias: String,
}

/// Inclusive timestamp bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end < start {
            return Err(EngineError::InvalidDateRange(format!(
                "end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeFilter {
    pub column: ColumnDescriptor,
    pub range: TimeRange,
}

/// Equality filter on a registered column.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeFilter {
    pub column: ColumnDescriptor,
    pub value: QueryParam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    /// Every dimension ascending, in listed order (time-series and graph shapes).
    DimensionsAsc,
    /// Aggregated metric descending (ranked breakdowns).
    MetricDesc,
    Unordered,
}

/// A validated aggregation query. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationQuerySpec {
    kind: SpecKind,
    metric: MetricSelection,
    dimensions: Vec<DimensionSelection>,
    time_filter: Option<TimeFilter>,
    filters: Vec<ScopeFilter>,
    ordering: Ordering,
    page: Page,
}

impl AggregationQuerySpec {
    pub fn kind(&self) -> SpecKind {
        self.kind
    }

    pub fn metric(&self) -> &MetricSelection {
        &self.metric
    }

    pub fn dimensions(&self) -> &[DimensionSelection] {
        &self.dimensions
    }

    pub fn time_filter(&self) -> Option<&TimeFilter> {
        self.time_filter.as_ref()
    }

    pub fn filters(&self) -> &[ScopeFilter] {
        &self.filters
    }

    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

/// A validated distinct-values listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DistinctSpec {
    columns: Vec<ColumnDescriptor>,
    filters: Vec<ScopeFilter>,
    page: Page,
}

impl DistinctSpec {
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn filters(&self) -> &[ScopeFilter] {
        &self.filters
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

pub struct SpecBuilder<'r> {
    registry: &'r ColumnRegistry,
    limits: PageLimits,
}

impl<'r> SpecBuilder<'r> {
    pub fn new(registry: &'r ColumnRegistry, limits: PageLimits) -> Self {
        Self { registry, limits }
    }

    /// Daily (or other grain) summed handle for one market type.
    pub fn build_time_series(&self, params: &TimeSeriesParams) -> Result<AggregationQuerySpec> {
        let market_type = required(&params.market_type, "marketType")?;
        let start_raw = required(&params.start_date, "startDate")?;
        let end_raw = required(&params.end_date, "endDate")?;

        let start = parse_bound("startDate", start_raw, BoundSide::Start)?;
        let end = parse_bound("endDate", end_raw, BoundSide::End)?;
        let range = TimeRange::new(start, end)?;

        let grain = match present(&params.grain) {
            Some(raw) => TimeGrain::parse(raw).ok_or_else(|| {
                EngineError::InvalidParameter(format!("unsupported grain `{raw}`"))
            })?,
            None => TimeGrain::Day,
        };

        let mut filters = vec![self.scope_filter(MARKET_TYPE_COLUMN, market_type)?];
        filters.extend(self.scope_filters(&params.client_id, &params.usage_id)?);
        let page = self.page(&params.page)?;

        let time_column = self.registry.time_column().clone();
        Ok(AggregationQuerySpec {
            kind: SpecKind::TimeSeries,
            metric: self.handle_metric(),
            dimensions: vec![DimensionSelection {
                column: time_column.clone(),
                grain: Some(grain),
                alias: DATE_ALIAS.to_string(),
            }],
            time_filter: Some(TimeFilter {
                column: time_column,
                range,
            }),
            filters,
            ordering: Ordering::DimensionsAsc,
            page,
        })
    }

    /// Summed handle broken down by one caller-chosen dimension, largest first.
    pub fn build_dimensional(&self, params: &DimensionalParams) -> Result<AggregationQuerySpec> {
        let name = required(&params.dimension, "dimension")?;
        let column = self.registry.resolve_dimension(name)?.clone();
        let filters = self.scope_filters(&params.client_id, &params.usage_id)?;
        let page = self.page(&params.page)?;

        Ok(AggregationQuerySpec {
            kind: SpecKind::Dimensional,
            metric: self.handle_metric(),
            dimensions: vec![DimensionSelection {
                alias: column.name.clone(),
                column,
                grain: None,
            }],
            time_filter: None,
            filters,
            ordering: Ordering::MetricDesc,
            page,
        })
    }

    /// Any registered metric against any registered dimensions.
    pub fn build_custom_graph(&self, params: &CustomGraphParams) -> Result<AggregationQuerySpec> {
        let metric_name = present(&params.y_column);
        let dimension_names = split_columns(present(&params.x_columns));
        if metric_name.is_none() && dimension_names.is_empty() {
            return Err(EngineError::MissingParameter(
                "yColumn or xColumns".to_string(),
            ));
        }

        let metric_column = match metric_name {
            Some(name) => self.registry.resolve_metric(name)?.clone(),
            None => self
                .registry
                .count_metric()
                .cloned()
                .ok_or_else(|| EngineError::MissingParameter("yColumn".to_string()))?,
        };
        let dimensions = self
            .resolve_dimensions(&dimension_names)?
            .into_iter()
            .map(|column| DimensionSelection {
                alias: column.name.clone(),
                column,
                grain: None,
            })
            .collect::<Vec<_>>();

        let start = combine_date_time(
            "startDate",
            present(&params.start_date),
            present(&params.start_time),
            BoundSide::Start,
        )?;
        let end = combine_date_time(
            "endDate",
            present(&params.end_date),
            present(&params.end_time),
            BoundSide::End,
        )?;
        let time_filter = match (start, end) {
            (Some(start), Some(end)) => Some(TimeFilter {
                column: self.registry.time_column().clone(),
                range: TimeRange::new(start, end)?,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(EngineError::MissingParameter("endDate".to_string())),
            (None, Some(_)) => {
                return Err(EngineError::MissingParameter("startDate".to_string()))
            }
        };

        let filters = self.scope_filters(&params.client_id, &None)?;
        let page = self.page(&params.page)?;
        let ordering = if dimensions.is_empty() {
            Ordering::Unordered
        } else {
            Ordering::DimensionsAsc
        };

        Ok(AggregationQuerySpec {
            kind: SpecKind::CustomGraph,
            metric: MetricSelection {
                alias: metric_column.name.clone(),
                column: metric_column,
            },
            dimensions,
            time_filter,
            filters,
            ordering,
            page,
        })
    }

    /// Distinct value combinations of one or more dimensions.
    pub fn build_distinct(&self, params: &DistinctParams) -> Result<DistinctSpec> {
        let names = split_columns(present(&params.columns));
        if names.is_empty() {
            return Err(EngineError::MissingParameter("columns".to_string()));
        }
        let columns = self.resolve_dimensions(&names)?;
        let filters = self.scope_filters(&params.client_id, &params.usage_id)?;
        let page = self.page(&params.page)?;
        Ok(DistinctSpec {
            columns,
            filters,
            page,
        })
    }

    fn handle_metric(&self) -> MetricSelection {
        MetricSelection {
            column: self.registry.handle_metric().clone(),
            alias: HANDLE_ALIAS.to_string(),
        }
    }

    fn page(&self, params: &PageParams) -> Result<Page> {
        Page::parse(
            params.page.as_deref(),
            params.page_size.as_deref(),
            &self.limits,
        )
    }

    fn resolve_dimensions(&self, names: &[&str]) -> Result<Vec<ColumnDescriptor>> {
        let mut columns: Vec<ColumnDescriptor> = Vec::with_capacity(names.len());
        for name in names {
            let column = self.registry.resolve_dimension(name)?;
            if columns.iter().any(|c| c.name == column.name) {
                return Err(EngineError::InvalidColumn(format!(
                    "column `{name}` listed more than once"
                )));
            }
            columns.push(column.clone());
        }
        Ok(columns)
    }

    fn scope_filters(
        &self,
        client_id: &Option<String>,
        usage_id: &Option<String>,
    ) -> Result<Vec<ScopeFilter>> {
        let mut filters = Vec::new();
        if let Some(client) = present(client_id) {
            filters.push(self.scope_filter(CLIENT_COLUMN, client)?);
        }
        if let Some(usage) = present(usage_id) {
            filters.push(self.scope_filter(USAGE_COLUMN, usage)?);
        }
        Ok(filters)
    }

    fn scope_filter(&self, column_name: &str, raw: &str) -> Result<ScopeFilter> {
        let column = self.registry.resolve_dimension(column_name)?.clone();
        let value = typed_value(&column, raw)?;
        Ok(ScopeFilter { column, value })
    }
}

fn typed_value(column: &ColumnDescriptor, raw: &str) -> Result<QueryParam> {
    let trimmed = raw.trim();
    match column.value_type {
        ValueType::Text => Ok(QueryParam::Text(raw.to_string())),
        ValueType::Number => {
            if let Ok(int) = trimmed.parse::<i64>() {
                Ok(QueryParam::Integer(int))
            } else {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(QueryParam::Float)
                    .ok_or_else(|| {
                        EngineError::InvalidParameter(format!(
                            "{} expects a number, got `{trimmed}`",
                            column.name
                        ))
                    })
            }
        }
        ValueType::Timestamp => {
            parse_bound(&column.name, trimmed, BoundSide::Start).map(QueryParam::Timestamp)
        }
    }
}

/// Treat absent and blank parameters alike.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    present(value).ok_or_else(|| EngineError::MissingParameter(name.to_string()))
}

fn split_columns(raw: Option<&str>) -> Vec<&str> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundSide {
    Start,
    End,
}

impl BoundSide {
    fn default_time(self) -> NaiveTime {
        match self {
            BoundSide::Start => NaiveTime::default(),
            BoundSide::End => {
                NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or_default()
            }
        }
    }
}

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

/// Parse a date or timestamp bound. A bare date expands to the start or end of that day.
fn parse_bound(name: &str, raw: &str, side: BoundSide) -> Result<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(side.default_time()));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| {
            EngineError::InvalidDateRange(format!("{name} `{raw}` is not a valid date"))
        })
}

fn combine_date_time(
    name: &str,
    date: Option<&str>,
    time: Option<&str>,
    side: BoundSide,
) -> Result<Option<NaiveDateTime>> {
    match (date, time) {
        (None, None) => Ok(None),
        (None, Some(_)) => Err(EngineError::MissingParameter(name.to_string())),
        (Some(date), None) => parse_bound(name, date, side).map(Some),
        (Some(date), Some(time)) => {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                EngineError::InvalidDateRange(format!("{name} `{date}` is not a valid date"))
            })?;
            let clock = TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(time, fmt).ok())
                .ok_or_else(|| {
                    EngineError::InvalidDateRange(format!("time `{time}` is not a valid time"))
                })?;
            Ok(Some(day.and_time(clock)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").unwrap()
    }

    #[test]
    fn bare_dates_cover_whole_days() {
        assert_eq!(
            parse_bound("startDate", "2024-03-01", BoundSide::Start).unwrap(),
            ts("2024-03-01 00:00:00")
        );
        assert_eq!(
            parse_bound("endDate", "2024-03-01", BoundSide::End).unwrap(),
            ts("2024-03-01 23:59:59.999999")
        );
    }

    #[test]
    fn accepts_rfc3339_and_naive_timestamps() {
        assert_eq!(
            parse_bound("startDate", "2024-03-01T10:00:00+02:00", BoundSide::Start).unwrap(),
            ts("2024-03-01 08:00:00")
        );
        assert_eq!(
            parse_bound("startDate", "2024-03-01 10:30:00", BoundSide::Start).unwrap(),
            ts("2024-03-01 10:30:00")
        );
    }

    #[test]
    fn garbage_dates_are_invalid_ranges() {
        assert!(matches!(
            parse_bound("startDate", "yesterday", BoundSide::Start),
            Err(EngineError::InvalidDateRange(_))
        ));
    }

    #[test]
    fn combines_date_with_short_time() {
        let combined =
            combine_date_time("startDate", Some("2024-03-01"), Some("08:15"), BoundSide::Start)
                .unwrap();
        assert_eq!(combined, Some(ts("2024-03-01 08:15:00")));
    }

    #[test]
    fn time_without_date_is_missing_date() {
        assert!(matches!(
            combine_date_time("endDate", None, Some("08:15"), BoundSide::End),
            Err(EngineError::MissingParameter(name)) if name == "endDate"
        ));
    }

    #[test]
    fn split_skips_blank_entries() {
        assert_eq!(
            split_columns(Some(" sport, ,stat_type,")),
            vec!["sport", "stat_type"]
        );
        assert!(split_columns(None).is_empty());
    }

    #[test]
    fn number_scope_values_are_typed() {
        let column = ColumnDescriptor::dimension("client_id", ValueType::Number);
        assert_eq!(typed_value(&column, " 42 ").unwrap(), QueryParam::Integer(42));
        assert_eq!(typed_value(&column, "4.5").unwrap(), QueryParam::Float(4.5));
        assert!(matches!(
            typed_value(&column, "abc"),
            Err(EngineError::InvalidParameter(_))
        ));
    }
}
