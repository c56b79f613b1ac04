//! Raw request parameters as supplied by the transport.
//!
//! Everything is an optional string: the query string of an HTTP request is
//! deserialized straight into these structs, and all coercion happens in the
//! spec builder where failures map to typed errors.

use serde::{Deserialize, Serialize};

/// Page controls shared by every paginated request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PageParams {
    pub fn new(page: impl ToString, page_size: impl ToString) -> Self {
        Self {
            page: Some(page.to_string()),
            page_size: Some(page_size.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesParams {
    pub market_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub client_id: Option<String>,
    pub usage_id: Option<String>,
    /// Bucket width: `hour`, `day` (default), `week` or `month`.
    pub grain: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionalParams {
    pub dimension: Option<String>,
    pub client_id: Option<String>,
    pub usage_id: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomGraphParams {
    pub y_column: Option<String>,
    /// Comma-separated dimension names.
    pub x_columns: Option<String>,
    pub start_date: Option<String>,
    pub start_time: Option<String>,
    pub end_date: Option<String>,
    pub end_time: Option<String>,
    pub client_id: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinctParams {
    /// Comma-separated dimension names.
    pub columns: Option<String>,
    pub client_id: Option<String>,
    pub usage_id: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

/// Body of the credential check endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoginResponse {
    pub authorized: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_series_uses_camel_case_names() {
        let params: TimeSeriesParams = serde_json::from_str(
            r#"{"marketType":"props","startDate":"2024-01-01","endDate":"2024-01-31","clientId":"c1","page":"2","pageSize":"50"}"#,
        )
        .unwrap();
        assert_eq!(params.market_type.as_deref(), Some("props"));
        assert_eq!(params.client_id.as_deref(), Some("c1"));
        assert_eq!(params.page, PageParams::new(2, 50));
    }

    #[test]
    fn custom_graph_reads_axis_columns() {
        let params: CustomGraphParams = serde_json::from_str(
            r#"{"yColumn":"book_profit_gross","xColumns":"sport,stat_type","startTime":"08:00"}"#,
        )
        .unwrap();
        assert_eq!(params.y_column.as_deref(), Some("book_profit_gross"));
        assert_eq!(params.x_columns.as_deref(), Some("sport,stat_type"));
        assert_eq!(params.start_time.as_deref(), Some("08:00"));
        assert!(params.page.page.is_none());
    }
}
