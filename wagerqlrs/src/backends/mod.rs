//! Store gateways.
//!
//! Each backend is implemented in its own file and gated behind a feature flag.
//! Gateways only ever execute SQL produced by the compiler, with its bound
//! parameters; they never see request input directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::compiler::{CompiledQuery, TOTAL_ROWS_ALIAS};
use crate::dialect::Dialect;
use crate::error::{EngineError, Result};
use crate::executor::QueryResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
}

/// Physical shape of a table as reported by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// Unified interface for all store backends.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    fn dialect(&self) -> &(dyn Dialect + Send + Sync);

    async fn fetch_schema(&self, table: &str) -> Result<TableSchema>;

    async fn fetch_rows(&self, query: &CompiledQuery) -> Result<QueryResult>;

    /// Run a count query and return its single scalar.
    ///
    /// The default runs it through `fetch_rows` and reads the first column of the first row.
    async fn fetch_count(&self, query: &CompiledQuery) -> Result<i64> {
        let result = self.fetch_rows(query).await?;
        count_from_result(&result)
    }
}

/// Extract the scalar from a count query result. A missing row counts as zero.
pub fn count_from_result(result: &QueryResult) -> Result<i64> {
    let Some(row) = result.rows.first() else {
        return Ok(0);
    };
    let value = row
        .get(TOTAL_ROWS_ALIAS)
        .or_else(|| row.values().next())
        .ok_or_else(|| EngineError::StoreFailure("count query returned no columns".to_string()))?;
    match value {
        serde_json::Value::Null => Ok(0),
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| EngineError::StoreFailure(format!("count out of range: {n}"))),
        serde_json::Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| EngineError::StoreFailure(format!("count is not an integer: {s}"))),
        other => Err(EngineError::StoreFailure(format!(
            "unexpected count value: {other}"
        ))),
    }
}

// Feature-gated backend implementations
#[cfg(feature = "duckdb")]
mod duckdb;
#[cfg(feature = "duckdb")]
pub use duckdb::DuckDbConnection;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
pub use postgres::PostgresConnection;
