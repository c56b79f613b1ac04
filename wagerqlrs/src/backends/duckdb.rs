//! DuckDB backend implementation.
//!
//! Embedded store used for local runs and end-to-end tests. Pooled
//! connections are clones of one root connection, so an in-memory database is
//! shared by every query issued through the same `DuckDbConnection`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use duckdb::types::Value as DuckValue;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::compiler::{CompiledQuery, TIMESTAMP_FORMAT};
use crate::dialect::DuckDbDialect;
use crate::error::{EngineError, Result};
use crate::executor::QueryResult;
use crate::sql_ast::QueryParam;

use super::{BackendConnection, ColumnSchema, TableSchema};

const DEFAULT_SCHEMA: &str = "main";
const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// DuckDB connection implementing the unified backend trait.
#[derive(Clone)]
pub struct DuckDbConnection {
    dialect: DuckDbDialect,
    limiter: Arc<Semaphore>,
    root: Arc<Mutex<duckdb::Connection>>,
    pool: Arc<Mutex<Vec<duckdb::Connection>>>,
}

impl DuckDbConnection {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), max_concurrency = DEFAULT_MAX_CONCURRENCY, "opening DuckDB database");
        Ok(Self::from_root(duckdb::Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        tracing::info!(max_concurrency = DEFAULT_MAX_CONCURRENCY, "opening in-memory DuckDB database");
        Ok(Self::from_root(duckdb::Connection::open_in_memory()?))
    }

    fn from_root(root: duckdb::Connection) -> Self {
        Self {
            dialect: DuckDbDialect,
            limiter: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
            root: Arc::new(Mutex::new(root)),
            pool: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure maximum concurrent executions.
    pub fn with_max_concurrency(mut self, max_in_flight: usize) -> Self {
        tracing::debug!(max_concurrency = max_in_flight, "configuring DuckDB concurrency");
        self.limiter = Arc::new(Semaphore::new(max_in_flight.max(1)));
        self
    }

    /// Run one or more statements without parameters, e.g. DDL and seed data.
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.with_connection(move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    async fn acquire_slot(&self) -> Result<SemaphorePermit<'_>> {
        if self.limiter.available_permits() == 0 {
            tracing::debug!("all DuckDB slots in use, waiting for permit");
        }
        self.limiter
            .acquire()
            .await
            .map_err(|e| EngineError::StoreFailure(format!("limiter closed: {e}")))
    }

    async fn checkout_connection(&self) -> Result<duckdb::Connection> {
        let mut guard = self.pool.lock().await;
        if let Some(conn) = guard.pop() {
            let pool_size = guard.len();
            drop(guard);
            tracing::trace!(pool_remaining = pool_size, "reusing pooled DuckDB connection");
            return Ok(conn);
        }
        drop(guard);
        tracing::debug!("cloning new DuckDB connection");
        let root = self.root.lock().await;
        Ok(root.try_clone()?)
    }

    /// Run `work` on a pooled connection off the async runtime.
    async fn with_connection<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&duckdb::Connection) -> Result<T> + Send + 'static,
    {
        let _permit = self.acquire_slot().await?;
        let conn = self.checkout_connection().await?;
        let (result, conn) = tokio::task::spawn_blocking(move || {
            let result = work(&conn);
            (result, conn)
        })
        .await
        .map_err(|e| EngineError::StoreFailure(format!("task join error: {e}")))?;

        self.pool.lock().await.push(conn);
        result
    }
}

#[async_trait]
impl BackendConnection for DuckDbConnection {
    fn dialect(&self) -> &(dyn crate::dialect::Dialect + Send + Sync) {
        &self.dialect
    }

    async fn fetch_schema(&self, table: &str) -> Result<TableSchema> {
        let (schema, name) = table.split_once('.').unwrap_or((DEFAULT_SCHEMA, table));
        let (schema, name) = (schema.to_string(), name.to_string());
        self.with_connection(move |conn| {
            let start = Instant::now();
            let mut stmt = conn.prepare(
                "SELECT column_name, data_type \
                 FROM information_schema.columns \
                 WHERE table_schema = ? AND table_name = ? \
                 ORDER BY ordinal_position",
            )?;
            let mut rows = stmt.query(duckdb::params![schema, name])?;
            let mut columns = Vec::new();
            while let Some(row) = rows.next()? {
                columns.push(ColumnSchema {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                });
            }
            tracing::debug!(
                table = name.as_str(),
                columns = columns.len(),
                ms = start.elapsed().as_millis(),
                "duckdb fetch_schema"
            );
            Ok(TableSchema { columns })
        })
        .await
    }

    async fn fetch_rows(&self, query: &CompiledQuery) -> Result<QueryResult> {
        let sql = query.sql.clone();
        let params: Vec<DuckValue> = query.params.iter().map(duck_param).collect();
        tracing::trace!(sql = %sql, params = params.len(), "executing DuckDB query");

        self.with_connection(move |conn| {
            let start = Instant::now();
            let mut stmt = conn.prepare(&sql)?;
            let mut rows_iter = stmt.query(duckdb::params_from_iter(params))?;
            let stmt_ref = rows_iter
                .as_ref()
                .ok_or_else(|| EngineError::StoreFailure("statement missing".to_string()))?;
            let mut column_names = Vec::new();
            for idx in 0..stmt_ref.column_count() {
                let name = stmt_ref
                    .column_name(idx)
                    .map_err(|e| EngineError::StoreFailure(e.to_string()))?;
                column_names.push(name.to_string());
            }
            let mut rows = Vec::new();
            while let Some(row) = rows_iter.next()? {
                let mut map = serde_json::Map::new();
                for (idx, name) in column_names.iter().enumerate() {
                    let value = crate::executor::duck_value_to_json(row.get_ref(idx)?.to_owned());
                    map.insert(name.clone(), value);
                }
                rows.push(map);
            }

            tracing::debug!(
                rows = rows.len(),
                columns = column_names.len(),
                sql_len = sql.len(),
                ms = start.elapsed().as_millis(),
                "duckdb fetch_rows"
            );
            Ok(QueryResult { rows })
        })
        .await
    }
}

/// Timestamps travel as text and are cast back in SQL by the dialect.
fn duck_param(param: &QueryParam) -> DuckValue {
    match param {
        QueryParam::Text(s) => DuckValue::Text(s.clone()),
        QueryParam::Integer(i) => DuckValue::BigInt(*i),
        QueryParam::Float(f) => DuckValue::Double(*f),
        QueryParam::Timestamp(ts) => DuckValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
    }
}
