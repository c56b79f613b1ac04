//! Request entry points.
//!
//! The engine owns the shared, immutable pieces (registry, auth guard, page
//! limits) and a handle to the store gateway. Each call validates its input
//! fully before the gateway is touched. Paginated calls issue the data and
//! count queries concurrently and fail if either fails.

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join;

use crate::auth::AuthGuard;
use crate::backends::BackendConnection;
use crate::columns::{ColumnDescriptor, ColumnRegistry};
use crate::compiler::{CountStrategy, QueryCompiler};
use crate::error::{EngineError, Result};
use crate::executor::Row;
use crate::pagination::{PageLimits, QueryResultPage};
use crate::request::{
    CustomGraphParams, DimensionalParams, DistinctParams, LoginRequest, LoginResponse,
    TimeSeriesParams,
};
use crate::spec_builder::{AggregationQuerySpec, SpecBuilder};

#[derive(Clone)]
pub struct AnalyticsEngine {
    registry: Arc<ColumnRegistry>,
    backend: Arc<dyn BackendConnection>,
    auth: AuthGuard,
    limits: PageLimits,
    count_strategy: CountStrategy,
}

impl AnalyticsEngine {
    pub fn new(
        registry: Arc<ColumnRegistry>,
        backend: Arc<dyn BackendConnection>,
        auth: AuthGuard,
    ) -> Self {
        tracing::info!(
            table = registry.table(),
            columns = registry.len(),
            "analytics engine ready"
        );
        Self {
            registry,
            backend,
            auth,
            limits: PageLimits::default(),
            count_strategy: CountStrategy::default(),
        }
    }

    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_count_strategy(mut self, strategy: CountStrategy) -> Self {
        self.count_strategy = strategy;
        self
    }

    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    pub fn auth(&self) -> &AuthGuard {
        &self.auth
    }

    /// Gate a request on the credential the transport extracted from its header.
    pub fn authorize(&self, credential: Option<&str>) -> Result<()> {
        self.auth.require(credential)
    }

    pub fn login(&self, request: &LoginRequest) -> LoginResponse {
        self.auth.login(request)
    }

    /// The allow-list, for column pickers.
    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        self.registry.descriptors().cloned().collect()
    }

    pub fn spec_builder(&self) -> SpecBuilder<'_> {
        SpecBuilder::new(&self.registry, self.limits)
    }

    pub fn compiler(&self) -> QueryCompiler<'_> {
        QueryCompiler::new(self.backend.dialect(), self.registry.table())
            .with_count_strategy(self.count_strategy)
    }

    pub async fn time_series(&self, params: &TimeSeriesParams) -> Result<QueryResultPage> {
        let spec = self.spec_builder().build_time_series(params)?;
        self.run_aggregation(&spec).await
    }

    pub async fn dimensional(&self, params: &DimensionalParams) -> Result<QueryResultPage> {
        let spec = self.spec_builder().build_dimensional(params)?;
        self.run_aggregation(&spec).await
    }

    pub async fn custom_graph(&self, params: &CustomGraphParams) -> Result<QueryResultPage> {
        let spec = self.spec_builder().build_custom_graph(params)?;
        self.run_aggregation(&spec).await
    }

    /// Distinct value combinations for filter pickers. Not paginated in the response.
    pub async fn distinct_values(&self, params: &DistinctParams) -> Result<Vec<Row>> {
        let spec = self.spec_builder().build_distinct(params)?;
        let compiled = self.compiler().compile_distinct(&spec);
        let start = Instant::now();
        let result = self
            .backend
            .fetch_rows(&compiled)
            .await
            .map_err(|e| store_failure("distinct", e))?;
        tracing::debug!(
            rows = result.len(),
            page = spec.page().number(),
            ms = start.elapsed().as_millis(),
            "distinct listing served"
        );
        Ok(result.rows)
    }

    /// Execute a validated spec: data and count queries run concurrently.
    pub async fn run_aggregation(&self, spec: &AggregationQuerySpec) -> Result<QueryResultPage> {
        let compiled = self.compiler().compile(spec);
        let kind = spec.kind().as_str();
        tracing::trace!(kind, sql = %compiled.data.sql, "data query");
        tracing::trace!(kind, sql = %compiled.count.sql, "count query");

        let start = Instant::now();
        let (result, total) = try_join(
            self.backend.fetch_rows(&compiled.data),
            self.backend.fetch_count(&compiled.count),
        )
        .await
        .map_err(|e| store_failure(kind, e))?;

        let page = QueryResultPage::assemble(spec.page(), result.rows, total);
        tracing::debug!(
            kind,
            rows = page.data.len(),
            total,
            page = page.current_page,
            total_pages = page.total_pages,
            ms = start.elapsed().as_millis(),
            "aggregation served"
        );
        Ok(page)
    }
}

/// Log the store error in full and reduce it to a `StoreFailure`.
fn store_failure(kind: &str, err: EngineError) -> EngineError {
    tracing::error!(kind, error = %err, "store query failed");
    match err {
        EngineError::StoreFailure(_) => err,
        other => EngineError::StoreFailure(other.to_string()),
    }
}
