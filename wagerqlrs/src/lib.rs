pub mod auth;
pub mod backends;
pub mod columns;
pub mod compiler;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod executor;
pub mod pagination;
pub mod request;
pub mod spec_builder;
pub mod sql_ast;
pub mod telemetry;
pub mod validation;

#[cfg(feature = "postgres")]
use std::sync::Arc;

pub use auth::{AuthDecision, AuthGuard};
pub use backends::{BackendConnection, TableSchema};
pub use columns::{ColumnDescriptor, ColumnRegistry};
pub use compiler::{CompiledPair, CompiledQuery, CountStrategy, QueryCompiler};
pub use config::AppConfig;
pub use engine::AnalyticsEngine;
pub use error::{EngineError, Result};
pub use executor::{QueryResult, Row};
pub use pagination::{Page, PageLimits, QueryResultPage};
pub use spec_builder::{AggregationQuerySpec, SpecBuilder};
pub use validation::RegistryValidator;

/// Build an engine backed by PostgreSQL from configuration.
///
/// Loads the registry (builtin unless `registry.path` is set), applies the
/// table override, creates the pool and optionally validates the registry
/// against the live table.
#[cfg(feature = "postgres")]
pub async fn bootstrap(config: &AppConfig) -> Result<AnalyticsEngine> {
    let mut registry = match &config.registry.path {
        Some(path) => ColumnRegistry::load_from_file(path)?,
        None => ColumnRegistry::builtin(),
    };
    if let Some(table) = config.store.table.as_deref().filter(|t| !t.is_empty()) {
        registry = registry.with_table(table);
    }

    let limits = config.query.page_limits()?;
    let auth = AuthGuard::new(config.auth_secret()?)?.with_header(config.auth.header.clone());
    let backend = backends::PostgresConnection::new(
        config.store_url()?,
        config.pool.size,
        config.store.statement_timeout_ms,
    )?;

    if config.registry.validate_on_startup {
        RegistryValidator::new(false)
            .validate(&registry, &backend)
            .await?;
    }

    Ok(
        AnalyticsEngine::new(Arc::new(registry), Arc::new(backend), auth)
            .with_page_limits(limits)
            .with_count_strategy(config.query.count_strategy),
    )
}
