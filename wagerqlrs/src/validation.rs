//! Startup check that every registered column exists in the live table.

use crate::backends::{BackendConnection, TableSchema};
use crate::columns::{ColumnRegistry, ValueType};
use crate::error::{EngineError, Result};

pub struct RegistryValidator {
    warn_only: bool,
}

impl RegistryValidator {
    pub fn new(warn_only: bool) -> Self {
        Self { warn_only }
    }

    /// Fetch the registry table's schema and check it. Returns the number of problems found.
    pub async fn validate(
        &self,
        registry: &ColumnRegistry,
        backend: &dyn BackendConnection,
    ) -> Result<usize> {
        let schema = backend.fetch_schema(registry.table()).await?;
        self.validate_schema(registry, &schema)
    }

    pub fn validate_schema(&self, registry: &ColumnRegistry, schema: &TableSchema) -> Result<usize> {
        let mut problems = 0;
        if schema.columns.is_empty() {
            self.check(
                false,
                format!("table {} not found or has no columns", registry.table()),
                &mut problems,
            )?;
            return Ok(problems);
        }

        for column in registry.physical_columns() {
            let Some(physical) = schema.column(&column.name) else {
                self.check(
                    false,
                    format!("column {} missing on table {}", column.name, registry.table()),
                    &mut problems,
                )?;
                continue;
            };
            if column.is_metric() {
                self.check(
                    is_numeric(&physical.data_type),
                    format!(
                        "metric {} has non-numeric type {}",
                        column.name, physical.data_type
                    ),
                    &mut problems,
                )?;
            }
            if column.value_type == ValueType::Timestamp {
                self.check(
                    is_temporal(&physical.data_type),
                    format!(
                        "timestamp column {} has type {}",
                        column.name, physical.data_type
                    ),
                    &mut problems,
                )?;
            }
        }

        tracing::info!(
            table = registry.table(),
            columns = registry.len(),
            problems,
            "registry validated against store"
        );
        Ok(problems)
    }

    fn check(&self, condition: bool, message: String, problems: &mut usize) -> Result<()> {
        if condition {
            return Ok(());
        }
        *problems += 1;
        if self.warn_only {
            tracing::warn!("{message}");
            Ok(())
        } else {
            Err(EngineError::Config(message))
        }
    }
}

fn is_numeric(data_type: &str) -> bool {
    let upper = data_type.to_ascii_uppercase();
    [
        "INT", "NUMERIC", "DECIMAL", "DOUBLE", "REAL", "FLOAT", "HUGEINT",
    ]
    .iter()
    .any(|marker| upper.contains(marker))
}

fn is_temporal(data_type: &str) -> bool {
    let upper = data_type.to_ascii_uppercase();
    upper.contains("TIMESTAMP") || upper == "DATE"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ColumnSchema;

    fn schema(columns: &[(&str, &str)]) -> TableSchema {
        TableSchema {
            columns: columns
                .iter()
                .map(|(name, ty)| ColumnSchema {
                    name: name.to_string(),
                    data_type: ty.to_string(),
                })
                .collect(),
        }
    }

    fn registry() -> ColumnRegistry {
        ColumnRegistry::from_yaml(
            r#"
table: bet_transactions
time_column: accepted_datetime_utc
handle_metric: book_risk_component
columns:
  - name: accepted_datetime_utc
    role: dimension
    value_type: timestamp
  - name: sport
    role: dimension
    value_type: text
  - name: client_id
    role: dimension
    value_type: text
  - name: usage_id
    role: dimension
    value_type: text
  - name: market_type
    role: dimension
    value_type: text
  - name: book_risk_component
    role: metric
    value_type: number
  - name: bet_count
    role: metric
    value_type: number
    aggregation: count
"#,
        )
        .unwrap()
    }

    fn full_schema() -> TableSchema {
        schema(&[
            ("accepted_datetime_utc", "timestamp without time zone"),
            ("sport", "character varying"),
            ("client_id", "text"),
            ("usage_id", "text"),
            ("market_type", "text"),
            ("book_risk_component", "numeric"),
        ])
    }

    #[test]
    fn matching_schema_passes() {
        let problems = RegistryValidator::new(false)
            .validate_schema(&registry(), &full_schema())
            .unwrap();
        assert_eq!(problems, 0);
    }

    #[test]
    fn missing_column_fails() {
        let mut table = full_schema();
        table.columns.retain(|c| c.name != "sport");
        let err = RegistryValidator::new(false)
            .validate_schema(&registry(), &table)
            .unwrap_err();
        assert!(err.to_string().contains("sport"), "{err}");
    }

    #[test]
    fn warn_only_counts_problems() {
        let table = schema(&[
            ("accepted_datetime_utc", "VARCHAR"),
            ("book_risk_component", "VARCHAR"),
        ]);
        let problems = RegistryValidator::new(true)
            .validate_schema(&registry(), &table)
            .unwrap();
        // four missing dimensions, a text metric and a text timestamp
        assert_eq!(problems, 6);
    }

    #[test]
    fn missing_table_is_reported() {
        let err = RegistryValidator::new(false)
            .validate_schema(&registry(), &TableSchema::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
