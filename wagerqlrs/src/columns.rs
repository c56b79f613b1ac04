//! Column registry: the closed allow-list of identifiers a generated query may reference.
//!
//! The registry is built once at startup, either from the built-in list for the
//! `bet_transactions` table or from an explicit YAML file. It is never derived
//! from the live table. Every dimension or metric name that reaches the query
//! compiler has been resolved here first.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// How a column may be used in an aggregation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Dimension,
    Metric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Number,
    Text,
    Timestamp,
}

/// Aggregate applied when a metric is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Sum,
    /// Row count; the descriptor is virtual and has no physical column.
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDescriptor {
    pub name: String,
    pub role: ColumnRole,
    pub value_type: ValueType,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ColumnDescriptor {
    pub fn dimension(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            role: ColumnRole::Dimension,
            value_type,
            aggregation: Aggregation::Sum,
            description: None,
        }
    }

    pub fn metric(name: &str) -> Self {
        Self {
            name: name.to_string(),
            role: ColumnRole::Metric,
            value_type: ValueType::Number,
            aggregation: Aggregation::Sum,
            description: None,
        }
    }

    pub fn count(name: &str) -> Self {
        Self {
            aggregation: Aggregation::Count,
            ..Self::metric(name)
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn is_dimension(&self) -> bool {
        self.role == ColumnRole::Dimension
    }

    pub fn is_metric(&self) -> bool {
        self.role == ColumnRole::Metric
    }

    pub fn is_count(&self) -> bool {
        self.is_metric() && self.aggregation == Aggregation::Count
    }
}

/// On-disk shape of a registry file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    table: String,
    time_column: String,
    handle_metric: String,
    #[serde(default)]
    count_metric: Option<String>,
    columns: Vec<ColumnDescriptor>,
}

pub const DEFAULT_TABLE: &str = "bet_transactions";
pub const DEFAULT_TIME_COLUMN: &str = "accepted_datetime_utc";
pub const DEFAULT_HANDLE_METRIC: &str = "book_risk_component";
pub const DEFAULT_COUNT_METRIC: &str = "bet_count";

#[derive(Debug, Clone)]
pub struct ColumnRegistry {
    table: String,
    time_column: String,
    handle_metric: String,
    count_metric: Option<String>,
    columns: BTreeMap<String, ColumnDescriptor>,
}

impl ColumnRegistry {
    /// Build a registry from an explicit column list.
    ///
    /// Fails when a name is listed twice, when `time_column` is not a timestamp
    /// dimension, or when `handle_metric` is not a metric.
    pub fn new(
        table: impl Into<String>,
        time_column: impl Into<String>,
        handle_metric: impl Into<String>,
        columns: Vec<ColumnDescriptor>,
    ) -> Result<Self> {
        let mut by_name = BTreeMap::new();
        let mut count_metric = None;
        for column in columns {
            if column.name.is_empty() {
                return Err(EngineError::Config(
                    "registry column with empty name".to_string(),
                ));
            }
            if column.is_count() && count_metric.is_none() {
                count_metric = Some(column.name.clone());
            }
            if let Some(previous) = by_name.insert(column.name.clone(), column) {
                return Err(EngineError::Config(format!(
                    "column {} listed more than once in registry",
                    previous.name
                )));
            }
        }

        let registry = Self {
            table: table.into(),
            time_column: time_column.into(),
            handle_metric: handle_metric.into(),
            count_metric,
            columns: by_name,
        };
        registry.check_anchors()?;
        Ok(registry)
    }

    fn check_anchors(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(EngineError::Config("registry table name is empty".to_string()));
        }
        match self.columns.get(&self.time_column) {
            Some(col) if col.is_dimension() && col.value_type == ValueType::Timestamp => {}
            _ => {
                return Err(EngineError::Config(format!(
                    "time column {} must be a registered timestamp dimension",
                    self.time_column
                )))
            }
        }
        match self.columns.get(&self.handle_metric) {
            Some(col) if col.is_metric() && !col.is_count() => {}
            _ => {
                return Err(EngineError::Config(format!(
                    "handle metric {} must be a registered summed metric",
                    self.handle_metric
                )))
            }
        }
        if let Some(name) = &self.count_metric {
            if !self.columns.get(name).is_some_and(|c| c.is_count()) {
                return Err(EngineError::Config(format!(
                    "count metric {name} must be a registered count metric"
                )));
            }
        }
        Ok(())
    }

    /// The default allow-list for the wagering transaction table.
    pub fn builtin() -> Self {
        use ValueType::{Text, Timestamp};

        let columns = vec![
            ColumnDescriptor::dimension(DEFAULT_TIME_COLUMN, Timestamp)
                .with_description("time the wager was accepted (UTC)"),
            ColumnDescriptor::dimension("market_type", Text),
            ColumnDescriptor::dimension("sport_id", Text),
            ColumnDescriptor::dimension("sport", Text),
            ColumnDescriptor::dimension("stat_type", Text),
            ColumnDescriptor::dimension("bet_type", Text),
            ColumnDescriptor::dimension("team_abbreviation", Text),
            ColumnDescriptor::dimension("position_abbreviation", Text),
            ColumnDescriptor::dimension("player_id", Text),
            ColumnDescriptor::dimension("player_name", Text),
            ColumnDescriptor::dimension("client_id", Text),
            ColumnDescriptor::dimension("client_name", Text),
            ColumnDescriptor::dimension("usage_id", Text),
            ColumnDescriptor::dimension("in_play", Text),
            ColumnDescriptor::metric(DEFAULT_HANDLE_METRIC)
                .with_description("stake at risk; summed as bet handle"),
            ColumnDescriptor::metric("book_profit_gross")
                .with_description("gross book profit, may be negative"),
            ColumnDescriptor::metric("line_movement"),
            ColumnDescriptor::metric("bet_price"),
            ColumnDescriptor::count(DEFAULT_COUNT_METRIC).with_description("number of wagers"),
        ];

        Self {
            table: DEFAULT_TABLE.to_string(),
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            handle_metric: DEFAULT_HANDLE_METRIC.to_string(),
            count_metric: Some(DEFAULT_COUNT_METRIC.to_string()),
            columns: columns.into_iter().map(|c| (c.name.clone(), c)).collect(),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let file: RegistryFile = serde_yaml::from_str(contents)?;
        let mut registry = Self::new(file.table, file.time_column, file.handle_metric, file.columns)?;
        if let Some(count) = file.count_metric {
            registry.count_metric = Some(count);
            registry.check_anchors()?;
        }
        Ok(registry)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let registry = Self::from_yaml(&contents)?;
        tracing::info!(
            path = %path.as_ref().display(),
            table = %registry.table,
            columns = registry.columns.len(),
            "loaded column registry"
        );
        Ok(registry)
    }

    /// Point the registry at a different physical table (e.g. a schema-qualified name).
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn time_column(&self) -> &ColumnDescriptor {
        &self.columns[&self.time_column]
    }

    pub fn handle_metric(&self) -> &ColumnDescriptor {
        &self.columns[&self.handle_metric]
    }

    pub fn count_metric(&self) -> Option<&ColumnDescriptor> {
        self.count_metric.as_ref().and_then(|n| self.columns.get(n))
    }

    pub fn resolve(&self, name: &str) -> Result<&ColumnDescriptor> {
        self.columns
            .get(name)
            .ok_or_else(|| EngineError::InvalidColumn(format!("unknown column `{name}`")))
    }

    pub fn resolve_dimension(&self, name: &str) -> Result<&ColumnDescriptor> {
        let column = self.resolve(name)?;
        if !column.is_dimension() {
            return Err(EngineError::InvalidColumn(format!(
                "column `{name}` is a metric, not a dimension"
            )));
        }
        Ok(column)
    }

    pub fn resolve_metric(&self, name: &str) -> Result<&ColumnDescriptor> {
        let column = self.resolve(name)?;
        if !column.is_metric() {
            return Err(EngineError::InvalidColumn(format!(
                "column `{name}` is a dimension, not a metric"
            )));
        }
        Ok(column)
    }

    /// All registered descriptors, ordered by name.
    pub fn descriptors(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.values()
    }

    /// Descriptors backed by a physical column (virtual count metrics excluded).
    pub fn physical_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.values().filter(|c| !c.is_count())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
