//! Per-environment table snapshot.

use super::definition;
use super::CreateStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistic key for the partition count.
pub const PARTITION_COUNT: &str = "partition.count";
/// Statistic key for the inferred storage format.
pub const FILE_FORMAT: &str = "file.format";

/// One described statement in an ordered script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlPair {
    pub description: String,
    pub action: String,
}

impl SqlPair {
    pub fn new(description: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            action: action.into(),
        }
    }
}

/// Snapshot of one table in one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentTable {
    pub name: String,
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub create_strategy: CreateStrategy,
    /// `SHOW CREATE TABLE` output, one entry per line.
    #[serde(default)]
    pub definition: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Partition spec (`a=1/b=2`) to location.
    #[serde(default)]
    pub partitions: BTreeMap<String, String>,
    #[serde(default)]
    pub sql: Vec<SqlPair>,
    #[serde(default)]
    pub cleanup_sql: Vec<SqlPair>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    /// Properties upserted into the definition when it is built.
    #[serde(default)]
    pub add_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub statistics: BTreeMap<String, String>,
}

impl EnvironmentTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_sql(&mut self, description: impl Into<String>, action: impl Into<String>) {
        self.sql.push(SqlPair::new(description, action));
    }

    pub fn add_cleanup_sql(&mut self, description: impl Into<String>, action: impl Into<String>) {
        self.cleanup_sql.push(SqlPair::new(description, action));
    }

    pub fn add_issue(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Queue a property for the next definition build and apply it now.
    pub fn add_property(&mut self, key: &str, value: &str) {
        self.add_properties.insert(key.to_string(), value.to_string());
        definition::upsert_property(&mut self.definition, key, value);
    }

    /// A definition has been built or collected for this environment.
    pub fn is_defined(&self) -> bool {
        !self.definition.is_empty()
    }

    pub fn is_partitioned(&self) -> bool {
        !self.partitions.is_empty() || definition::is_partitioned(&self.definition)
    }

    /// Partition count: the collected partition map, or the recorded
    /// statistic when partitions were summarised.
    pub fn partition_count(&self) -> usize {
        if !self.partitions.is_empty() {
            return self.partitions.len();
        }
        self.statistics
            .get(PARTITION_COUNT)
            .and_then(|c| c.parse().ok())
            .unwrap_or(0)
    }

    pub fn is_acid(&self) -> bool {
        definition::is_acid(&self.definition)
    }

    pub fn is_managed(&self) -> bool {
        definition::is_managed(&self.definition)
    }

    pub fn is_external(&self) -> bool {
        definition::is_external(&self.definition)
    }

    pub fn is_external_purge(&self) -> bool {
        definition::is_external_purge(&self.definition)
    }

    pub fn is_view(&self) -> bool {
        definition::is_view(&self.definition)
    }

    pub fn is_hive_native(&self) -> bool {
        definition::is_hive_native(&self.definition)
    }

    pub fn location(&self) -> Option<String> {
        definition::location(&self.definition)
    }

    pub fn file_format(&self) -> Option<String> {
        self.statistics
            .get(FILE_FORMAT)
            .cloned()
            .or_else(|| definition::file_format(&self.definition).map(str::to_string))
    }

    /// Drop planning output while keeping collected metadata.
    pub fn clear_plan(&mut self) {
        self.create_strategy = CreateStrategy::Nothing;
        self.sql.clear();
        self.cleanup_sql.clear();
        self.issues.clear();
        self.errors.clear();
    }
}
