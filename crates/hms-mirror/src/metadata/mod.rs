//! Table metadata collection.
//!
//! The planner never talks to a metastore directly. A [`MetadataSource`]
//! fills each [`TableMirror`] with what a cluster reports for a table: the
//! `SHOW CREATE TABLE` lines, owner, partitions and statistics.
//! [`FileMetadataSource`] reads a snapshot captured ahead of time:
//!
//! ```yaml
//! databases:
//!   sales:
//!     orders:
//!       source:
//!         owner: etl
//!         definition: |
//!           CREATE TABLE `sales.orders`(
//!             `id` int)
//!           ...
//!         partitions:
//!           dt=2024-01-01: hdfs://legacy/warehouse/sales.db/orders/dt=2024-01-01
//!       target:
//!         definition: ...
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::mirror::definition;
use crate::mirror::{Environment, TableMirror, FILE_FORMAT, PARTITION_COUNT};

/// Source of table metadata for the visible environments.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Databases known to the source, used when none are configured.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Tables of `database` on the SOURCE cluster.
    async fn list_tables(&self, database: &str) -> Result<Vec<String>>;

    /// Fill `mirror`'s `env` snapshot. A table missing from the environment
    /// is left with `exists = false`.
    async fn load_table(&self, database: &str, mirror: &mut TableMirror, env: Environment) -> Result<()>;

    /// Short name for logs.
    fn source_type(&self) -> &'static str;
}

/// One table as seen by one cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// `SHOW CREATE TABLE` output.
    pub definition: String,
    #[serde(default)]
    pub partitions: BTreeMap<String, String>,
    #[serde(default)]
    pub statistics: BTreeMap<String, String>,
}

/// A table in both visible environments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TableSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TableSnapshot>,
}

impl MirrorSnapshot {
    fn get(&self, env: Environment) -> Option<&TableSnapshot> {
        match env {
            Environment::Source => self.source.as_ref(),
            Environment::Target => self.target.as_ref(),
            _ => None,
        }
    }
}

/// Metadata captured from both clusters, keyed by database then table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    #[serde(default)]
    pub databases: BTreeMap<String, BTreeMap<String, MirrorSnapshot>>,
}

/// [`MetadataSource`] over a YAML or JSON snapshot file.
pub struct FileMetadataSource {
    snapshot: MetadataSnapshot,
}

impl FileMetadataSource {
    /// Read a snapshot; `.json` files are parsed as JSON, anything else as
    /// YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Metadata(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let source = if path.extension().map(|e| e == "json").unwrap_or(false) {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        info!(
            "Loaded metadata snapshot {} ({} databases)",
            path.display(),
            source.snapshot.databases.len()
        );
        Ok(source)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(Self::new(serde_yaml::from_str(yaml)?))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn new(snapshot: MetadataSnapshot) -> Self {
        Self { snapshot }
    }

    fn database(&self, database: &str) -> Result<&BTreeMap<String, MirrorSnapshot>> {
        self.snapshot.databases.get(database).ok_or_else(|| {
            MigrateError::Metadata(format!("Database {} not found in metadata snapshot", database))
        })
    }
}

#[async_trait]
impl MetadataSource for FileMetadataSource {
    async fn list_databases(&self) -> Result<Vec<String>> {
        Ok(self.snapshot.databases.keys().cloned().collect())
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        Ok(self
            .database(database)?
            .iter()
            .filter(|(_, t)| t.source.is_some())
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn load_table(&self, database: &str, mirror: &mut TableMirror, env: Environment) -> Result<()> {
        let snapshot = self
            .database(database)?
            .get(&mirror.name)
            .and_then(|t| t.get(env))
            .cloned();

        let table = mirror.environment_table_mut(env);
        match snapshot {
            Some(snapshot) => {
                table.exists = true;
                table.owner = snapshot.owner;
                table.definition = snapshot.definition.lines().map(str::to_string).collect();
                table.partitions = snapshot.partitions;
                table.statistics = snapshot.statistics;
                if !table.partitions.is_empty() {
                    table
                        .statistics
                        .insert(PARTITION_COUNT.to_string(), table.partitions.len().to_string());
                }
                if let Some(format) = definition::file_format(&table.definition) {
                    table
                        .statistics
                        .entry(FILE_FORMAT.to_string())
                        .or_insert_with(|| format.to_string());
                }
                debug!("{}.{}: loaded {} definition", database, mirror.name, env);
            }
            None => {
                table.exists = false;
                debug!("{}.{}: not present on {}", database, mirror.name, env);
            }
        }
        mirror.mark_collected();
        Ok(())
    }

    fn source_type(&self) -> &'static str {
        "file"
    }
}
