//! Configuration type definitions with auto-tuning based on system resources.

use crate::strategy::DataStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use sysinfo::System;
use tracing::info;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let total_memory_gb = sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
        let cpu_cores = sys.cpus().len();

        Self {
            total_memory_gb,
            cpu_cores,
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Strategy applied to every table.
    pub data_strategy: DataStrategy,

    /// Databases to plan.
    #[serde(default)]
    pub databases: Vec<String>,

    /// Source and target cluster definitions.
    pub clusters: Clusters,

    /// Keep the target in step with the source (drop/replace when they differ).
    #[serde(default)]
    pub sync: bool,

    /// Never write to the target filesystem.
    #[serde(default)]
    pub read_only: bool,

    /// Never let the target take ownership (purge) of data.
    #[serde(default)]
    pub no_purge: bool,

    /// Review and rewrite each partition location instead of relying on MSCK.
    #[serde(default)]
    pub evaluate_partition_location: bool,

    /// Drop table locations so the warehouse default applies.
    #[serde(default)]
    pub reset_to_default_location: bool,

    /// Hand generated SQL to the executor. When false the run only plans.
    #[serde(default)]
    pub execute: bool,

    /// Process views instead of tables.
    #[serde(default)]
    pub migrate_view: bool,

    #[serde(default)]
    pub migrate_acid: MigrateAcid,

    #[serde(default)]
    pub hybrid: HybridConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub optimization: Optimization,

    #[serde(default)]
    pub translator: TranslatorConfig,

    #[serde(default)]
    pub ownership_transfer: OwnershipTransfer,

    /// Worker pool size. Auto-tuned from CPU cores if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        if self.concurrency.is_none() {
            let resources = SystemResources::detect();
            resources.log();
            let tuned = resources.cpu_cores.clamp(1, 16);
            info!("Auto-tuned concurrency: {}", tuned);
            self.concurrency = Some(tuned);
        }
        self
    }

    /// Worker pool size shared by metadata collection and strategy execution.
    pub fn get_concurrency(&self) -> usize {
        self.concurrency.unwrap_or(4).max(1)
    }

    /// ACID migration is in play (`on` or `only`).
    pub fn acid_enabled(&self) -> bool {
        self.migrate_acid.on || self.migrate_acid.only
    }

    /// ACID tables are downgraded in place on the source cluster.
    pub fn is_acid_downgrade_in_place(&self) -> bool {
        self.acid_enabled() && self.migrate_acid.downgrade && self.migrate_acid.in_place
    }

    /// Either intermediate or common storage is configured.
    pub fn has_staging_storage(&self) -> bool {
        self.transfer.intermediate_storage.is_some() || self.transfer.common_storage.is_some()
    }

    /// Data moves with distcp instead of SQL.
    pub fn uses_distcp(&self) -> bool {
        self.transfer.storage_migration.data_movement == DataMovement::Distcp
    }

    /// Source and target sit on different Hive major versions.
    pub fn legacy_migration(&self) -> bool {
        self.clusters.source.legacy_hive != self.clusters.target.legacy_hive
    }

    /// Cluster definition for a visible environment.
    pub fn cluster(&self, env: crate::mirror::Environment) -> &ClusterConfig {
        match env {
            crate::mirror::Environment::Source | crate::mirror::Environment::Transfer => {
                &self.clusters.source
            }
            crate::mirror::Environment::Target | crate::mirror::Environment::Shadow => {
                &self.clusters.target
            }
        }
    }
}

/// Source and target cluster definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clusters {
    pub source: ClusterConfig,

    /// Absent for DUMP and STORAGE_MIGRATION, which only touch the source.
    #[serde(default)]
    pub target: ClusterConfig,
}

/// One Hive cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Storage namespace, e.g. `hdfs://prod-ns`.
    #[serde(default)]
    pub namespace: String,

    /// Hive 1/2 (pre-ACIDv2) cluster.
    #[serde(default)]
    pub legacy_hive: bool,

    /// HDP 3 Hive, which behaves differently for sorted dynamic partition inserts.
    #[serde(default)]
    pub hdp_hive3: bool,

    /// Emit CREATE even when the table already exists.
    #[serde(default)]
    pub create_if_not_exists: bool,

    #[serde(default)]
    pub partition_discovery: PartitionDiscovery,
}

/// Partition discovery settings for a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionDiscovery {
    /// Set `discover.partitions` on external partitioned tables.
    #[serde(default = "default_true")]
    pub auto: bool,

    /// Emit `MSCK REPAIR TABLE` after creating a partitioned table.
    #[serde(default = "default_true")]
    pub init_msck: bool,
}

impl Default for PartitionDiscovery {
    fn default() -> Self {
        Self {
            auto: true,
            init_msck: true,
        }
    }
}

/// ACID table handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateAcid {
    /// Migrate ACID tables alongside everything else.
    #[serde(default)]
    pub on: bool,

    /// Migrate only ACID tables.
    #[serde(default)]
    pub only: bool,

    /// Convert ACID tables to EXTERNAL/purge tables.
    #[serde(default)]
    pub downgrade: bool,

    /// Downgrade on the source cluster instead of migrating.
    #[serde(default)]
    pub in_place: bool,

    /// Partition ceiling for ACID transfers (0 disables the check).
    #[serde(default = "default_acid_partition_limit")]
    pub partition_limit: usize,

    /// Bucket definitions at or below this count are dropped on downgrade.
    /// Negative disables bucket removal.
    #[serde(default = "default_artificial_bucket_threshold")]
    pub artificial_bucket_threshold: i32,
}

impl Default for MigrateAcid {
    fn default() -> Self {
        Self {
            on: false,
            only: false,
            downgrade: false,
            in_place: false,
            partition_limit: default_acid_partition_limit(),
            artificial_bucket_threshold: default_artificial_bucket_threshold(),
        }
    }
}

/// Partition thresholds for the HYBRID router and SQL transfers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Above this many partitions EXPORT/IMPORT is not used (0 disables).
    #[serde(default = "default_export_import_partition_limit")]
    pub export_import_partition_limit: usize,

    /// Above this many partitions SQL transfers are refused (0 disables).
    #[serde(default = "default_sql_partition_limit")]
    pub sql_partition_limit: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            export_import_partition_limit: default_export_import_partition_limit(),
            sql_partition_limit: default_sql_partition_limit(),
        }
    }
}

/// Staging, prefixes and storage layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Prefix for source-side transfer tables.
    #[serde(default = "default_transfer_prefix")]
    pub transfer_prefix: String,

    /// Prefix for target-side shadow tables.
    #[serde(default = "default_shadow_prefix")]
    pub shadow_prefix: String,

    /// Directory (under the source namespace) for EXPORT output.
    #[serde(default = "default_export_base_dir_prefix")]
    pub export_base_dir_prefix: String,

    /// Working directory under intermediate/common storage.
    #[serde(default = "default_remote_working_directory")]
    pub remote_working_directory: String,

    /// Storage reachable from both clusters, used only while transferring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_storage: Option<String>,

    /// Storage shared by both clusters; the target keeps using it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_storage: Option<String>,

    /// New namespace for STORAGE_MIGRATION.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,

    #[serde(default)]
    pub warehouse: Warehouse,

    #[serde(default)]
    pub storage_migration: StorageMigration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            transfer_prefix: default_transfer_prefix(),
            shadow_prefix: default_shadow_prefix(),
            export_base_dir_prefix: default_export_base_dir_prefix(),
            remote_working_directory: default_remote_working_directory(),
            intermediate_storage: None,
            common_storage: None,
            target_namespace: None,
            warehouse: Warehouse::default(),
            storage_migration: StorageMigration::default(),
        }
    }
}

/// Warehouse directory overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Warehouse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_directory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_directory: Option<String>,
}

/// How STORAGE_MIGRATION moves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataMovement {
    /// Recreate the table and copy data with SQL.
    #[default]
    Sql,
    /// Point the existing table and partitions at the new location.
    Distcp,
}

/// STORAGE_MIGRATION settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageMigration {
    /// Strategy used to move the data (SQL, EXPORT_IMPORT, HYBRID, SCHEMA_ONLY).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_strategy: Option<DataStrategy>,

    #[serde(default)]
    pub data_movement: DataMovement,
}

/// Transfer SQL tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Optimization {
    /// Use `hive.optimize.sort.dynamic.partition=true` with a declarative insert.
    #[serde(default)]
    pub sort_dynamic_partition_inserts: bool,

    /// Skip all tuning: plain declarative insert.
    #[serde(default)]
    pub skip: bool,

    /// Session settings (`set k=v`) per environment, keyed by
    /// `SOURCE`/`TARGET`/`TRANSFER`/`SHADOW`.
    #[serde(default)]
    pub override_properties: BTreeMap<crate::mirror::Environment, BTreeMap<String, String>>,
}

/// Location translation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Directory prefix remapping. The longest matching key wins.
    #[serde(default)]
    pub global_location_map: BTreeMap<String, String>,

    /// Fail instead of warn when a translated location is outside the warehouse.
    #[serde(default)]
    pub strict: bool,
}

/// Owner handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnershipTransfer {
    /// Emit `ALTER TABLE ... SET OWNER USER ...` after creating tables.
    #[serde(default)]
    pub table: bool,
}

fn default_true() -> bool {
    true
}

fn default_acid_partition_limit() -> usize {
    500
}

fn default_artificial_bucket_threshold() -> i32 {
    2
}

fn default_export_import_partition_limit() -> usize {
    100
}

fn default_sql_partition_limit() -> usize {
    500
}

fn default_transfer_prefix() -> String {
    "hms_mirror_transfer_".to_string()
}

fn default_shadow_prefix() -> String {
    "hms_mirror_shadow_".to_string()
}

fn default_export_base_dir_prefix() -> String {
    "/apps/hive/warehouse/export_".to_string()
}

fn default_remote_working_directory() -> String {
    "hms_mirror_working".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_yaml() {
        let yaml = r#"
data_strategy: SCHEMA_ONLY
clusters:
  source:
    namespace: hdfs://legacy
    legacy_hive: true
  target:
    namespace: hdfs://modern
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.data_strategy, DataStrategy::SchemaOnly);
        assert_eq!(config.migrate_acid.artificial_bucket_threshold, 2);
        assert_eq!(config.migrate_acid.partition_limit, 500);
        assert_eq!(config.hybrid.export_import_partition_limit, 100);
        assert_eq!(config.transfer.shadow_prefix, "hms_mirror_shadow_");
        assert!(config.clusters.target.partition_discovery.auto);
        assert!(config.legacy_migration());
        assert_eq!(config.get_concurrency(), 4);
    }

    #[test]
    fn test_auto_tuning_keeps_explicit_concurrency() {
        let yaml = r#"
data_strategy: SQL
concurrency: 3
clusters:
  source:
    namespace: hdfs://a
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let tuned = config.with_auto_tuning();
        assert_eq!(tuned.get_concurrency(), 3);
    }

    #[test]
    fn test_override_properties_keyed_by_environment() {
        let yaml = r#"
data_strategy: SQL
clusters:
  source:
    namespace: hdfs://a
optimization:
  override_properties:
    TARGET:
      tez.queue.name: migration
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let target = config
            .optimization
            .override_properties
            .get(&crate::mirror::Environment::Target)
            .unwrap();
        assert_eq!(target.get("tez.queue.name").unwrap(), "migration");
    }
}
