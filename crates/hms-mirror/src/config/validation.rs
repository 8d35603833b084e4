//! Configuration validation.

use super::{Config, DataMovement};
use crate::error::{MigrateError, Result};
use crate::messages::{MessageCode, MessageSet};
use crate::strategy::DataStrategy;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.clusters.source.namespace.is_empty() {
        return Err(MigrateError::Config(
            "clusters.source.namespace is required".into(),
        ));
    }

    let source_only = matches!(
        config.data_strategy,
        DataStrategy::Dump | DataStrategy::StorageMigration
    );
    if !source_only && config.clusters.target.namespace.is_empty() {
        return Err(MigrateError::Config(format!(
            "clusters.target.namespace is required for the {} data strategy",
            config.data_strategy
        )));
    }

    if let Some(0) = config.concurrency {
        return Err(MigrateError::Config(
            "concurrency must be at least 1".into(),
        ));
    }

    if config.transfer.transfer_prefix.is_empty() {
        return Err(MigrateError::Config(
            "transfer.transfer_prefix must not be empty".into(),
        ));
    }
    if config.transfer.shadow_prefix.is_empty() {
        return Err(MigrateError::Config(
            "transfer.shadow_prefix must not be empty".into(),
        ));
    }
    if config.transfer.transfer_prefix == config.transfer.shadow_prefix {
        return Err(MigrateError::Config(
            "transfer.transfer_prefix and transfer.shadow_prefix must differ".into(),
        ));
    }

    if config
        .translator
        .global_location_map
        .keys()
        .any(|k| k.trim().is_empty())
    {
        return Err(MigrateError::Config(
            "translator.global_location_map keys must not be empty".into(),
        ));
    }

    Ok(())
}

/// Evaluate strategy and option combinations.
///
/// Returns every coded error and warning that applies; callers refuse to
/// start a run when the set contains errors.
pub fn evaluate(config: &Config) -> MessageSet {
    let mut messages = MessageSet::new();
    let strategy = config.data_strategy;

    if strategy.is_internal() {
        messages.set(MessageCode::AcidNotTopLevelStrategy);
    }

    if config.sync
        && !matches!(
            strategy,
            DataStrategy::SchemaOnly
                | DataStrategy::Linked
                | DataStrategy::Sql
                | DataStrategy::ExportImport
                | DataStrategy::Hybrid
                | DataStrategy::Common
        )
    {
        messages.set(MessageCode::ValidSyncStrategies);
    }

    if config.acid_enabled()
        && !matches!(
            strategy,
            DataStrategy::SchemaOnly
                | DataStrategy::Dump
                | DataStrategy::Sql
                | DataStrategy::ExportImport
                | DataStrategy::Hybrid
                | DataStrategy::Intermediate
                | DataStrategy::StorageMigration
        )
    {
        messages.set(MessageCode::ValidAcidStrategies);
    }

    if strategy == DataStrategy::Linked {
        if config.transfer.common_storage.is_some() {
            messages.set(MessageCode::CommonStorageWithLinked);
        }
        if config.transfer.intermediate_storage.is_some() {
            messages.set(MessageCode::IntermediateStorageWithLinked);
        }
    }

    if config.clusters.target.legacy_hive && !config.clusters.source.legacy_hive {
        messages.set(MessageCode::LegacyHiveTargetCluster);
    }

    if config.migrate_acid.downgrade && !config.acid_enabled() {
        messages.set(MessageCode::DowngradeOnlyForAcid);
    }

    if config.migrate_acid.in_place {
        if !config.migrate_acid.downgrade {
            messages.set(MessageCode::ReplaceOnlyWithDowngrade);
        }
        if !matches!(
            strategy,
            DataStrategy::Sql | DataStrategy::ExportImport | DataStrategy::Hybrid
        ) {
            messages.set(MessageCode::ValidAcidDowngradeInPlaceStrategies);
        }
        if config.transfer.common_storage.is_some() {
            messages.set(MessageCode::CommonStorageWithDowngradeInPlace);
        }
        if config.transfer.intermediate_storage.is_some() {
            messages.set(MessageCode::IntermediateStorageWithDowngradeInPlace);
        }
        if config.clusters.source.legacy_hive {
            messages.set(MessageCode::DowngradeInPlaceNonLegacy);
        }
    }

    let warehouse = &config.transfer.warehouse;
    if let (Some(managed), Some(external)) =
        (&warehouse.managed_directory, &warehouse.external_directory)
    {
        if managed == external {
            messages.set_with_args(
                MessageCode::WarehouseDirsSameDir,
                [external.clone(), managed.clone()],
            );
        }
    }

    if strategy == DataStrategy::StorageMigration {
        let storage = &config.transfer.storage_migration;
        if config.transfer.target_namespace.is_none() && config.transfer.common_storage.is_none() {
            if config.translator.global_location_map.is_empty() && !config.reset_to_default_location
            {
                messages.set(MessageCode::StorageMigrationRequiredNamespace);
            } else {
                messages.set(MessageCode::StorageMigrationNamespaceSource);
            }
        }
        if storage.data_movement == DataMovement::Sql && storage.data_strategy.is_none() {
            messages.set(MessageCode::StorageMigrationRequiredStrategy);
        }
        if warehouse.managed_directory.is_none() || warehouse.external_directory.is_none() {
            messages.set(MessageCode::StorageMigrationRequiredWarehouseOptions);
        }
        if storage.data_movement == DataMovement::Distcp
            && config.acid_enabled()
            && !config.evaluate_partition_location
        {
            messages.set(MessageCode::StorageMigrationDistcpAcid);
        }
    }

    if config.reset_to_default_location {
        if matches!(
            strategy,
            DataStrategy::Linked | DataStrategy::Common | DataStrategy::Dump
        ) {
            messages.set(MessageCode::ResetToDefaultLocation);
        } else {
            messages.set(MessageCode::ResetToDefaultLocationWarning);
            if warehouse.managed_directory.is_none() && warehouse.external_directory.is_none() {
                messages.set(MessageCode::ResetToDefaultLocationWithoutWarehouseDirs);
            }
        }
    }

    if config.evaluate_partition_location {
        if matches!(
            strategy,
            DataStrategy::SchemaOnly | DataStrategy::Dump | DataStrategy::StorageMigration
        ) {
            messages.set(MessageCode::EvaluatePartitionLocation);
        } else {
            messages.set(MessageCode::EvaluatePartitionLocationUse);
        }
    }

    if let Some(key) = config
        .translator
        .global_location_map
        .keys()
        .find(|k| !k.starts_with('/'))
    {
        messages.set_with_args(
            MessageCode::ConfigurationRemovedOrInvalid,
            [format!(
                "translator.global_location_map key '{}' must be an absolute directory",
                key
            )],
        );
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterConfig, Clusters};

    fn valid_config() -> Config {
        let yaml = r#"
data_strategy: SCHEMA_ONLY
clusters:
  source:
    namespace: hdfs://legacy
    legacy_hive: true
  target:
    namespace: hdfs://modern
"#;
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
        assert!(evaluate(&config).is_empty());
    }

    #[test]
    fn test_missing_source_namespace() {
        let mut config = valid_config();
        config.clusters.source.namespace = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_namespace_allowed_for_dump() {
        let mut config = valid_config();
        config.clusters = Clusters {
            source: config.clusters.source.clone(),
            target: ClusterConfig::default(),
        };
        assert!(validate(&config).is_err());

        config.data_strategy = DataStrategy::Dump;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = valid_config();
        config.concurrency = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_prefixes_rejected() {
        let mut config = valid_config();
        config.transfer.shadow_prefix = config.transfer.transfer_prefix.clone();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_sync_only_for_supported_strategies() {
        let mut config = valid_config();
        config.sync = true;
        config.data_strategy = DataStrategy::Dump;
        let messages = evaluate(&config);
        assert!(messages.contains(MessageCode::ValidSyncStrategies));
        assert!(messages.has_errors());
    }

    #[test]
    fn test_linked_with_storage_options() {
        let mut config = valid_config();
        config.data_strategy = DataStrategy::Linked;
        config.transfer.common_storage = Some("s3a://bucket".into());
        config.transfer.intermediate_storage = Some("s3a://staging".into());
        let messages = evaluate(&config);
        assert!(messages.contains(MessageCode::CommonStorageWithLinked));
        assert!(messages.contains(MessageCode::IntermediateStorageWithLinked));
    }

    #[test]
    fn test_downgrade_in_place_combinations() {
        let mut config = valid_config();
        config.data_strategy = DataStrategy::Sql;
        config.clusters.source.legacy_hive = false;
        config.migrate_acid.on = true;
        config.migrate_acid.in_place = true;
        config.transfer.common_storage = Some("s3a://bucket".into());
        let messages = evaluate(&config);
        assert!(messages.contains(MessageCode::ReplaceOnlyWithDowngrade));
        assert!(messages.contains(MessageCode::CommonStorageWithDowngradeInPlace));
        assert!(!messages.contains(MessageCode::DowngradeInPlaceNonLegacy));
    }

    #[test]
    fn test_internal_strategy_not_top_level() {
        let mut config = valid_config();
        config.data_strategy = DataStrategy::SqlAcidDowngradeInplace;
        assert!(evaluate(&config).contains(MessageCode::AcidNotTopLevelStrategy));
    }

    #[test]
    fn test_storage_migration_requirements() {
        let mut config = valid_config();
        config.data_strategy = DataStrategy::StorageMigration;
        let messages = evaluate(&config);
        assert!(messages.contains(MessageCode::StorageMigrationRequiredNamespace));
        assert!(messages.contains(MessageCode::StorageMigrationRequiredStrategy));
        assert!(messages.contains(MessageCode::StorageMigrationRequiredWarehouseOptions));

        config.transfer.target_namespace = Some("s3a://new".into());
        config.transfer.storage_migration.data_movement = DataMovement::Distcp;
        config.transfer.warehouse.managed_directory = Some("/warehouse/managed".into());
        config.transfer.warehouse.external_directory = Some("/warehouse/external".into());
        assert!(evaluate(&config).is_empty());
    }

    #[test]
    fn test_reset_to_default_location_warnings() {
        let mut config = valid_config();
        config.reset_to_default_location = true;
        let messages = evaluate(&config);
        assert!(!messages.has_errors());
        assert!(messages.contains(MessageCode::ResetToDefaultLocationWarning));
        assert!(messages.contains(MessageCode::ResetToDefaultLocationWithoutWarehouseDirs));

        config.data_strategy = DataStrategy::Linked;
        assert!(evaluate(&config).contains(MessageCode::ResetToDefaultLocation));
    }

    #[test]
    fn test_same_warehouse_dirs() {
        let mut config = valid_config();
        config.transfer.warehouse.managed_directory = Some("/wh".into());
        config.transfer.warehouse.external_directory = Some("/wh".into());
        assert!(evaluate(&config).contains(MessageCode::WarehouseDirsSameDir));
    }

    #[test]
    fn test_relative_location_map_key() {
        let mut config = valid_config();
        config
            .translator
            .global_location_map
            .insert("warehouse".into(), "/new".into());
        assert!(evaluate(&config).contains(MessageCode::ConfigurationRemovedOrInvalid));
    }
}
