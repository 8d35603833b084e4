use super::base;
use super::statements::*;
use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::copy_spec::CopySpec;
use crate::mirror::definition::{self, to_partition_spec, HMS_STORAGE_MIGRATION_FLAG, TRANSLATED_TO_EXTERNAL};
use crate::mirror::{Environment, TableMirror};
use crate::translator::namespace;

pub const ALREADY_MIGRATED: &str = "Table has already been migrated";

/// Move tables to new storage on the same cluster.
///
/// With SQL data movement the table is renamed aside, recreated at the new
/// location and reloaded. With distcp the existing table and its
/// partitions are pointed at the new location and the data is copied
/// outside of Hive.
pub struct StorageMigrationStrategy;

impl StorageMigrationStrategy {
    fn already_migrated(ctx: &StrategyContext, mirror: &TableMirror) -> bool {
        let source = mirror.env_or_default(Environment::Source);
        let warehouse = &ctx.config.transfer.warehouse;
        let dir = if source.is_external() {
            warehouse.external_directory.as_deref()
        } else {
            warehouse.managed_directory.as_deref()
        };
        let (Some(dir), Some(location)) = (dir, source.location()) else {
            return false;
        };
        let prefix = format!(
            "{}{}",
            ctx.translator.target_namespace(),
            namespace::normalize_dir(dir)
        );
        location.starts_with(&prefix)
    }

    fn build_distcp_sql(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let database = mirror.database.clone();
        let source = mirror.env_or_default(Environment::Source);
        mirror
            .environment_table_mut(Environment::Source)
            .add_sql(USE_DESC, use_db(&database));

        let Some(original) = source.location() else {
            mirror.add_issue(Environment::Source, "Table has no location to migrate");
            return false;
        };
        let location = match ctx
            .translator
            .translate_table_location(mirror, &original, 0, None)
        {
            Ok(location) => location,
            Err(e) => {
                mirror.add_issue(Environment::Source, e.to_string());
                return false;
            }
        };
        mirror
            .environment_table_mut(Environment::Source)
            .add_sql(ALTER_LOCATION_DESC, alter_table_location(&source.name, &location));

        let mut ok = true;
        for (spec, partition_location) in &source.partitions {
            let level = spec.matches('/').count() + 1;
            match ctx
                .translator
                .translate_table_location(mirror, partition_location, level, Some(spec))
            {
                Ok(new_location) => {
                    mirror.environment_table_mut(Environment::Source).add_sql(
                        partition_location_desc(spec),
                        alter_partition_location(&source.name, &to_partition_spec(spec), &new_location),
                    );
                }
                Err(e) => {
                    mirror.add_issue(Environment::Source, e.to_string());
                    ok = false;
                }
            }
        }
        ok
    }
}

impl StrategyHandler for StorageMigrationStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::StorageMigration
    }

    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let config = &ctx.config;
        if config.uses_distcp() {
            return true;
        }
        if Self::already_migrated(ctx, mirror) {
            mirror.add_issue(Environment::Source, ALREADY_MIGRATED);
            return false;
        }

        let acid = {
            let source = mirror.environment_table_mut(Environment::Source);
            definition::upsert_property(&mut source.definition, HMS_STORAGE_MIGRATION_FLAG, &ctx.run_timestamp);
            source.is_acid()
        };

        let mut spec = CopySpec::new(Environment::Source, Environment::Target);
        if acid {
            spec.set_strip_location(true);
            if config.migrate_acid.downgrade {
                spec.set_make_external(true).set_take_ownership(true);
            }
        } else {
            spec.set_replace_location(true);
        }
        base::build_table_schema(ctx, mirror, &spec)
    }

    fn build_sql(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let config = &ctx.config;
        if config.uses_distcp() {
            return self.build_distcp_sql(ctx, mirror);
        }

        let (limit, setting) = base::sql_partition_limit(config, mirror);
        if !base::check_partition_limit(mirror, Environment::Source, limit, setting) {
            return false;
        }

        let database = mirror.database.clone();
        let name = mirror.name.clone();
        let renamed = format!("{}_{}_storage_migration", name, ctx.run_marker);
        let create = base::create_statement(config, mirror, Environment::Target);
        {
            let source = mirror.environment_table_mut(Environment::Source);
            source.add_sql(USE_DESC, use_db(&database));
            if definition::has_property(&source.definition, TRANSLATED_TO_EXTERNAL) {
                source.add_sql(UNSET_PROPERTY_DESC, unset_property(&name, TRANSLATED_TO_EXTERNAL));
            }
            source.add_sql(RENAME_DESC, rename_table(&name, &renamed));
            source.name = renamed.clone();
            definition::set_table_name(&mut source.definition, &renamed);
            source.add_sql(CREATE_DESC, create);
            source.add_cleanup_sql(DROP_DESC, drop_table(&renamed));
        }
        base::add_owner_sql(ctx, mirror, Environment::Source, &name);

        if config.clusters.source.legacy_hive {
            mirror
                .environment_table_mut(Environment::Source)
                .add_sql(TEZ_DESC, SET_TEZ_AS_EXECUTION_ENGINE);
        }
        base::add_session_overrides(config, mirror, Environment::Source);
        let count = mirror.source_partition_count();
        base::add_transfer_sql(
            ctx,
            mirror,
            Environment::Source,
            &renamed,
            &name,
            &storage_migration_desc(count),
            TRANSFER_DESC,
        );
        true
    }

    /// The recreate mode drops the renamed original once the reload ran.
    fn execution_plan(&self, _ctx: &StrategyContext, mirror: &TableMirror) -> Vec<(Environment, Script)> {
        let mut plan = vec![(Environment::Source, Script::Main)];
        if mirror
            .environment_table(Environment::Source)
            .map(|t| !t.cleanup_sql.is_empty())
            .unwrap_or(false)
        {
            plan.push((Environment::Source, Script::Cleanup));
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::{Config, DataMovement};
    use crate::mirror::definition::get_property;

    fn storage_config() -> Config {
        let mut cfg = config(DataStrategy::StorageMigration);
        cfg.clusters.source.legacy_hive = false;
        cfg.transfer.target_namespace = Some("s3a://lake".into());
        cfg.transfer.warehouse.external_directory = Some("/warehouse/external".into());
        cfg.transfer.warehouse.managed_directory = Some("/warehouse/managed".into());
        cfg
    }

    #[test]
    fn test_sql_rename_recreate_reload() {
        let ctx = context(storage_config());
        let mut m = mirror("orders", ORDERS);
        assert!(StorageMigrationStrategy.plan(&ctx, &mut m));

        let sql = actions(&m, Environment::Source);
        assert_eq!(sql[0], "USE sales");
        assert_eq!(sql[1], "ALTER TABLE orders RENAME TO orders_run1_storage_migration");
        assert!(sql[2].starts_with("CREATE TABLE `orders`("));
        assert_eq!(
            sql[3],
            "FROM orders_run1_storage_migration INSERT OVERWRITE TABLE orders SELECT *"
        );
        assert_eq!(
            cleanup_actions(&m, Environment::Source),
            vec!["DROP TABLE IF EXISTS orders_run1_storage_migration".to_string()]
        );

        let target = m.environment_table(Environment::Target).unwrap();
        assert_eq!(
            target.location().as_deref(),
            Some("s3a://lake/warehouse/tablespace/sales.db/orders")
        );
        assert!(get_property(&target.definition, HMS_STORAGE_MIGRATION_FLAG).is_some());
    }

    #[test]
    fn test_recreate_runs_cleanup_after_reload() {
        let ctx = context(storage_config());
        let mut m = mirror("orders", ORDERS);
        assert!(StorageMigrationStrategy.plan(&ctx, &mut m));
        assert_eq!(
            StorageMigrationStrategy.execution_plan(&ctx, &m),
            vec![
                (Environment::Source, Script::Main),
                (Environment::Source, Script::Cleanup),
            ]
        );
    }

    #[test]
    fn test_distcp_records_table_and_partition_levels() {
        let mut cfg = storage_config();
        cfg.transfer.storage_migration.data_movement = DataMovement::Distcp;
        let ctx = context(cfg);
        let mut m = with_partitions(mirror("events", EVENTS_PARTITIONED), 1);
        assert!(StorageMigrationStrategy.plan(&ctx, &mut m));
        assert_eq!(
            StorageMigrationStrategy.execution_plan(&ctx, &m),
            vec![(Environment::Source, Script::Main)]
        );

        let record = ctx.translator.locations("sales").unwrap();
        let levels: Vec<(String, usize)> = record
            .get(Environment::Source)
            .unwrap()
            .iter()
            .map(|t| (t.target.clone(), t.level))
            .collect();
        assert!(levels.contains(&("s3a://lake/warehouse/external/sales.db/events".to_string(), 0)));
        assert!(levels.contains(&("s3a://lake/warehouse/external/sales.db/events/dt=0".to_string(), 1)));
    }

    #[test]
    fn test_distcp_alters_locations() {
        let mut cfg = storage_config();
        cfg.transfer.storage_migration.data_movement = DataMovement::Distcp;
        let ctx = context(cfg);
        let mut m = with_partitions(mirror("events", EVENTS_PARTITIONED), 2);
        assert!(StorageMigrationStrategy.plan(&ctx, &mut m));

        assert_eq!(
            actions(&m, Environment::Source),
            vec![
                "USE sales".to_string(),
                "ALTER TABLE events SET LOCATION \"s3a://lake/warehouse/external/sales.db/events\"".to_string(),
                "ALTER TABLE events PARTITION (dt=\"0\") SET LOCATION \
                 \"s3a://lake/warehouse/external/sales.db/events/dt=0\""
                    .to_string(),
                "ALTER TABLE events PARTITION (dt=\"1\") SET LOCATION \
                 \"s3a://lake/warehouse/external/sales.db/events/dt=1\""
                    .to_string(),
            ]
        );
        assert!(m.definition(Environment::Target).is_empty());
    }

    #[test]
    fn test_already_migrated_table_skipped() {
        let ctx = context(storage_config());
        let ddl = EVENTS_PARTITIONED.replace(
            "hdfs://legacy/warehouse/external/sales.db/events",
            "s3a://lake/warehouse/external/sales.db/events",
        );
        let mut m = mirror("events", &ddl);
        assert!(!StorageMigrationStrategy.plan(&ctx, &mut m));
        assert!(m
            .environment_table(Environment::Source)
            .unwrap()
            .issues
            .contains(&ALREADY_MIGRATED.to_string()));
    }
}
