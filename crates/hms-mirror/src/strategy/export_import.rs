use super::base::{self, SCHEMA_EXISTS_NO_ACTION_DATA};
use super::statements::*;
use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::copy_spec::CopySpec;
use crate::mirror::{CreateStrategy, Environment, TableMirror};

pub const EI_NOT_SUPPORTED: &str =
    "Can't process ACID tables, VIEWs, or Non Native Hive Tables with this strategy.";
pub const EI_LEGACY_ACID: &str =
    "Can't process ACID tables with EXPORT_IMPORT between legacy and non-legacy clusters.";
pub const EXPORT_IMPORT_SYNC: &str = "Schema EXISTS in target. Table will be 'dropped' before IMPORT attempt. \
The IMPORT will recreate the table and reload the data.";

/// Staging directory the source exports into and the target imports from.
///
/// Intermediate storage wins over common storage, then the storage
/// migration target namespace, then the source export base directory.
pub(super) fn export_location(ctx: &StrategyContext, mirror: &TableMirror, table: &str) -> String {
    let transfer = &ctx.config.transfer;
    let staging = transfer
        .intermediate_storage
        .as_deref()
        .or(transfer.common_storage.as_deref())
        .or(transfer.target_namespace.as_deref());
    match staging {
        Some(base) => format!(
            "{}/{}/{}/{}/{}",
            base.trim_end_matches('/'),
            transfer.remote_working_directory.trim_matches('/'),
            ctx.run_marker,
            mirror.database,
            table
        ),
        None => format!(
            "{}{}{}/{}",
            ctx.config.clusters.source.namespace.trim_end_matches('/'),
            transfer.export_base_dir_prefix,
            mirror.database,
            table
        ),
    }
}

pub(super) fn export_import_limit(ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
    base::check_partition_limit(
        mirror,
        Environment::Source,
        ctx.config.hybrid.export_import_partition_limit,
        "hybrid->export_import_partition_limit",
    )
}

/// `EXPORT` on the source, `IMPORT` on the target.
pub struct ExportImportStrategy;

impl StrategyHandler for ExportImportStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::ExportImport
    }

    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let config = &ctx.config;
        let source = mirror.env_or_default(Environment::Source);

        if source.is_acid() && config.legacy_migration() {
            mirror.add_issue(Environment::Source, EI_LEGACY_ACID);
            return false;
        }
        if source.is_view() || !source.is_hive_native() {
            mirror.add_issue(Environment::Source, EI_NOT_SUPPORTED);
            return false;
        }

        let mut spec = CopySpec::new(Environment::Source, Environment::Target);
        spec.set_replace_location(true)
            .set_take_ownership(!(config.read_only || config.no_purge));
        if base::converts_managed(config, mirror) {
            spec.set_upgrade(true);
        }

        {
            let target = mirror.environment_table_mut(Environment::Target);
            if target.exists {
                if !config.sync {
                    target.add_issue(SCHEMA_EXISTS_NO_ACTION_DATA);
                    target.create_strategy = CreateStrategy::Leave;
                    return false;
                }
                target.add_issue(EXPORT_IMPORT_SYNC);
            }
            target.create_strategy = CreateStrategy::Create;
        }

        base::build_table_schema(ctx, mirror, &spec)
    }

    fn build_sql(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let config = &ctx.config;
        if !export_import_limit(ctx, mirror) {
            return false;
        }

        let database = mirror.database.clone();
        let source = mirror.env_or_default(Environment::Source);
        let location = export_location(ctx, mirror, &source.name);
        {
            let s = mirror.environment_table_mut(Environment::Source);
            s.add_sql(USE_DESC, use_db(&database));
            s.add_sql(EXPORT_DESC, export_table(&source.name, &location));
        }

        let target_exists = mirror.exists(Environment::Target);
        let target = mirror.env_or_default(Environment::Target);
        let import = if source.is_acid() {
            if config.migrate_acid.downgrade {
                import_external_table(&target.name, &location)
            } else {
                import_table(&target.name, &location)
            }
        } else {
            match target.location() {
                Some(table_location) => import_external_table_at(&target.name, &location, &table_location),
                None => import_external_table(&target.name, &location),
            }
        };

        {
            let t = mirror.environment_table_mut(Environment::Target);
            t.add_sql(USE_DESC, use_db(&database));
            if target_exists && config.sync {
                t.add_sql(DROP_DESC, drop_table(&target.name));
            }
            t.add_sql(IMPORT_DESC, import);
        }
        base::add_owner_sql(ctx, mirror, Environment::Target, &target.name);
        true
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        vec![
            (Environment::Source, Script::Main),
            (Environment::Target, Script::Main),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_export_then_import_at_translated_location() {
        let ctx = context(config(DataStrategy::ExportImport));
        let mut m = mirror("orders", ORDERS);
        assert!(ExportImportStrategy.plan(&ctx, &mut m));

        assert_eq!(
            actions(&m, Environment::Source),
            vec![
                "USE sales".to_string(),
                "EXPORT TABLE orders TO \"hdfs://legacy/apps/hive/warehouse/export_sales/orders\"".to_string(),
            ]
        );
        assert_eq!(
            actions(&m, Environment::Target),
            vec![
                "USE sales".to_string(),
                "IMPORT EXTERNAL TABLE orders FROM \"hdfs://legacy/apps/hive/warehouse/export_sales/orders\" \
                 LOCATION \"hdfs://modern/warehouse/tablespace/sales.db/orders\""
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_common_storage_stages_export_and_import() {
        let mut cfg = config(DataStrategy::ExportImport);
        cfg.transfer.common_storage = Some("s3a://shared".into());
        let ctx = context(cfg);
        let mut m = mirror("orders", ORDERS);
        assert!(ExportImportStrategy.plan(&ctx, &mut m));

        let staging = "s3a://shared/hms_mirror_working/run1/sales/orders";
        assert_eq!(
            actions(&m, Environment::Source)[1],
            format!("EXPORT TABLE orders TO \"{}\"", staging)
        );
        assert_eq!(
            actions(&m, Environment::Target)[1],
            format!(
                "IMPORT EXTERNAL TABLE orders FROM \"{}\" \
                 LOCATION \"s3a://shared/warehouse/tablespace/sales.db/orders\"",
                staging
            )
        );
    }

    #[test]
    fn test_intermediate_storage_wins_over_common_storage() {
        let mut cfg = config(DataStrategy::ExportImport);
        cfg.transfer.intermediate_storage = Some("s3a://bucket/".into());
        cfg.transfer.common_storage = Some("s3a://shared".into());
        let ctx = context(cfg);
        let m = mirror("orders", ORDERS);
        assert_eq!(
            export_location(&ctx, &m, "orders"),
            "s3a://bucket/hms_mirror_working/run1/sales/orders"
        );
    }

    #[test]
    fn test_sync_drops_before_import() {
        let mut cfg = config(DataStrategy::ExportImport);
        cfg.sync = true;
        cfg.transfer.intermediate_storage = Some("s3a://bucket".into());
        let ctx = context(cfg);
        let mut m = mirror("orders", ORDERS);
        m.environment_table_mut(Environment::Target).exists = true;
        assert!(ExportImportStrategy.plan(&ctx, &mut m));

        let target = actions(&m, Environment::Target);
        assert_eq!(target[1], "DROP TABLE IF EXISTS orders");
        assert!(target[2].contains("FROM \"s3a://bucket/hms_mirror_working/run1/sales/orders\""));
        assert!(m
            .environment_table(Environment::Target)
            .unwrap()
            .issues
            .contains(&EXPORT_IMPORT_SYNC.to_string()));
    }

    #[test]
    fn test_existing_target_without_sync_is_left() {
        let ctx = context(config(DataStrategy::ExportImport));
        let mut m = mirror("orders", ORDERS);
        m.environment_table_mut(Environment::Target).exists = true;
        assert!(!ExportImportStrategy.plan(&ctx, &mut m));
        assert_eq!(
            m.environment_table(Environment::Target).unwrap().create_strategy,
            CreateStrategy::Leave
        );
    }

    #[test]
    fn test_views_refused() {
        let ctx = context(config(DataStrategy::ExportImport));
        let mut m = mirror("v", "CREATE VIEW `v` AS select 1");
        assert!(!ExportImportStrategy.plan(&ctx, &mut m));
    }

    #[test]
    fn test_partition_ceiling() {
        let mut cfg = config(DataStrategy::ExportImport);
        cfg.hybrid.export_import_partition_limit = 2;
        let ctx = context(cfg);
        let mut m = with_partitions(mirror("events", EVENTS_PARTITIONED), 3);
        assert!(!ExportImportStrategy.plan(&ctx, &mut m));
        assert!(actions(&m, Environment::Source).is_empty());
    }
}
