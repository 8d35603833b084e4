//! Definition and SQL builders shared by the strategies.

use tracing::debug;

use super::statements::*;
use super::{DataStrategy, StrategyContext};
use crate::config::Config;
use crate::copy_spec::CopySpec;
use crate::messages::MessageCode;
use crate::mirror::definition::{self, *};
use crate::mirror::{CreateStrategy, Environment, TableMirror};
use crate::translator::{build_partition_add_statement, namespace};

pub const VIEW_AS_IS: &str = "This is a VIEW.  It will be translated AS-IS.  View transitions will NOT honor \
target db name changes NOR will they handle object references that don't exist in the target cluster.";
pub const NOT_NATIVE: &str = "This is not a NATIVE Hive table. It will be translated 'AS-IS'. If the libraries \
or dependencies required for this table definition are not available on the target cluster, the 'create' statement may fail.";
pub const LEGACY_CONVERTED: &str = "Schema 'converted' from LEGACY managed to EXTERNAL";
pub const OWNERSHIP_NOT_ALLOWED: &str = "Ownership of the data not allowed in this scenario, PURGE flag NOT set.";
pub const OWNERSHIP_NOT_SET: &str = "Ownership (PURGE Option) not set because of either: `sync` or \
`ro|read-only` was specified in the config.";
pub const OWNERSHIP_IMPLIED: &str = "Table upgraded from LEGACY managed without an explicit ownership setting. \
Ownership of the data was assumed.";
pub const ACID_LOCATION_STRIPPED: &str =
    "Location Stripped from ACID definition.  Location element in 'CREATE' not allowed in Hive3+";
pub const DOWNGRADED_LOCATION_STRIPPED: &str = "Location Stripped from 'Downgraded' ACID definition.  Location will \
be the default external location as configured by the database/environment.";
pub const ACID_NOT_ENABLED: &str =
    "ACID table migration not enabled. Set 'migrate_acid.on' to migrate ACID tables.";
pub const NO_SOURCE_DEFINITION: &str = "No definition was collected for the source table.";
pub const SCHEMA_WILL_BE_CREATED: &str = "Schema will be created";
pub const SQL_SYNC_W_CINE: &str = "The schema already exists and you've asked for 'sync'.  The target tables schema \
will remain in place and the tables data will be overwritten via SQL. NOTE: If the table is partitioned and source \
partitions are deleted, those will NOT be removed through this process and may lead to data inconsistencies.";
pub const SCHEMA_EXISTS_NO_ACTION_DATA: &str =
    "Schema exists already. Drop it and try again or add `sync` to OVERWRITE current tables data.";
pub const SCHEMA_EXISTS_SYNC_ACID: &str = "Schema already exists.  You've specified 'sync', the target table will \
be dropped and re-created.  The data will be overwritten.";
pub const CINE_WITH_EXIST: &str = "Schema exists already.  But you've specified 'create_if_not_exists', which will \
attempt to create and softly fail and continue with the remainder sql statements for the table.";

/// Legacy managed tables become EXTERNAL when moving to a non-legacy cluster.
pub fn converts_managed(config: &Config, mirror: &TableMirror) -> bool {
    config.clusters.source.legacy_hive
        && !config.clusters.target.legacy_hive
        && mirror
            .environment_table(Environment::Source)
            .map(|t| t.is_managed() && !t.is_acid())
            .unwrap_or(false)
}

/// Derive `spec.target()`'s definition from `spec.source()`'s.
///
/// A source that doesn't exist builds nothing and succeeds, so sync runs can
/// still plan a DROP for the target.
pub fn build_table_schema(ctx: &StrategyContext, mirror: &mut TableMirror, spec: &CopySpec) -> bool {
    let config = &ctx.config;
    let source_env = spec.source();
    let target_env = spec.target();
    let source = mirror.env_or_default(source_env);

    if !source.exists && !source.is_defined() {
        debug!("{}: no {} table, nothing to build", mirror.qualified_name(), source_env);
        return true;
    }
    if !source.is_defined() {
        mirror.add_issue(source_env, NO_SOURCE_DEFINITION);
        return false;
    }

    let strategy = mirror.strategy.unwrap_or(config.data_strategy);
    let source_acid = source.is_acid();
    let downgrade = config.migrate_acid.downgrade;

    {
        let target = mirror.environment_table_mut(target_env);
        target.name = source.name.clone();
        target.definition = source.definition.clone();
    }

    if source.is_view() {
        mirror.add_issue(source_env, VIEW_AS_IS);
        return true;
    }
    if !source.is_hive_native() {
        mirror.add_issue(source_env, NOT_NATIVE);
        return true;
    }

    let explicit_location = spec.location().map(str::to_string);
    let mut converted = false;
    {
        let target = mirror.environment_table_mut(target_env);
        strip_database(&mut target.definition);
        if let Some(location) = &explicit_location {
            set_location(&mut target.definition, location);
        }

        if !source_acid {
            if spec.upgrade() && source.is_managed() {
                converted = make_external(&mut target.definition);
                target.add_issue(LEGACY_CONVERTED);
                target.add_property(HMS_MIRROR_LEGACY_MANAGED_FLAG, "true");
                target.add_property(HMS_MIRROR_CONVERTED_FLAG, "true");
                if spec.ownership_requested().is_none() {
                    target.add_issue(OWNERSHIP_IMPLIED);
                }
                if config.read_only || config.sync {
                    target.add_issue(OWNERSHIP_NOT_SET);
                } else if config.no_purge || spec.ownership_requested() == Some(false) {
                    target.add_issue(OWNERSHIP_NOT_ALLOWED);
                } else {
                    upsert_property(&mut target.definition, EXTERNAL_TABLE_PURGE, "true");
                }
            } else {
                if spec.make_external() {
                    converted = make_external(&mut target.definition);
                }
                if spec.take_ownership() && is_external(&target.definition) {
                    upsert_property(&mut target.definition, EXTERNAL_TABLE_PURGE, "true");
                }
            }
        } else {
            if spec.make_non_transactional() {
                remove_property(&mut target.definition, TRANSACTIONAL);
                remove_property(&mut target.definition, TRANSACTIONAL_PROPERTIES);
                remove_property(&mut target.definition, BUCKETING_VERSION);
            }
            if spec.make_external() {
                converted = make_external(&mut target.definition);
            }
            if spec.take_ownership()
                && (target_env == Environment::Transfer || (downgrade && !config.no_purge))
            {
                upsert_property(&mut target.definition, EXTERNAL_TABLE_PURGE, "true");
            }
            if spec.strip_location() {
                target.add_issue(if downgrade {
                    DOWNGRADED_LOCATION_STRIPPED
                } else {
                    ACID_LOCATION_STRIPPED
                });
                definition::strip_location(&mut target.definition);
            }
            if downgrade && spec.make_external() {
                make_external(&mut target.definition);
                converted = true;
                if !config.no_purge {
                    upsert_property(&mut target.definition, EXTERNAL_TABLE_PURGE, "true");
                }
                upsert_property(&mut target.definition, DOWNGRADED_FROM_ACID, "true");
            }
            let threshold = config.migrate_acid.artificial_bucket_threshold;
            let buckets = num_buckets(&source.definition);
            if remove_buckets(&mut target.definition, threshold) {
                target.add_issue(format!(
                    "Bucket Definition removed (was {}) because it was EQUAL TO or BELOW the configured \
                     'artificialBucketThreshold' of {}",
                    buckets, threshold
                ));
            }
        }

        if target_env == Environment::Target {
            target.add_property(HMS_MIRROR_METADATA_FLAG, &ctx.run_timestamp);
        }

        if let Some(prefix) = spec.table_name_prefix() {
            let new_name = format!("{}{}", prefix, source.name);
            set_table_name(&mut target.definition, &new_name);
            target.name = new_name;
        }

        for key in STATISTICS_PROPERTIES {
            remove_property(&mut target.definition, key);
        }

        if config.cluster(target_env).partition_discovery.auto
            && is_partitioned(&target.definition)
            && (converted || is_external(&target.definition))
        {
            upsert_property(&mut target.definition, DISCOVER_PARTITIONS, "true");
        }
    }
    if explicit_location.is_some() {
        mirror.add_message(target_env, MessageCode::TableLocationForced, &[]);
    }

    let mut translated_location = explicit_location.clone();
    match target_env {
        Environment::Source | Environment::Target => {
            if explicit_location.is_none() {
                if spec.replace_location() && (!source_acid || downgrade) {
                    if let Some(original) = source.location() {
                        match ctx
                            .translator
                            .translate_table_location(mirror, &original, 1, None)
                        {
                            Ok(location) => {
                                set_location(
                                    &mut mirror.environment_table_mut(target_env).definition,
                                    &location,
                                );
                                translated_location = Some(location);
                            }
                            Err(e) => {
                                mirror.add_issue(target_env, e.to_string());
                                return false;
                            }
                        }
                    }
                } else if spec.strip_location() {
                    definition::strip_location(&mut mirror.environment_table_mut(target_env).definition);
                }

                let warehouse = &config.transfer.warehouse;
                if config.reset_to_default_location
                    && warehouse.managed_directory.is_none()
                    && warehouse.external_directory.is_none()
                {
                    definition::strip_location(&mut mirror.environment_table_mut(target_env).definition);
                    translated_location = None;
                    mirror.add_message(target_env, MessageCode::ResetToDefaultLocationWarning, &[]);
                }
            }
            if mirror.remapped {
                mirror.add_message(target_env, MessageCode::TableLocationRemapped, &[]);
            }
        }
        Environment::Transfer | Environment::Shadow => {
            if explicit_location.is_none() && spec.replace_location() {
                let transfer = &config.transfer;
                let staged = if let Some(storage) = &transfer.intermediate_storage {
                    Some(format!(
                        "{}/{}/{}/{}/{}",
                        storage.trim_end_matches('/'),
                        transfer.remote_working_directory.trim_matches('/'),
                        ctx.run_marker,
                        mirror.database,
                        mirror.name
                    ))
                } else if transfer.target_namespace.is_some() {
                    let original = source.location().unwrap_or_default();
                    match ctx
                        .translator
                        .translate_table_location(mirror, &original, 1, None)
                    {
                        Ok(location) => Some(location),
                        Err(e) => {
                            mirror.add_issue(target_env, e.to_string());
                            return false;
                        }
                    }
                } else if spec.strip_location() {
                    None
                } else {
                    Some(format!(
                        "{}{}{}/{}",
                        config.clusters.source.namespace.trim_end_matches('/'),
                        transfer.export_base_dir_prefix.trim_end_matches('/'),
                        mirror.database,
                        mirror.name
                    ))
                };
                let target = mirror.environment_table_mut(target_env);
                match &staged {
                    Some(location) => {
                        set_location(&mut target.definition, location);
                    }
                    None => {
                        definition::strip_location(&mut target.definition);
                    }
                }
                translated_location = staged;
            }
        }
    }

    if config.evaluate_partition_location && source.is_partitioned() && !source_acid {
        match ctx.translator.translate_partition_locations(
            mirror,
            target_env,
            translated_location.as_deref(),
        ) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                mirror.add_issue(target_env, e.to_string());
                return false;
            }
        }
    }

    let target_cluster = config.cluster(target_env);
    let target = mirror.environment_table_mut(target_env);
    match target_env {
        Environment::Transfer => {
            let flag = if strategy == DataStrategy::ExportImport {
                HMS_MIRROR_STORAGE_IMPORT_FLAG
            } else {
                HMS_MIRROR_STORAGE_SQL_FLAG
            };
            target.add_property(flag, "true");
        }
        Environment::Shadow => target.add_property(HMS_MIRROR_SHADOW_FLAG, "true"),
        _ => {}
    }

    let queued: Vec<(String, String)> = target
        .add_properties
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for (key, value) in &queued {
        upsert_property(&mut target.definition, key, value);
    }

    if (!spec.take_ownership() && strategy != DataStrategy::StorageMigration)
        || target_env == Environment::Shadow
    {
        remove_property(&mut target.definition, EXTERNAL_TABLE_PURGE);
    }
    if target_cluster.legacy_hive && strategy != DataStrategy::StorageMigration {
        remove_property(&mut target.definition, EXTERNAL_TABLE_PURGE);
        remove_property(&mut target.definition, DISCOVER_PARTITIONS);
        remove_property(&mut target.definition, BUCKETING_VERSION);
    }

    true
}

/// The `CREATE` statement for `env`. Clusters with `create_if_not_exists`
/// get the `IF NOT EXISTS` form.
pub fn create_statement(config: &Config, mirror: &TableMirror, env: Environment) -> String {
    let cine = config.cluster(env).create_if_not_exists;
    mirror
        .definition(env)
        .iter()
        .map(|line| {
            if cine && line.starts_with(CREATE_EXTERNAL_TABLE) {
                line.replacen(CREATE_EXTERNAL_TABLE, "CREATE EXTERNAL TABLE IF NOT EXISTS", 1)
            } else if cine && line.starts_with(CREATE_TABLE) {
                line.replacen(CREATE_TABLE, "CREATE TABLE IF NOT EXISTS", 1)
            } else {
                line.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Partition ceiling check; exceeding it records an issue and a
/// `PARTITION_LIMIT_EXCEEDED` error on `env`.
pub fn check_partition_limit(
    mirror: &mut TableMirror,
    env: Environment,
    limit: usize,
    setting: &str,
) -> bool {
    let count = mirror.source_partition_count();
    if limit == 0 || count <= limit {
        return true;
    }
    mirror.add_issue(
        env,
        format!(
            "The number of partitions: {} exceeds the configuration limit ({}) of {}. This value is used to \
             abort migrations that have a high potential for failure. The migration will need to be done \
             manually OR try increasing the limit.",
            count, setting, limit
        ),
    );
    let args = [mirror.qualified_name(), limit.to_string()];
    mirror.add_message(env, MessageCode::PartitionLimitExceeded, &args);
    false
}

/// Partition ceiling that applies to SQL data movement of this table.
pub fn sql_partition_limit(config: &Config, mirror: &TableMirror) -> (usize, &'static str) {
    let acid = mirror
        .environment_table(Environment::Source)
        .map(|t| t.is_acid())
        .unwrap_or(false);
    if acid {
        (config.migrate_acid.partition_limit, "migrate_acid->partition_limit")
    } else {
        (config.hybrid.sql_partition_limit, "hybrid->sql_partition_limit")
    }
}

/// Configured `set k=v` overrides for `env`.
pub fn add_session_overrides(config: &Config, mirror: &mut TableMirror, env: Environment) {
    let Some(overrides) = config.optimization.override_properties.get(&env) else {
        return;
    };
    let table = mirror.environment_table_mut(env);
    for (key, value) in overrides {
        table.add_sql(setting_desc(key), set_session(key, value));
    }
}

/// `INSERT OVERWRITE` from `from` into `into`, run on `run_on`. Partitioned
/// tables get the sort session settings and the declarative or prescriptive
/// form chosen by the optimization settings.
pub fn add_transfer_sql(
    ctx: &StrategyContext,
    mirror: &mut TableMirror,
    run_on: Environment,
    from: &str,
    into: &str,
    partitioned_desc: &str,
    plain_desc: &str,
) {
    let config = &ctx.config;
    let cluster = config.cluster(run_on);
    let source = mirror.env_or_default(Environment::Source);
    let elements = partition_elements(&source.definition).filter(|_| source.is_partitioned());
    let table = mirror.environment_table_mut(run_on);

    let Some(elements) = elements else {
        table.add_sql(plain_desc, insert_overwrite(from, into));
        return;
    };

    let sort = |table: &mut crate::mirror::EnvironmentTable, value: &str| {
        table.add_sql(setting_desc(SORT_DYNAMIC_PARTITION), set_session(SORT_DYNAMIC_PARTITION, value));
    };
    let threshold = |table: &mut crate::mirror::EnvironmentTable, value: &str| {
        table.add_sql(
            setting_desc(SORT_DYNAMIC_PARTITION_THRESHOLD),
            set_session(SORT_DYNAMIC_PARTITION_THRESHOLD, value),
        );
    };

    if config.optimization.skip {
        if !cluster.legacy_hive {
            sort(table, "false");
        }
        table.add_sql(partitioned_desc, insert_overwrite_declarative(from, into, &elements));
    } else if config.optimization.sort_dynamic_partition_inserts {
        if !cluster.legacy_hive {
            sort(table, "true");
            if !cluster.hdp_hive3 {
                threshold(table, "0");
            }
        }
        table.add_sql(partitioned_desc, insert_overwrite_declarative(from, into, &elements));
    } else {
        if !cluster.legacy_hive {
            sort(table, "false");
            if !cluster.hdp_hive3 {
                threshold(table, "-1");
            }
        }
        table.add_sql(
            partitioned_desc,
            insert_overwrite_prescriptive(from, into, &elements, &elements),
        );
    }
}

/// Source to transfer table SQL on the source cluster, with the transfer
/// table dropped on cleanup.
pub fn build_source_to_transfer_sql(ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
    let transfer = match mirror.environment_table(Environment::Transfer) {
        Some(t) if t.is_defined() => t.name.clone(),
        _ => return true,
    };
    let source_name = mirror.env_or_default(Environment::Source).name;
    add_session_overrides(&ctx.config, mirror, Environment::Source);
    let count = mirror.source_partition_count();
    add_transfer_sql(
        ctx,
        mirror,
        Environment::Source,
        &source_name,
        &transfer,
        &transfer_partition_desc(count),
        TRANSFER_DESC,
    );
    mirror
        .environment_table_mut(Environment::Source)
        .add_cleanup_sql(DROP_TRANSFER_DESC, drop_table(&transfer));
    true
}

/// Shadow to final table SQL on the target cluster, dropping the shadow.
pub fn build_shadow_to_final_sql(ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
    let source = mirror.env_or_default(Environment::Source);
    if !source.is_acid() && ctx.config.transfer.target_namespace.is_some() {
        return true;
    }
    let shadow = match mirror.environment_table(Environment::Shadow) {
        Some(t) if t.is_defined() => t.name.clone(),
        _ => return true,
    };
    let target_name = mirror.env_or_default(Environment::Target).name;

    if source.is_partitioned() {
        mirror
            .environment_table_mut(Environment::Target)
            .add_sql(REPAIR_DESC, msck_repair(&shadow));
    }
    add_session_overrides(&ctx.config, mirror, Environment::Target);
    add_transfer_sql(
        ctx,
        mirror,
        Environment::Target,
        &shadow,
        &target_name,
        &load_from_partitioned_shadow_desc(source.partition_count()),
        LOAD_FROM_SHADOW_DESC,
    );
    mirror
        .environment_table_mut(Environment::Target)
        .add_sql(DROP_SHADOW_DESC, drop_table(&shadow));
    true
}

/// Data movement for SQL-based strategies: partition ceiling, source to
/// transfer, then either the distcp hand-off or shadow to final.
pub fn build_transfer_sql(ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
    let config = &ctx.config;
    let (limit, setting) = sql_partition_limit(config, mirror);
    if !check_partition_limit(mirror, Environment::Source, limit, setting) {
        return false;
    }

    if !build_source_to_transfer_sql(ctx, mirror) {
        return false;
    }

    if config.uses_distcp() {
        mirror
            .environment_table_mut(Environment::Source)
            .add_sql("distcp specified", DISTCP_NOTE);
        let partitioned = mirror.env_or_default(Environment::Source).is_partitioned();
        let target = mirror.environment_table_mut(Environment::Target);
        target.add_sql("distcp specified", DISTCP_TARGET_NOTE);
        if partitioned {
            let name = target.name.clone();
            target.add_cleanup_sql(REPAIR_DESC, msck_repair(&name));
        }
        true
    } else if config.transfer.target_namespace.is_none() {
        build_shadow_to_final_sql(ctx, mirror)
    } else {
        true
    }
}

/// `ALTER TABLE ... SET OWNER` for `env` when ownership transfer is on.
pub fn add_owner_sql(ctx: &StrategyContext, mirror: &mut TableMirror, env: Environment, table: &str) {
    let config = &ctx.config;
    if config.cluster(env).legacy_hive || !config.ownership_transfer.table {
        return;
    }
    let Some(owner) = mirror.env_or_default(Environment::Source).owner else {
        return;
    };
    mirror
        .environment_table_mut(env)
        .add_sql(SET_OWNER_DESC, set_owner(table, &owner));
}

/// DDL for `env`'s create strategy: DROP, REPLACE (drop and create) or
/// CREATE with the owner. Expects the database to be selected already.
pub fn add_table_ddl(ctx: &StrategyContext, mirror: &mut TableMirror, env: Environment) {
    let table = mirror.env_or_default(env);
    let name = table.name.clone();
    match table.create_strategy {
        CreateStrategy::Nothing | CreateStrategy::Leave | CreateStrategy::AmendParts => {}
        CreateStrategy::Drop => {
            mirror
                .environment_table_mut(env)
                .add_sql(DROP_DESC, drop_table(&name));
        }
        CreateStrategy::Replace => {
            let create = create_statement(&ctx.config, mirror, env);
            let t = mirror.environment_table_mut(env);
            if t.is_view() {
                t.add_sql(DROP_DESC, drop_view(&name));
            } else {
                t.add_sql(DROP_DESC, drop_table(&name));
            }
            t.add_sql(CREATE_DESC, create);
        }
        CreateStrategy::Create => {
            let create = create_statement(&ctx.config, mirror, env);
            mirror.environment_table_mut(env).add_sql(CREATE_DESC, create);
            add_owner_sql(ctx, mirror, env, &name);
        }
    }
}

/// Schema DDL for `env` from its create strategy, followed by partition
/// registration for partitioned non-ACID tables.
pub fn build_schema_sql(ctx: &StrategyContext, mirror: &mut TableMirror, env: Environment) -> bool {
    let config = &ctx.config;
    let create_strategy = mirror.env_or_default(env).create_strategy;
    if matches!(create_strategy, CreateStrategy::Nothing | CreateStrategy::Leave) {
        return true;
    }
    let use_stmt = use_db(&mirror.database);
    mirror.environment_table_mut(env).add_sql(USE_DESC, use_stmt);
    add_table_ddl(ctx, mirror, env);
    if create_strategy == CreateStrategy::Drop {
        return true;
    }

    let source = mirror.env_or_default(Environment::Source);
    let cluster = config.cluster(env);
    let t = mirror.environment_table_mut(env);
    if source.is_partitioned() && !source.is_acid() && !t.is_view() {
        let name = t.name.clone();
        if config.evaluate_partition_location && !t.partitions.is_empty() {
            let body = build_partition_add_statement(t);
            t.add_sql(ADD_PARTITIONS_DESC, add_partitions(&name, &body));
        } else if cluster.partition_discovery.init_msck {
            if config.uses_distcp() {
                t.add_cleanup_sql(REPAIR_DESC, msck_repair(&name));
            } else {
                t.add_sql(REPAIR_DESC, msck_repair(&name));
            }
        }
    }
    true
}

/// Point an AVRO schema URL at the target namespace. The schema file itself
/// has to be copied separately.
pub fn avro_check(ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
    let source = mirror.env_or_default(Environment::Source);
    let Some(url) = get_property(&source.definition, AVRO_SCHEMA_URL) else {
        return true;
    };
    if namespace::get_namespace(&url).is_none() {
        mirror.add_issue(
            Environment::Target,
            format!(
                "AVRO Schema URL appears to be relative: {}. No table definition adjustments.",
                url
            ),
        );
        return true;
    }
    let new_url = namespace::replace_namespace(&url, &ctx.translator.target_namespace());
    let target = mirror.environment_table_mut(Environment::Target);
    if target.is_defined() {
        upsert_property(&mut target.definition, AVRO_SCHEMA_URL, &new_url);
    }
    target.add_issue(format!(
        "AVRO Schema URL was {} and is now {}. The schema file needs to be copied to the new location.",
        url, new_url
    ));
    true
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn copy(target: Environment) -> CopySpec {
        CopySpec::new(Environment::Source, target)
    }

    #[test]
    fn test_missing_source_builds_nothing() {
        let ctx = context(config(DataStrategy::SchemaOnly));
        let mut m = TableMirror::new("sales", "gone");
        assert!(build_table_schema(&ctx, &mut m, &copy(Environment::Target)));
        assert!(m.definition(Environment::Target).is_empty());
    }

    #[test]
    fn test_legacy_upgrade_converts_and_owns() {
        let ctx = context(config(DataStrategy::SchemaOnly));
        let mut m = mirror("orders", ORDERS);
        let mut spec = copy(Environment::Target);
        spec.set_upgrade(true).set_replace_location(true);
        assert!(build_table_schema(&ctx, &mut m, &spec));

        let target = m.environment_table(Environment::Target).unwrap();
        assert!(target.is_external());
        assert!(target.issues.iter().any(|i| i == LEGACY_CONVERTED));
        assert_eq!(
            get_property(&target.definition, EXTERNAL_TABLE_PURGE).as_deref(),
            Some("true")
        );
        assert_eq!(
            get_property(&target.definition, HMS_MIRROR_CONVERTED_FLAG).as_deref(),
            Some("true")
        );
        assert_eq!(
            target.location().as_deref(),
            Some("hdfs://modern/warehouse/tablespace/sales.db/orders")
        );
        assert!(get_property(&target.definition, "numRows").is_none());
        assert_eq!(table_name(&target.definition).as_deref(), Some("orders"));
    }

    #[test]
    fn test_upgrade_withholds_purge_for_read_only_and_sync() {
        for (read_only, sync) in [(true, false), (false, true)] {
            let mut cfg = config(DataStrategy::SchemaOnly);
            cfg.read_only = read_only;
            cfg.sync = sync;
            let ctx = context(cfg);
            let mut m = mirror("orders", ORDERS);
            let mut spec = copy(Environment::Target);
            spec.set_upgrade(true).set_take_ownership(true);
            assert!(build_table_schema(&ctx, &mut m, &spec));

            let target = m.environment_table(Environment::Target).unwrap();
            assert!(target.is_external());
            assert!(!target.is_external_purge());
            assert!(target.issues.iter().any(|i| i == OWNERSHIP_NOT_SET));
        }
    }

    #[test]
    fn test_upgrade_honors_explicit_disown() {
        let ctx = context(config(DataStrategy::Linked));
        let mut m = mirror("orders", ORDERS);
        let mut spec = copy(Environment::Target);
        spec.set_upgrade(true).set_take_ownership(false);
        assert!(build_table_schema(&ctx, &mut m, &spec));

        let target = m.environment_table(Environment::Target).unwrap();
        assert!(!target.is_external_purge());
        assert!(target.issues.iter().any(|i| i == OWNERSHIP_NOT_ALLOWED));
        assert!(!target.issues.iter().any(|i| i == OWNERSHIP_IMPLIED));
    }

    #[test]
    fn test_upgrade_without_ownership_instruction_is_flagged() {
        let ctx = context(config(DataStrategy::SchemaOnly));
        let mut m = mirror("orders", ORDERS);
        let mut spec = copy(Environment::Target);
        spec.set_upgrade(true);
        assert!(build_table_schema(&ctx, &mut m, &spec));
        let target = m.environment_table(Environment::Target).unwrap();
        assert!(target.issues.iter().any(|i| i == OWNERSHIP_IMPLIED));
        assert!(target.is_external_purge());

        let mut m = mirror("orders", ORDERS);
        spec.set_take_ownership(true);
        assert!(build_table_schema(&ctx, &mut m, &spec));
        let target = m.environment_table(Environment::Target).unwrap();
        assert!(!target.issues.iter().any(|i| i == OWNERSHIP_IMPLIED));
    }

    #[test]
    fn test_no_purge_blocks_purge_flag() {
        let mut cfg = config(DataStrategy::SchemaOnly);
        cfg.no_purge = true;
        let ctx = context(cfg);
        let mut m = mirror("orders", ORDERS);
        let mut spec = copy(Environment::Target);
        spec.set_upgrade(true);
        assert!(build_table_schema(&ctx, &mut m, &spec));
        assert!(!is_external_purge(m.definition(Environment::Target)));
    }

    #[test]
    fn test_acid_bucket_threshold_is_inclusive() {
        let mut cfg = config(DataStrategy::Sql);
        cfg.migrate_acid.on = true;
        cfg.migrate_acid.downgrade = true;
        let ctx = context(cfg.clone());
        let mut m = mirror("ledger", ACID_BUCKETED);
        let mut spec = copy(Environment::Target);
        spec.set_make_external(true).set_take_ownership(true);
        assert!(build_table_schema(&ctx, &mut m, &spec));
        let target = m.environment_table(Environment::Target).unwrap();
        assert_eq!(num_buckets(&target.definition), 0);
        assert!(target
            .issues
            .iter()
            .any(|i| i.contains("Bucket Definition removed (was 2)")));
        assert_eq!(
            get_property(&target.definition, DOWNGRADED_FROM_ACID).as_deref(),
            Some("true")
        );

        cfg.migrate_acid.artificial_bucket_threshold = 1;
        let ctx = context(cfg);
        let mut m = mirror("ledger", ACID_BUCKETED);
        assert!(build_table_schema(&ctx, &mut m, &spec));
        assert_eq!(num_buckets(m.definition(Environment::Target)), 2);
    }

    #[test]
    fn test_shadow_never_owns_data_and_keeps_source_location() {
        let ctx = context(config(DataStrategy::Sql));
        let mut m = mirror("orders", ORDERS);
        let mut spec = copy(Environment::Shadow);
        spec.set_upgrade(true)
            .set_take_ownership(false)
            .set_table_name_prefix("hms_mirror_shadow_");
        assert!(build_table_schema(&ctx, &mut m, &spec));

        let shadow = m.environment_table(Environment::Shadow).unwrap();
        assert_eq!(shadow.name, "hms_mirror_shadow_orders");
        assert!(!shadow.is_external_purge());
        assert_eq!(
            shadow.location().as_deref(),
            Some("hdfs://legacy/warehouse/tablespace/sales.db/orders")
        );
        assert_eq!(
            get_property(&shadow.definition, HMS_MIRROR_SHADOW_FLAG).as_deref(),
            Some("true")
        );
    }

    #[test]
    fn test_transfer_location_in_intermediate_storage() {
        let mut cfg = config(DataStrategy::Intermediate);
        cfg.transfer.intermediate_storage = Some("s3a://bucket/".into());
        let ctx = context(cfg);
        let mut m = mirror("orders", ORDERS);
        let mut spec = copy(Environment::Transfer);
        spec.set_replace_location(true)
            .set_table_name_prefix("hms_mirror_transfer_");
        assert!(build_table_schema(&ctx, &mut m, &spec));
        assert_eq!(
            m.environment_table(Environment::Transfer).unwrap().location().as_deref(),
            Some("s3a://bucket/hms_mirror_working/run1/sales/orders")
        );
    }

    #[test]
    fn test_transfer_location_defaults_to_export_prefix() {
        let ctx = context(config(DataStrategy::Intermediate));
        let mut m = mirror("orders", ORDERS);
        let mut spec = copy(Environment::Transfer);
        spec.set_replace_location(true);
        assert!(build_table_schema(&ctx, &mut m, &spec));
        assert_eq!(
            m.environment_table(Environment::Transfer).unwrap().location().as_deref(),
            Some("hdfs://legacy/apps/hive/warehouse/export_sales/orders")
        );
    }

    #[test]
    fn test_view_copied_as_is() {
        let ctx = context(config(DataStrategy::SchemaOnly));
        let mut m = mirror("v", "CREATE VIEW `v` AS select 1");
        assert!(build_table_schema(&ctx, &mut m, &copy(Environment::Target)));
        assert_eq!(m.definition(Environment::Target), m.definition(Environment::Source));
        assert!(m
            .environment_table(Environment::Source)
            .unwrap()
            .issues
            .contains(&VIEW_AS_IS.to_string()));
    }

    #[test]
    fn test_partition_limit_is_exclusive() {
        let mut at_limit = with_partitions(mirror("events", EVENTS_PARTITIONED), 3);
        assert!(check_partition_limit(&mut at_limit, Environment::Source, 3, "x"));

        let mut over = with_partitions(mirror("events", EVENTS_PARTITIONED), 4);
        assert!(!check_partition_limit(&mut over, Environment::Source, 3, "x"));
        assert!(over.messages.contains(MessageCode::PartitionLimitExceeded));

        let mut unlimited = with_partitions(mirror("events", EVENTS_PARTITIONED), 4);
        assert!(check_partition_limit(&mut unlimited, Environment::Source, 0, "x"));
    }

    #[test]
    fn test_prescriptive_transfer_with_sort_settings() {
        let mut cfg = config(DataStrategy::Sql);
        cfg.clusters.target.hdp_hive3 = true;
        let ctx = context(cfg);
        let mut m = with_partitions(mirror("events", EVENTS_PARTITIONED), 2);
        add_transfer_sql(
            &ctx,
            &mut m,
            Environment::Target,
            "shadow",
            "events",
            "partitioned",
            "plain",
        );
        assert_eq!(
            actions(&m, Environment::Target),
            vec![
                "set hive.optimize.sort.dynamic.partition=false".to_string(),
                "FROM shadow INSERT OVERWRITE TABLE events PARTITION (`dt`) SELECT * DISTRIBUTE BY `dt`"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_legacy_cluster_gets_no_sort_settings() {
        let mut cfg = config(DataStrategy::Sql);
        cfg.optimization.sort_dynamic_partition_inserts = true;
        let ctx = context(cfg);
        let mut m = with_partitions(mirror("events", EVENTS_PARTITIONED), 2);
        add_transfer_sql(&ctx, &mut m, Environment::Source, "events", "t", "p", "plain");
        assert_eq!(
            actions(&m, Environment::Source),
            vec!["FROM events INSERT OVERWRITE TABLE t PARTITION (`dt`) SELECT *".to_string()]
        );
    }

    #[test]
    fn test_create_if_not_exists_form() {
        let mut cfg = config(DataStrategy::SchemaOnly);
        cfg.clusters.target.create_if_not_exists = true;
        let mut m = mirror("orders", ORDERS);
        m.environment_table_mut(Environment::Target).definition =
            lines("CREATE EXTERNAL TABLE `orders`(\n  `id` int)");
        assert!(create_statement(&cfg, &m, Environment::Target)
            .starts_with("CREATE EXTERNAL TABLE IF NOT EXISTS `orders`("));
    }
}
