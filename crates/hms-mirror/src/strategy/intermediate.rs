use super::base::{self, CINE_WITH_EXIST, SCHEMA_EXISTS_NO_ACTION_DATA, SCHEMA_EXISTS_SYNC_ACID};
use super::statements::*;
use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::copy_spec::CopySpec;
use crate::messages::MessageCode;
use crate::mirror::{CreateStrategy, Environment, TableMirror};

pub const NON_LEGACY_TO_LEGACY: &str = "Don't support Non-Legacy to Legacy conversions.";

/// Transfer table on the source writes to staging storage; the target
/// loads from a shadow table over that storage.
pub struct IntermediateStrategy;

impl IntermediateStrategy {
    fn refuse_downgrade_direction(mirror: &mut TableMirror) -> bool {
        mirror.add_issue(Environment::Source, NON_LEGACY_TO_LEGACY);
        mirror.add_message(Environment::Source, MessageCode::NonLegacyToLegacy, &[]);
        false
    }
}

impl StrategyHandler for IntermediateStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::Intermediate
    }

    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let config = &ctx.config;
        let source = mirror.env_or_default(Environment::Source);
        let acid = source.is_acid();
        let downgrade = config.migrate_acid.downgrade;
        let common = config.transfer.common_storage.is_some();
        let source_legacy = config.clusters.source.legacy_hive;
        let legacy_mismatch = source_legacy != config.clusters.target.legacy_hive;

        {
            let target = mirror.environment_table_mut(Environment::Target);
            if target.exists {
                let target_acid = target.is_acid();
                if !target_acid && config.clusters.target.create_if_not_exists && config.sync {
                    target.add_issue(CINE_WITH_EXIST);
                    target.create_strategy = CreateStrategy::Create;
                } else if target_acid && config.sync {
                    target.add_issue(SCHEMA_EXISTS_SYNC_ACID);
                    target.create_strategy = CreateStrategy::Replace;
                } else {
                    target.add_issue(SCHEMA_EXISTS_NO_ACTION_DATA);
                    target.create_strategy = CreateStrategy::Nothing;
                    return false;
                }
            } else {
                target.create_strategy = CreateStrategy::Create;
            }
        }

        let mut target_spec = CopySpec::new(Environment::Source, Environment::Target);
        if !acid && source.is_managed() {
            target_spec.set_upgrade(true).set_replace_location(true);
        } else if acid {
            if downgrade {
                if common || config.uses_distcp() {
                    target_spec.set_replace_location(true);
                } else {
                    target_spec.set_strip_location(true);
                }
                target_spec
                    .set_make_external(true)
                    .set_make_non_transactional(true)
                    .set_take_ownership(true);
            } else {
                target_spec.set_strip_location(true);
            }
        } else {
            target_spec.set_replace_location(true);
        }
        if !base::build_table_schema(ctx, mirror, &target_spec) {
            return false;
        }

        let mut transfer_spec = CopySpec::new(Environment::Source, Environment::Transfer);
        if !common {
            if legacy_mismatch {
                if !source_legacy {
                    return Self::refuse_downgrade_direction(mirror);
                }
                transfer_spec.set_make_non_transactional(true);
            } else if source_legacy {
                transfer_spec.set_make_non_transactional(true);
            } else {
                transfer_spec.set_make_external(true).set_take_ownership(true);
            }
        } else {
            transfer_spec.set_make_non_transactional(true);
            if legacy_mismatch {
                if !source_legacy {
                    return Self::refuse_downgrade_direction(mirror);
                }
                transfer_spec.set_make_external(true);
            } else if !source_legacy {
                transfer_spec
                    .set_make_external(true)
                    .set_take_ownership(!downgrade);
            }
        }
        transfer_spec
            .set_table_name_prefix(config.transfer.transfer_prefix.clone())
            .set_replace_location(true);
        if !base::build_table_schema(ctx, mirror, &transfer_spec) {
            return false;
        }

        let staged = (config.transfer.intermediate_storage.is_some() && !acid)
            || (acid && config.migrate_acid.on);
        if staged && (!downgrade || !common) && !config.uses_distcp() {
            let mut shadow_spec = CopySpec::new(Environment::Source, Environment::Shadow);
            shadow_spec
                .set_upgrade(true)
                .set_make_external(true)
                .set_take_ownership(false)
                .set_replace_location(true)
                .set_table_name_prefix(config.transfer.shadow_prefix.clone());
            if !base::build_table_schema(ctx, mirror, &shadow_spec) {
                return false;
            }
        }
        true
    }

    fn build_sql(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let config = &ctx.config;
        let database = mirror.database.clone();
        let source = mirror.env_or_default(Environment::Source);

        let transfer = mirror.env_or_default(Environment::Transfer);
        let transfer_create = base::create_statement(config, mirror, Environment::Transfer);
        {
            let s = mirror.environment_table_mut(Environment::Source);
            s.add_sql(USE_DESC, use_db(&database));
            s.add_sql(DROP_TRANSFER_DESC, drop_table(&transfer.name));
            s.add_sql(CREATE_TRANSFER_DESC, transfer_create);
        }

        mirror
            .environment_table_mut(Environment::Target)
            .add_sql(USE_DESC, use_db(&database));
        if let Some(shadow) = mirror
            .environment_table(Environment::Shadow)
            .filter(|t| t.is_defined())
            .map(|t| t.name.clone())
        {
            let create = base::create_statement(config, mirror, Environment::Shadow);
            let t = mirror.environment_table_mut(Environment::Target);
            t.add_sql(DROP_SHADOW_DESC, drop_table(&shadow));
            t.add_sql(CREATE_SHADOW_DESC, create);
        }

        base::add_table_ddl(ctx, mirror, Environment::Target);
        let target = mirror.env_or_default(Environment::Target);
        if target.create_strategy == CreateStrategy::Create
            && source.is_partitioned()
            && config.transfer.common_storage.is_some()
            && (!source.is_acid() || config.migrate_acid.downgrade)
        {
            mirror
                .environment_table_mut(Environment::Target)
                .add_sql(REPAIR_DESC, msck_repair(&target.name));
        }

        {
            let s = mirror.environment_table_mut(Environment::Source);
            if config.clusters.source.legacy_hive && !config.uses_distcp() {
                s.add_sql(TEZ_DESC, SET_TEZ_AS_EXECUTION_ENGINE);
            }
            s.add_cleanup_sql(CLEANUP_DESC, CLEANUP_NOTE);
            s.add_cleanup_sql(USE_DESC, use_db(&database));
        }

        base::build_transfer_sql(ctx, mirror)
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        vec![
            (Environment::Source, Script::Main),
            (Environment::Target, Script::Main),
            (Environment::Source, Script::Cleanup),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn intermediate_config() -> crate::config::Config {
        let mut cfg = config(DataStrategy::Intermediate);
        cfg.transfer.intermediate_storage = Some("s3a://bucket".into());
        cfg
    }

    #[test]
    fn test_transfer_shadow_and_final() {
        let ctx = context(intermediate_config());
        let mut m = mirror("orders", ORDERS);
        assert!(IntermediateStrategy.plan(&ctx, &mut m));

        let source = actions(&m, Environment::Source);
        assert_eq!(source[0], "USE sales");
        assert_eq!(source[1], "DROP TABLE IF EXISTS hms_mirror_transfer_orders");
        assert!(source[2].starts_with("CREATE TABLE `hms_mirror_transfer_orders`("));
        assert_eq!(source[3], SET_TEZ_AS_EXECUTION_ENGINE);
        assert_eq!(
            source[4],
            "FROM orders INSERT OVERWRITE TABLE hms_mirror_transfer_orders SELECT *"
        );

        let shadow = m.environment_table(Environment::Shadow).unwrap();
        assert_eq!(
            shadow.location().as_deref(),
            Some("s3a://bucket/hms_mirror_working/run1/sales/orders")
        );

        let target = actions(&m, Environment::Target);
        assert_eq!(
            target.last().map(String::as_str),
            Some("DROP TABLE IF EXISTS hms_mirror_shadow_orders")
        );
        assert!(target
            .iter()
            .any(|s| s == "FROM hms_mirror_shadow_orders INSERT OVERWRITE TABLE orders SELECT *"));

        let cleanup = cleanup_actions(&m, Environment::Source);
        assert_eq!(cleanup[0], CLEANUP_NOTE);
        assert_eq!(cleanup[2], "DROP TABLE IF EXISTS hms_mirror_transfer_orders");
    }

    #[test]
    fn test_non_legacy_to_legacy_refused() {
        let mut cfg = intermediate_config();
        cfg.clusters.source.legacy_hive = false;
        cfg.clusters.target.legacy_hive = true;
        let ctx = context(cfg);
        let mut m = mirror("orders", ORDERS);
        assert!(!IntermediateStrategy.plan(&ctx, &mut m));
        assert!(m.messages.contains(MessageCode::NonLegacyToLegacy));
    }

    #[test]
    fn test_existing_acid_target_replaced_on_sync() {
        let mut cfg = intermediate_config();
        cfg.sync = true;
        cfg.migrate_acid.on = true;
        cfg.clusters.source.legacy_hive = false;
        let ctx = context(cfg);
        let mut m = mirror("ledger", ACID_BUCKETED);
        {
            let target = m.environment_table_mut(Environment::Target);
            target.exists = true;
            target.definition = lines(ACID_BUCKETED);
        }
        assert!(IntermediateStrategy.plan(&ctx, &mut m));
        assert_eq!(
            m.environment_table(Environment::Target).unwrap().create_strategy,
            CreateStrategy::Replace
        );
    }
}
