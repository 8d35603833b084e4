use super::base::{
    self, ACID_NOT_ENABLED, SCHEMA_EXISTS_NO_ACTION_DATA, SCHEMA_WILL_BE_CREATED, SQL_SYNC_W_CINE,
};
use super::statements::{use_db, CREATE_SHADOW_DESC, DROP_SHADOW_DESC, USE_DESC};
use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::copy_spec::CopySpec;
use crate::mirror::{CreateStrategy, Environment, TableMirror};
use crate::resolver;

fn is_acid_source(mirror: &TableMirror) -> bool {
    mirror
        .environment_table(Environment::Source)
        .map(|t| t.is_acid())
        .unwrap_or(false)
}

/// `INSERT OVERWRITE` from a shadow table that points at the source data.
///
/// Tables that need a staging table (ACID, or intermediate/common storage
/// configured) are routed to INTERMEDIATE. ACID tables are refused unless
/// ACID migration is enabled.
pub struct SqlStrategy;

impl StrategyHandler for SqlStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::Sql
    }

    fn route(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> Option<DataStrategy> {
        let acid = is_acid_source(mirror);
        if acid && !ctx.config.acid_enabled() {
            return None;
        }
        if ctx.config.has_staging_storage() || acid {
            Some(DataStrategy::Intermediate)
        } else {
            None
        }
    }

    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let config = &ctx.config;
        if is_acid_source(mirror) && !config.acid_enabled() {
            mirror.add_issue(Environment::Source, ACID_NOT_ENABLED);
            mirror.environment_table_mut(Environment::Target).create_strategy = CreateStrategy::Nothing;
            return false;
        }
        if !mirror.exists(Environment::Source) {
            return resolver::apply(config, mirror, Environment::Source, Environment::Target);
        }

        {
            let target = mirror.environment_table_mut(Environment::Target);
            if target.exists {
                if config.sync && config.clusters.target.create_if_not_exists {
                    target.add_issue(SQL_SYNC_W_CINE);
                    target.create_strategy = CreateStrategy::Create;
                } else {
                    target.add_issue(SCHEMA_EXISTS_NO_ACTION_DATA);
                    target.create_strategy = CreateStrategy::Leave;
                    return false;
                }
            } else {
                target.add_issue(SCHEMA_WILL_BE_CREATED);
                target.create_strategy = CreateStrategy::Create;
            }
        }

        let converts = base::converts_managed(config, mirror);
        let source = mirror.env_or_default(Environment::Source);

        if config.transfer.common_storage.is_none() {
            let mut shadow = CopySpec::new(Environment::Source, Environment::Shadow);
            if converts {
                shadow.set_upgrade(true);
            }
            shadow
                .set_take_ownership(false)
                .set_table_name_prefix(config.transfer.shadow_prefix.clone());
            if !base::build_table_schema(ctx, mirror, &shadow) {
                return false;
            }
        }

        let mut spec = CopySpec::new(Environment::Source, Environment::Target);
        spec.set_replace_location(true);
        if converts {
            spec.set_upgrade(true);
        } else {
            spec.set_make_external(true);
        }
        if config.read_only {
            spec.set_take_ownership(false);
        } else if source.is_managed() {
            spec.set_take_ownership(true);
        }
        if config.no_purge {
            spec.set_take_ownership(false);
        }
        base::build_table_schema(ctx, mirror, &spec)
    }

    fn build_sql(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        if !base::avro_check(ctx, mirror) {
            return false;
        }
        let create_strategy = mirror.env_or_default(Environment::Target).create_strategy;
        if create_strategy == CreateStrategy::Drop {
            return base::build_schema_sql(ctx, mirror, Environment::Target);
        }

        let use_stmt = use_db(&mirror.database);
        mirror
            .environment_table_mut(Environment::Target)
            .add_sql(USE_DESC, use_stmt);

        if let Some(shadow) = mirror
            .environment_table(Environment::Shadow)
            .filter(|t| t.is_defined())
            .map(|t| t.name.clone())
        {
            let create = base::create_statement(&ctx.config, mirror, Environment::Shadow);
            let target = mirror.environment_table_mut(Environment::Target);
            target.add_sql(DROP_SHADOW_DESC, super::statements::drop_table(&shadow));
            target.add_sql(CREATE_SHADOW_DESC, create);
        }

        base::add_table_ddl(ctx, mirror, Environment::Target);
        base::build_transfer_sql(ctx, mirror)
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        vec![(Environment::Target, Script::Main)]
    }
}
