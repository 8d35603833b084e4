use super::base::{self, ACID_NOT_ENABLED};
use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::copy_spec::CopySpec;
use crate::mirror::{definition, CreateStrategy, Environment, TableMirror};
use crate::resolver;

/// Schema only; data moves separately (distcp).
pub struct SchemaOnlyStrategy;

impl StrategyHandler for SchemaOnlyStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::SchemaOnly
    }

    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let config = &ctx.config;
        let source = mirror.env_or_default(Environment::Source);

        let mut spec = CopySpec::new(Environment::Source, Environment::Target);
        spec.set_replace_location(true);
        if base::converts_managed(config, mirror) {
            spec.set_upgrade(true);
        }
        spec.set_take_ownership(
            !source.is_external() && !(config.read_only || config.sync || config.no_purge),
        );

        if !resolver::apply(config, mirror, Environment::Source, Environment::Target) {
            return false;
        }

        let acid = source.is_acid();
        if acid {
            spec.set_strip_location(true);
        }
        if acid && !config.acid_enabled() {
            mirror.add_issue(Environment::Source, ACID_NOT_ENABLED);
            mirror.environment_table_mut(Environment::Target).create_strategy = CreateStrategy::Nothing;
            return false;
        }

        if !base::build_table_schema(ctx, mirror, &spec) {
            return false;
        }
        if acid && !config.clusters.source.legacy_hive {
            definition::strip_location(&mut mirror.environment_table_mut(Environment::Source).definition);
        }
        true
    }

    fn build_sql(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        base::avro_check(ctx, mirror) && base::build_schema_sql(ctx, mirror, Environment::Target)
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        vec![(Environment::Target, Script::Main)]
    }
}
