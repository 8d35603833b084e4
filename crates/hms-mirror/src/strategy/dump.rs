use super::base;
use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::copy_spec::CopySpec;
use crate::mirror::{CreateStrategy, Environment, TableMirror};

/// Source DDL only, cleaned up for replay; nothing runs.
pub struct DumpStrategy;

impl StrategyHandler for DumpStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::Dump
    }

    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let acid = mirror.env_or_default(Environment::Source).is_acid();
        let mut spec = CopySpec::new(Environment::Source, Environment::Source);
        if acid && !ctx.config.clusters.source.legacy_hive {
            spec.set_strip_location(true);
        }
        if !base::build_table_schema(ctx, mirror, &spec) {
            return false;
        }
        mirror.environment_table_mut(Environment::Source).create_strategy = CreateStrategy::Create;
        true
    }

    fn build_sql(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        base::build_schema_sql(ctx, mirror, Environment::Source)
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        Vec::new()
    }
}
