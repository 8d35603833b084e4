use super::base;
use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::copy_spec::CopySpec;
use crate::mirror::{CreateStrategy, Environment, TableMirror};
use crate::resolver;

pub const CANT_LINK: &str =
    "Can't LINK ACID tables or Non Native Hive tables. They can't be shared between clusters.";

/// Target table reads the source data in place and never owns it.
pub struct LinkedStrategy;

impl StrategyHandler for LinkedStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::Linked
    }

    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let config = &ctx.config;
        let source = mirror.env_or_default(Environment::Source);
        if source.is_defined() && (source.is_acid() || !source.is_hive_native()) {
            mirror.add_issue(Environment::Source, CANT_LINK);
            mirror.environment_table_mut(Environment::Target).create_strategy = CreateStrategy::Nothing;
            return false;
        }

        let mut spec = CopySpec::new(Environment::Source, Environment::Target);
        spec.set_replace_location(false);
        if base::converts_managed(config, mirror) {
            spec.set_upgrade(true);
        }
        spec.set_take_ownership(false);

        if !resolver::apply(config, mirror, Environment::Source, Environment::Target) {
            return false;
        }
        base::build_table_schema(ctx, mirror, &spec)
    }

    fn build_sql(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        base::build_schema_sql(ctx, mirror, Environment::Target)
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        vec![(Environment::Target, Script::Main)]
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_linked_keeps_source_location() {
        let ctx = context(config(DataStrategy::Linked));
        let mut m = mirror("events", EVENTS_PARTITIONED);
        assert!(LinkedStrategy.plan(&ctx, &mut m));
        let target = m.environment_table(Environment::Target).unwrap();
        assert_eq!(target.location(), m.environment_table(Environment::Source).unwrap().location());
        assert!(!target.is_external_purge());
    }

    #[test]
    fn test_linked_refuses_acid() {
        let ctx = context(config(DataStrategy::Linked));
        let mut m = mirror("ledger", ACID_BUCKETED);
        assert!(!LinkedStrategy.plan(&ctx, &mut m));
        assert!(m
            .environment_table(Environment::Source)
            .unwrap()
            .issues
            .contains(&CANT_LINK.to_string()));
    }
}
