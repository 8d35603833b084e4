use super::base;
use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::copy_spec::CopySpec;
use crate::mirror::{CreateStrategy, Environment, TableMirror};
use crate::resolver;

pub const CANT_SHARE_ACID: &str = "Can't transfer SCHEMA reference on COMMON storage for ACID tables.";

/// Both clusters see the same storage; the target table takes over the data.
pub struct CommonStrategy;

impl StrategyHandler for CommonStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::Common
    }

    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let config = &ctx.config;
        let source = mirror.env_or_default(Environment::Source);
        if source.is_acid() {
            let target = mirror.environment_table_mut(Environment::Target);
            target.add_issue(CANT_SHARE_ACID);
            target.create_strategy = CreateStrategy::Nothing;
            return false;
        }

        let mut spec = CopySpec::new(Environment::Source, Environment::Target);
        spec.set_take_ownership(!(config.read_only || config.no_purge));

        if !resolver::apply(config, mirror, Environment::Source, Environment::Target) {
            return false;
        }
        if config.sync {
            spec.set_take_ownership(false);
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
    fn test_common_takes_ownership_of_external() {
        let ctx = context(config(DataStrategy::Common));
        let mut m = mirror("events", EVENTS_PARTITIONED);
        assert!(CommonStrategy.plan(&ctx, &mut m));
        let target = m.environment_table(Environment::Target).unwrap();
        assert!(target.is_external_purge());
        assert_eq!(target.location(), m.environment_table(Environment::Source).unwrap().location());
    }

    #[test]
    fn test_common_sync_disowns() {
        let mut cfg = config(DataStrategy::Common);
        cfg.sync = true;
        let ctx = context(cfg);
        let mut m = mirror("events", EVENTS_PARTITIONED);
        assert!(CommonStrategy.plan(&ctx, &mut m));
        assert!(!m.environment_table(Environment::Target).unwrap().is_external_purge());
    }

    #[test]
    fn test_common_refuses_acid() {
        let ctx = context(config(DataStrategy::Common));
        let mut m = mirror("ledger", ACID_BUCKETED);
        assert!(!CommonStrategy.plan(&ctx, &mut m));
    }
}
