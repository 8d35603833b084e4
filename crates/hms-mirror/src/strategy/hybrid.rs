use super::base::ACID_NOT_ENABLED;
use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::mirror::{CreateStrategy, Environment, TableMirror};

/// Picks EXPORT_IMPORT, SQL or INTERMEDIATE per table.
///
/// ACID tables crossing the legacy boundary need a staging table. Tables
/// with more partitions than the EXPORT_IMPORT ceiling go through SQL.
/// Everything else is exported and imported.
pub struct HybridStrategy;

impl StrategyHandler for HybridStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::Hybrid
    }

    fn route(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> Option<DataStrategy> {
        let config = &ctx.config;
        let source = mirror.env_or_default(Environment::Source);

        if source.is_acid() {
            if !config.acid_enabled() {
                return None;
            }
            if config.legacy_migration() {
                return Some(DataStrategy::Intermediate);
            }
        }

        let limit = config.hybrid.export_import_partition_limit;
        let count = source.partition_count();
        if source.is_partitioned() && limit > 0 && count > limit {
            mirror.add_issue(
                Environment::Target,
                format!(
                    "The number of partitions: {} exceeds the EXPORT_IMPORT partition limit \
                     (hybrid->exportImportPartitionLimit) of {}.  Hence, the SQL method has been \
                     selected for the migration.",
                    count, limit
                ),
            );
            return Some(DataStrategy::Sql);
        }
        Some(DataStrategy::ExportImport)
    }

    // Reached only when routing declined the table.
    fn build_definition(&self, _ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        mirror.add_issue(Environment::Source, ACID_NOT_ENABLED);
        mirror.environment_table_mut(Environment::Target).create_strategy = CreateStrategy::Nothing;
        false
    }

    fn build_sql(&self, _ctx: &StrategyContext, _mirror: &mut TableMirror) -> bool {
        true
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_small_tables_export_import() {
        let ctx = context(config(DataStrategy::Hybrid));
        let mut m = with_partitions(mirror("events", EVENTS_PARTITIONED), 3);
        assert!(HybridStrategy.plan(&ctx, &mut m));
        assert_eq!(m.strategy, Some(DataStrategy::ExportImport));
    }

    #[test]
    fn test_many_partitions_use_sql() {
        let mut cfg = config(DataStrategy::Hybrid);
        cfg.hybrid.export_import_partition_limit = 2;
        let ctx = context(cfg);
        let mut m = with_partitions(mirror("events", EVENTS_PARTITIONED), 3);
        assert!(HybridStrategy.plan(&ctx, &mut m));
        assert_eq!(m.strategy, Some(DataStrategy::Sql));
        assert!(m
            .environment_table(Environment::Target)
            .unwrap()
            .issues
            .iter()
            .any(|i| i.contains("Hence, the SQL method has been selected")));
    }

    #[test]
    fn test_legacy_acid_goes_intermediate() {
        let mut cfg = config(DataStrategy::Hybrid);
        cfg.migrate_acid.on = true;
        let ctx = context(cfg);
        let mut m = mirror("ledger", ACID_BUCKETED);
        HybridStrategy.plan(&ctx, &mut m);
        assert_eq!(m.strategy, Some(DataStrategy::Intermediate));
    }

    #[test]
    fn test_acid_without_migrate_acid_refused() {
        let ctx = context(config(DataStrategy::Hybrid));
        let mut m = mirror("ledger", ACID_BUCKETED);
        assert!(!HybridStrategy.plan(&ctx, &mut m));
        assert_eq!(m.strategy, Some(DataStrategy::Hybrid));
    }
}
