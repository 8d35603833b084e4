//! Data strategies.
//!
//! Every strategy plans one [`TableMirror`] through the [`StrategyHandler`]
//! trait:
//!
//! - [`StrategyHandler::build_definition`] derives the table definitions the
//!   strategy needs (target, transfer, shadow) with [`CopySpec`]s
//! - [`StrategyHandler::build_sql`] turns them into ordered scripts
//! - [`StrategyHandler::execute`] is the template method that drives the
//!   phase state through both and hands the scripts to the executor
//!
//! Routers (HYBRID, and SQL when a staging table is required) pick another
//! strategy with [`StrategyHandler::route`]; the chosen strategy is recorded on
//! the mirror and its handler does the work.
//!
//! [`CopySpec`]: crate::copy_spec::CopySpec

pub mod base;
pub mod statements;

mod acid_downgrade;
mod common;
mod convert_linked;
mod dump;
mod export_import;
mod hybrid;
mod iceberg;
mod intermediate;
mod linked;
mod schema_only;
mod sql;
mod storage_migration;

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::{MigrateError, Result};
use crate::executor::TableSqlExecutor;
use crate::mirror::{Environment, PhaseState, TableMirror};
use crate::translator::Translator;

/// How a table's schema and data are moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataStrategy {
    /// Schema only; data is moved by other means (distcp).
    SchemaOnly,
    /// Target table points at the source data without owning it.
    Linked,
    /// Both clusters share storage; the target takes over the data.
    Common,
    /// `INSERT OVERWRITE` through a shadow table.
    Sql,
    ExportImport,
    /// Picks SQL, EXPORT_IMPORT or INTERMEDIATE per table.
    Hybrid,
    /// Transfer table on the source, shadow table on the target.
    Intermediate,
    SqlAcidDowngradeInplace,
    ExportImportAcidDowngradeInplace,
    HybridAcidDowngradeInplace,
    /// Move tables to new storage on the same cluster.
    StorageMigration,
    /// Source definitions only.
    Dump,
    IcebergConversion,
    ConvertLinked,
}

impl DataStrategy {
    pub const ALL: [DataStrategy; 14] = [
        DataStrategy::SchemaOnly,
        DataStrategy::Linked,
        DataStrategy::Common,
        DataStrategy::Sql,
        DataStrategy::ExportImport,
        DataStrategy::Hybrid,
        DataStrategy::Intermediate,
        DataStrategy::SqlAcidDowngradeInplace,
        DataStrategy::ExportImportAcidDowngradeInplace,
        DataStrategy::HybridAcidDowngradeInplace,
        DataStrategy::StorageMigration,
        DataStrategy::Dump,
        DataStrategy::IcebergConversion,
        DataStrategy::ConvertLinked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataStrategy::SchemaOnly => "SCHEMA_ONLY",
            DataStrategy::Linked => "LINKED",
            DataStrategy::Common => "COMMON",
            DataStrategy::Sql => "SQL",
            DataStrategy::ExportImport => "EXPORT_IMPORT",
            DataStrategy::Hybrid => "HYBRID",
            DataStrategy::Intermediate => "INTERMEDIATE",
            DataStrategy::SqlAcidDowngradeInplace => "SQL_ACID_DOWNGRADE_INPLACE",
            DataStrategy::ExportImportAcidDowngradeInplace => "EXPORT_IMPORT_ACID_DOWNGRADE_INPLACE",
            DataStrategy::HybridAcidDowngradeInplace => "HYBRID_ACID_DOWNGRADE_INPLACE",
            DataStrategy::StorageMigration => "STORAGE_MIGRATION",
            DataStrategy::Dump => "DUMP",
            DataStrategy::IcebergConversion => "ICEBERG_CONVERSION",
            DataStrategy::ConvertLinked => "CONVERT_LINKED",
        }
    }

    /// Selected per table by the planner, never configured directly.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            DataStrategy::SqlAcidDowngradeInplace
                | DataStrategy::ExportImportAcidDowngradeInplace
                | DataStrategy::HybridAcidDowngradeInplace
        )
    }
}

impl fmt::Display for DataStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataStrategy {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        DataStrategy::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| MigrateError::Config(format!("Unknown data strategy: {}", s)))
    }
}

/// Strategy a table is planned with. ACID tables under an in-place
/// downgrade use the in-place form of the configured strategy.
pub fn select_strategy(config: &Config, mirror: &TableMirror) -> DataStrategy {
    let acid = mirror
        .environment_table(Environment::Source)
        .map(|t| t.is_acid())
        .unwrap_or(false);
    if acid && config.is_acid_downgrade_in_place() {
        match config.data_strategy {
            DataStrategy::Sql => DataStrategy::SqlAcidDowngradeInplace,
            DataStrategy::ExportImport => DataStrategy::ExportImportAcidDowngradeInplace,
            DataStrategy::Hybrid => DataStrategy::HybridAcidDowngradeInplace,
            other => other,
        }
    } else {
        config.data_strategy
    }
}

/// Shared, read-only services for strategy workers.
#[derive(Clone)]
pub struct StrategyContext {
    pub config: Arc<Config>,
    pub translator: Arc<Translator>,
    pub executor: Arc<dyn TableSqlExecutor>,
    /// Identifies this run in staging paths and renamed tables.
    pub run_marker: String,
    /// Run start, stamped on every target definition.
    pub run_timestamp: String,
}

impl StrategyContext {
    pub fn new(
        config: Arc<Config>,
        executor: Arc<dyn TableSqlExecutor>,
        run_marker: impl Into<String>,
    ) -> Self {
        let translator = Arc::new(Translator::new(config.clone()));
        Self {
            config,
            translator,
            executor,
            run_marker: run_marker.into(),
            run_timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Which script of an environment to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Main,
    Cleanup,
}

/// One data strategy.
#[async_trait]
pub trait StrategyHandler: Send + Sync {
    fn kind(&self) -> DataStrategy;

    /// Another strategy that should plan this table instead.
    fn route(&self, _ctx: &StrategyContext, _mirror: &mut TableMirror) -> Option<DataStrategy> {
        None
    }

    /// Build the table definitions. False stops planning.
    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool;

    /// Build the ordered scripts. False stops planning.
    fn build_sql(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool;

    /// Scripts the executor runs, in dependency order.
    fn execution_plan(&self, ctx: &StrategyContext, mirror: &TableMirror)
        -> Vec<(Environment, Script)>;

    /// Definitions then SQL, after routing.
    fn plan(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        if let Some(route) = self.route(ctx, mirror) {
            if route != self.kind() {
                debug!("{}: {} routed to {}", mirror.qualified_name(), self.kind(), route);
                mirror.strategy = Some(route);
                return handler_for(route).plan(ctx, mirror);
            }
        }
        if mirror.strategy.is_none() {
            mirror.strategy = Some(self.kind());
        }
        self.build_definition(ctx, mirror) && self.build_sql(ctx, mirror)
    }

    /// Plan the table and, when the run executes, apply the scripts.
    ///
    /// Phase state: INIT -> CALCULATING_SQL -> CALCULATED_SQL[_WARNING] |
    /// ERROR, then APPLYING_SQL -> PROCESSED | ERROR when executing.
    async fn execute(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> Result<bool> {
        mirror.set_phase_state(PhaseState::CalculatingSql);
        mirror.next_phase("Calculating SQL");

        if !self.plan(ctx, mirror) {
            warn!("{}: planning failed", mirror.qualified_name());
            mirror.set_phase_state(PhaseState::Error);
            return Ok(false);
        }

        let calculated = if mirror.messages.has_warnings() {
            PhaseState::CalculatedSqlWarning
        } else {
            PhaseState::CalculatedSql
        };
        mirror.set_phase_state(calculated);

        if !ctx.config.execute {
            return Ok(true);
        }

        mirror.set_phase_state(PhaseState::ApplyingSql);
        let effective = handler_for(mirror.strategy.unwrap_or(self.kind()));
        for (env, script) in effective.execution_plan(ctx, mirror) {
            mirror.next_phase(&format!("Applying {} SQL", env));
            let outcome = match script {
                Script::Main => ctx.executor.run_table_sql(mirror, env).await,
                Script::Cleanup => ctx.executor.run_cleanup_sql(mirror, env).await,
            };
            match outcome {
                Ok(true) => {}
                Ok(false) => {
                    error!("{}: {} SQL failed", mirror.qualified_name(), env);
                    mirror.add_error(env, format!("{} SQL failed", env));
                    mirror.set_phase_state(PhaseState::Error);
                    return Ok(false);
                }
                Err(e) => {
                    error!("{}: {} SQL failed: {}", mirror.qualified_name(), env, e);
                    mirror.add_error(env, e.to_string());
                    mirror.set_phase_state(PhaseState::Error);
                    return Err(e);
                }
            }
        }

        mirror.set_phase_state(PhaseState::Processed);
        Ok(true)
    }
}

/// Handler for a strategy.
pub fn handler_for(kind: DataStrategy) -> &'static dyn StrategyHandler {
    match kind {
        DataStrategy::SchemaOnly => &schema_only::SchemaOnlyStrategy,
        DataStrategy::Linked => &linked::LinkedStrategy,
        DataStrategy::Common => &common::CommonStrategy,
        DataStrategy::Sql => &sql::SqlStrategy,
        DataStrategy::ExportImport => &export_import::ExportImportStrategy,
        DataStrategy::Hybrid => &hybrid::HybridStrategy,
        DataStrategy::Intermediate => &intermediate::IntermediateStrategy,
        DataStrategy::SqlAcidDowngradeInplace => &acid_downgrade::SqlAcidDowngradeInplaceStrategy,
        DataStrategy::ExportImportAcidDowngradeInplace => {
            &acid_downgrade::ExportImportAcidDowngradeInplaceStrategy
        }
        DataStrategy::HybridAcidDowngradeInplace => {
            &acid_downgrade::HybridAcidDowngradeInplaceStrategy
        }
        DataStrategy::StorageMigration => &storage_migration::StorageMigrationStrategy,
        DataStrategy::Dump => &dump::DumpStrategy,
        DataStrategy::IcebergConversion => &iceberg::IcebergConversionStrategy,
        DataStrategy::ConvertLinked => &convert_linked::ConvertLinkedStrategy,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for strategy in DataStrategy::ALL {
            assert_eq!(strategy.as_str().parse::<DataStrategy>().unwrap(), strategy);
        }
        assert_eq!("export-import".parse::<DataStrategy>().unwrap(), DataStrategy::ExportImport);
        assert!("bogus".parse::<DataStrategy>().is_err());
    }

    #[test]
    fn test_serde_matches_display() {
        for strategy in DataStrategy::ALL {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{}\"", strategy));
        }
    }

    #[test]
    fn test_handlers_report_their_kind() {
        for strategy in DataStrategy::ALL {
            assert_eq!(handler_for(strategy).kind(), strategy);
        }
    }

    #[test]
    fn test_select_strategy_for_in_place_downgrade() {
        let mut config = config(DataStrategy::Hybrid);
        config.clusters.source.legacy_hive = false;
        config.migrate_acid.on = true;
        config.migrate_acid.downgrade = true;
        config.migrate_acid.in_place = true;

        let acid = mirror("ledger", ACID_BUCKETED);
        assert_eq!(select_strategy(&config, &acid), DataStrategy::HybridAcidDowngradeInplace);

        let plain = mirror("orders", EVENTS_PARTITIONED);
        assert_eq!(select_strategy(&config, &plain), DataStrategy::Hybrid);
    }

    #[tokio::test]
    async fn test_execute_walks_phases_when_executing() {
        let mut config = config(DataStrategy::SchemaOnly);
        config.execute = true;
        let ctx = context(config);
        let mut m = mirror("orders", ORDERS);

        let ok = handler_for(DataStrategy::SchemaOnly)
            .execute(&ctx, &mut m)
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(m.phase_state, PhaseState::Processed);
        assert_eq!(m.strategy, Some(DataStrategy::SchemaOnly));
    }

    #[tokio::test]
    async fn test_execute_stops_after_calculation_when_planning_only() {
        let ctx = context(config(DataStrategy::SchemaOnly));
        let mut m = mirror("orders", ORDERS);
        assert!(handler_for(DataStrategy::SchemaOnly)
            .execute(&ctx, &mut m)
            .await
            .unwrap());
        assert!(matches!(
            m.phase_state,
            PhaseState::CalculatedSql | PhaseState::CalculatedSqlWarning
        ));
    }

    #[tokio::test]
    async fn test_failed_plan_sets_error() {
        let ctx = context(config(DataStrategy::Linked));
        let mut m = mirror("ledger", ACID_BUCKETED);
        let ok = handler_for(DataStrategy::Linked)
            .execute(&ctx, &mut m)
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(m.phase_state, PhaseState::Error);
    }
}
