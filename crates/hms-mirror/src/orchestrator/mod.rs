//! Planning orchestrator - main workflow coordinator.

use crate::config::Config;
use crate::error::{MigrateError, Result};
use crate::executor::{DryRunExecutor, TableSqlExecutor};
use crate::messages::{MessageCode, MessageSet};
use crate::metadata::MetadataSource;
use crate::mirror::definition::{self, HMS_STORAGE_MIGRATION_FLAG};
use crate::mirror::{Environment, PhaseState, TableMirror};
use crate::state::{RunState, RunStatus};
use crate::strategy::{handler_for, select_strategy, DataStrategy, StrategyContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Planning orchestrator.
pub struct Orchestrator {
    config: Arc<Config>,
    metadata: Arc<dyn MetadataSource>,
    executor: Arc<dyn TableSqlExecutor>,
    state_file: Option<PathBuf>,
    state: Option<RunState>,
}

/// Result of a planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// Configured data strategy.
    pub strategy: DataStrategy,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Tables that reached a strategy.
    pub tables_total: usize,

    /// Tables planned (and applied, when executing).
    pub tables_success: usize,

    /// Tables left in ERROR.
    pub tables_failed: usize,

    /// Tables filtered out before planning.
    pub tables_skipped: usize,

    /// Tables a resumed run did not plan again.
    pub tables_retried: usize,

    /// List of failed table names (`db.table`).
    pub failed_tables: Vec<String>,

    /// OR of `1 << code` over every message raised by the run.
    pub return_code: u64,

    /// Negated return code, reported as the process result.
    pub exit_value: i64,

    /// Rendered run messages.
    pub messages: Vec<String>,

    /// Every collected table, including filtered ones.
    pub tables: Vec<TableMirror>,

    /// Per database: target directory to the source directories copied into it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub distcp_plans: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl MigrationResult {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Planned tables, without the filtered ones.
    pub fn planned_tables(&self) -> impl Iterator<Item = &TableMirror> {
        self.tables.iter().filter(|t| !t.remove)
    }
}

impl Orchestrator {
    /// Create a new orchestrator. Concurrency is auto-tuned when the config
    /// leaves it unset.
    pub fn new(config: Config, metadata: Arc<dyn MetadataSource>) -> Self {
        Self {
            config: Arc::new(config.with_auto_tuning()),
            metadata,
            executor: Arc::new(DryRunExecutor::new()),
            state_file: None,
            state: None,
        }
    }

    /// Replace the default dry-run executor.
    pub fn with_executor(mut self, executor: Arc<dyn TableSqlExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Set the state file path for resume capability.
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    /// Load existing state for resume.
    pub fn resume(mut self) -> Result<Self> {
        if let Some(ref path) = self.state_file {
            if path.exists() {
                let state = RunState::load(path)?;
                state.validate_config(&self.config.hash())?;
                info!("Resuming run {} from state file: {:?}", state.run_id, path);
                self.state = Some(state);
            }
        }
        Ok(self)
    }

    /// Run planning for every configured table.
    pub async fn run(mut self, cancel: Option<CancellationToken>) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let cancel = cancel.unwrap_or_default();
        let mut state = self
            .state
            .take()
            .unwrap_or_else(|| RunState::new(uuid::Uuid::new_v4().to_string(), self.config.hash()));
        let run_id = state.run_id.clone();
        state.status = RunStatus::Running;

        info!(
            "Starting planning run: {} (strategy {})",
            run_id, self.config.data_strategy
        );

        // Phase 1: Validate configuration
        info!("Phase 1: Validating configuration");
        self.config.validate()?;
        let mut run_messages = self.config.evaluate();
        if run_messages.has_errors() {
            let errors = run_messages.errors();
            for message in errors.messages() {
                error!("{}", message);
            }
            return Err(MigrateError::Validation {
                messages: errors.messages(),
                return_code: errors.exit_value(),
            });
        }
        for message in run_messages.warnings().messages() {
            warn!("{}", message);
        }

        // Phase 2: Collect metadata
        info!("Phase 2: Collecting metadata ({})", self.metadata.source_type());
        let mut mirrors = self.collect_metadata(&cancel).await?;
        let skipped = self.filter_tables(&mut mirrors);
        info!(
            "Found {} tables, {} filtered out",
            mirrors.len(),
            skipped
        );

        let mut retried = 0;
        for mirror in mirrors.iter_mut().filter(|m| !m.remove) {
            if state.is_past_success(&mirror.qualified_name()) {
                debug!("{}: planned by an earlier run, skipping", mirror.qualified_name());
                mirror.set_phase_state(PhaseState::RetrySkippedPastSuccess);
                retried += 1;
            }
        }

        // Phase 3: Plan tables
        info!("Phase 3: Planning tables");
        let run_marker = state.started_at.format("%Y%m%d_%H%M%S").to_string();
        let ctx = StrategyContext::new(self.config.clone(), self.executor.clone(), run_marker);
        let mut mirrors = self.plan_tables(&ctx, mirrors, &cancel).await?;

        // Build result
        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let mut tables_success = 0;
        let mut failed_tables = Vec::new();
        for mirror in mirrors.iter().filter(|m| !m.remove) {
            run_messages.merge(&mirror.messages);
            match mirror.phase_state {
                PhaseState::Error => failed_tables.push(mirror.qualified_name()),
                PhaseState::RetrySkippedPastSuccess => {}
                p if p.is_past_calculation() => tables_success += 1,
                _ => {}
            }
            state.record(mirror);
        }
        if !failed_tables.is_empty() {
            run_messages.set(MessageCode::TablePlanningFailed);
        }

        let status = if cancel.is_cancelled() {
            state.mark_cancelled();
            "cancelled"
        } else if !failed_tables.is_empty() {
            state.mark_failed();
            "failed"
        } else {
            state.mark_completed();
            "completed"
        };
        self.save_state(&mut state)?;

        let distcp_plans = Self::distcp_plans(&ctx);
        mirrors.sort_by(|a, b| {
            (a.database.as_str(), a.name.as_str()).cmp(&(b.database.as_str(), b.name.as_str()))
        });

        let result = MigrationResult {
            run_id,
            status: status.to_string(),
            strategy: self.config.data_strategy,
            duration_seconds: duration,
            started_at,
            completed_at,
            tables_total: mirrors.iter().filter(|m| !m.remove).count(),
            tables_success,
            tables_failed: failed_tables.len(),
            tables_skipped: skipped,
            tables_retried: retried,
            failed_tables,
            return_code: run_messages.return_code(),
            exit_value: run_messages.exit_value(),
            messages: run_messages.messages(),
            tables: mirrors,
            distcp_plans,
        };

        info!(
            "Planning {}: {} tables ({} planned, {} failed, {} skipped, {} retried) in {:.1}s",
            result.status,
            result.tables_total,
            result.tables_success,
            result.tables_failed,
            result.tables_skipped,
            result.tables_retried,
            result.duration_seconds
        );

        Ok(result)
    }

    /// Databases to plan: the configured list or everything the source knows.
    async fn databases(&self) -> Result<Vec<String>> {
        if self.config.databases.is_empty() {
            self.metadata.list_databases().await
        } else {
            Ok(self.config.databases.clone())
        }
    }

    /// Load SOURCE and TARGET metadata for every table with a bounded pool.
    async fn collect_metadata(&self, cancel: &CancellationToken) -> Result<Vec<TableMirror>> {
        let workers = self.config.get_concurrency();
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut handles: Vec<(String, JoinHandle<TableMirror>)> = Vec::new();

        for database in self.databases().await? {
            let tables = self.metadata.list_tables(&database).await?;
            debug!("{}: {} tables", database, tables.len());

            for table in tables {
                if cancel.is_cancelled() {
                    info!("Cancellation requested, stopping metadata collection");
                    break;
                }
                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| MigrateError::Metadata(format!("Worker pool closed: {}", e)))?;
                let metadata = self.metadata.clone();
                let database = database.clone();
                let name = format!("{}.{}", database, table);

                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    let mut mirror = TableMirror::new(&database, &table);
                    for env in [Environment::Source, Environment::Target] {
                        if let Err(e) = metadata.load_table(&database, &mut mirror, env).await {
                            error!("{}: failed to load {} metadata: {}", mirror.qualified_name(), env, e);
                            mirror.add_error(env, e.to_string());
                            mirror.set_phase_state(PhaseState::Error);
                            break;
                        }
                    }
                    mirror
                });
                handles.push((name, handle));
            }
        }

        let mut mirrors = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let mirror = handle
                .await
                .map_err(|e| MigrateError::Metadata(format!("Metadata task for {} panicked: {}", name, e)))?;
            mirrors.push(mirror);
        }
        Ok(mirrors)
    }

    /// Mark tables the run does not plan. Returns how many were removed.
    fn filter_tables(&self, mirrors: &mut [TableMirror]) -> usize {
        let config = &self.config;
        let mut removed = 0;
        for mirror in mirrors.iter_mut() {
            if mirror.phase_state == PhaseState::Error {
                continue;
            }
            let source = mirror.env_or_default(Environment::Source);
            let reason = if config.migrate_view && !source.is_view() {
                Some("Not a view; only views are processed")
            } else if source.is_view()
                && !config.migrate_view
                && config.data_strategy != DataStrategy::Dump
            {
                Some("View and view processing not selected")
            } else if source.is_acid() && !config.acid_enabled() {
                Some("ACID table and ACID processing not selected")
            } else if !source.is_acid() && config.migrate_acid.only {
                Some("Non-ACID table and ACID only processing selected")
            } else if !source.is_view() && !source.is_hive_native() {
                Some("Non-native table (storage handler)")
            } else if config.data_strategy == DataStrategy::StorageMigration
                && definition::has_property(&source.definition, HMS_STORAGE_MIGRATION_FLAG)
            {
                Some("Table was already processed by a storage migration")
            } else {
                None
            };

            if let Some(reason) = reason {
                debug!("{}: removed, {}", mirror.qualified_name(), reason);
                mirror.remove = true;
                mirror.remove_reason = Some(reason.to_string());
                removed += 1;
            }
        }
        removed
    }

    /// Run the strategy of every remaining table with a bounded pool.
    async fn plan_tables(
        &self,
        ctx: &StrategyContext,
        mirrors: Vec<TableMirror>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TableMirror>> {
        let workers = self.config.get_concurrency();
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut handles: Vec<(String, JoinHandle<TableMirror>)> = Vec::new();
        let mut untouched = Vec::new();

        let pending = mirrors
            .iter()
            .filter(|m| !m.remove && m.phase_state == PhaseState::Init)
            .count();
        info!("Planning {} tables with {} workers", pending, workers);

        for mut mirror in mirrors {
            if mirror.remove || mirror.phase_state != PhaseState::Init || cancel.is_cancelled() {
                untouched.push(mirror);
                continue;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| MigrateError::strategy(mirror.qualified_name(), e.to_string()))?;
            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping new tables");
                untouched.push(mirror);
                continue;
            }

            let ctx = ctx.clone();
            let name = mirror.qualified_name();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let kind = select_strategy(&ctx.config, &mirror);
                let started = Utc::now();
                mirror.start = Some(started);
                match handler_for(kind).execute(&ctx, &mut mirror).await {
                    Ok(true) => debug!("{}: planned with {}", mirror.qualified_name(), kind),
                    Ok(false) => warn!("{}: could not be planned with {}", mirror.qualified_name(), kind),
                    Err(e) => error!("{}: {}", mirror.qualified_name(), e),
                }
                mirror.duration_ms = Some((Utc::now() - started).num_milliseconds());
                mirror
            });
            handles.push((name, handle));
        }

        let mut planned = untouched;
        for (name, handle) in handles {
            let mirror = handle
                .await
                .map_err(|e| MigrateError::strategy(&name, format!("Task panicked: {}", e)))?;
            planned.push(mirror);
        }
        Ok(planned)
    }

    /// Consolidated distcp plans from the translation record.
    fn distcp_plans(ctx: &StrategyContext) -> BTreeMap<String, BTreeMap<String, BTreeSet<String>>> {
        let env = ctx.translator.record_environment();
        ctx.translator
            .databases()
            .into_iter()
            .map(|db| {
                let plan = ctx.translator.distcp_plan(&db, env, 0);
                (db, plan)
            })
            .filter(|(_, plan)| !plan.is_empty())
            .collect()
    }

    fn save_state(&self, state: &mut RunState) -> Result<()> {
        if let Some(ref path) = self.state_file {
            state.save(path)?;
            debug!("Saved state to {:?}", path);
        }
        Ok(())
    }

    /// Messages the configuration raises, without running anything.
    pub fn evaluate_config(&self) -> MessageSet {
        self.config.evaluate()
    }
}
