//! Cluster SQL execution seam.
//!
//! Strategies hand the ordered SQL of one environment to a
//! [`TableSqlExecutor`]. Running statements against a live HiveServer2 is not
//! part of this crate; [`DryRunExecutor`] walks the scripts without touching
//! any cluster.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::error::Result;
use crate::mirror::{Environment, SqlPair, TableMirror};

/// Runs a table's accumulated SQL against one environment.
///
/// Implementations must be `Send + Sync`; one executor is shared by every
/// strategy worker.
#[async_trait]
pub trait TableSqlExecutor: Send + Sync {
    /// Run the main script of `env`, in order. Returns false when any
    /// statement failed.
    async fn run_table_sql(&self, mirror: &TableMirror, env: Environment) -> Result<bool>;

    /// Run the cleanup script of `env`, in order.
    async fn run_cleanup_sql(&self, mirror: &TableMirror, env: Environment) -> Result<bool>;

    /// Short name for logs.
    fn executor_type(&self) -> &'static str;
}

/// Executor that logs statements instead of running them.
pub struct DryRunExecutor {
    warned: AtomicBool,
    statements: AtomicUsize,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self {
            warned: AtomicBool::new(false),
            statements: AtomicUsize::new(0),
        }
    }

    /// Statements walked so far.
    pub fn statements_seen(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }

    fn warn_once(&self) {
        if !self.warned.swap(true, Ordering::SeqCst) {
            warn!(
                "Using dry-run executor: generated SQL is logged but not sent to any cluster. \
                 Use the written scripts to apply the plan."
            );
        }
    }

    fn walk(&self, mirror: &TableMirror, env: Environment, script: &[SqlPair]) {
        self.warn_once();
        for pair in script {
            debug!(
                "[dry-run] {} {}: {} -> {}",
                env,
                mirror.qualified_name(),
                pair.description,
                pair.action
            );
        }
        self.statements.fetch_add(script.len(), Ordering::SeqCst);
    }
}

impl Default for DryRunExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TableSqlExecutor for DryRunExecutor {
    async fn run_table_sql(&self, mirror: &TableMirror, env: Environment) -> Result<bool> {
        if let Some(table) = mirror.environment_table(env) {
            self.walk(mirror, env, &table.sql);
        }
        Ok(true)
    }

    async fn run_cleanup_sql(&self, mirror: &TableMirror, env: Environment) -> Result<bool> {
        if let Some(table) = mirror.environment_table(env) {
            self.walk(mirror, env, &table.cleanup_sql);
        }
        Ok(true)
    }

    fn executor_type(&self) -> &'static str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_counts_statements() {
        let mut mirror = TableMirror::new("sales", "orders");
        let target = mirror.environment_table_mut(Environment::Target);
        target.add_sql("Selecting DB", "USE sales");
        target.add_sql("Creating Table", "CREATE TABLE orders (a int)");
        target.add_cleanup_sql("Dropping Table", "DROP TABLE IF EXISTS x");

        let executor = DryRunExecutor::new();
        assert!(executor.run_table_sql(&mirror, Environment::Target).await.unwrap());
        assert!(executor.run_cleanup_sql(&mirror, Environment::Target).await.unwrap());
        assert_eq!(executor.statements_seen(), 3);
    }

    #[tokio::test]
    async fn test_missing_environment_is_a_no_op() {
        let mirror = TableMirror::new("sales", "orders");
        let executor = DryRunExecutor::default();
        assert!(executor.run_table_sql(&mirror, Environment::Shadow).await.unwrap());
        assert_eq!(executor.statements_seen(), 0);
        assert_eq!(executor.executor_type(), "dry-run");
    }
}
