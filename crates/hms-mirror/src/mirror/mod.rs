//! Table state model: one `TableMirror` per table being migrated, holding a
//! snapshot per environment plus the phase state that every strategy updates.

pub mod definition;
mod table;

pub use table::{EnvironmentTable, SqlPair, FILE_FORMAT, PARTITION_COUNT};

use crate::messages::{MessageCode, MessageSet};
use crate::strategy::DataStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Role a table definition occupies during a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    Source,
    Target,
    /// Source-side staging table that owns data transiently.
    Transfer,
    /// Target-side table pointing at source-owned data.
    Shadow,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Source,
        Environment::Target,
        Environment::Transfer,
        Environment::Shadow,
    ];

    /// Only SOURCE and TARGET are reported to operators.
    pub fn is_visible(&self) -> bool {
        matches!(self, Environment::Source | Environment::Target)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Source => "SOURCE",
            Environment::Target => "TARGET",
            Environment::Transfer => "TRANSFER",
            Environment::Shadow => "SHADOW",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DDL action decided for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateStrategy {
    #[default]
    Nothing,
    Leave,
    Drop,
    Create,
    Replace,
    AmendParts,
}

impl fmt::Display for CreateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CreateStrategy::Nothing => "NOTHING",
            CreateStrategy::Leave => "LEAVE",
            CreateStrategy::Drop => "DROP",
            CreateStrategy::Create => "CREATE",
            CreateStrategy::Replace => "REPLACE",
            CreateStrategy::AmendParts => "AMEND_PARTS",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a table through planning and apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    #[default]
    Init,
    CalculatingSql,
    CalculatedSql,
    CalculatedSqlWarning,
    Error,
    ApplyingSql,
    Processed,
    /// Resumed run skipped a table that already passed calculation.
    RetrySkippedPastSuccess,
}

impl PhaseState {
    pub fn can_transition_to(&self, next: PhaseState) -> bool {
        use PhaseState::*;
        matches!(
            (self, next),
            (Init, CalculatingSql)
                | (Init, RetrySkippedPastSuccess)
                | (Init, Error)
                | (CalculatingSql, CalculatedSql)
                | (CalculatingSql, CalculatedSqlWarning)
                | (CalculatingSql, Error)
                | (CalculatedSql, ApplyingSql)
                | (CalculatedSqlWarning, ApplyingSql)
                | (ApplyingSql, Processed)
                | (ApplyingSql, Error)
        )
    }

    /// Planning for the table completed on an earlier run.
    pub fn is_past_calculation(&self) -> bool {
        matches!(
            self,
            PhaseState::CalculatedSql
                | PhaseState::CalculatedSqlWarning
                | PhaseState::ApplyingSql
                | PhaseState::Processed
                | PhaseState::RetrySkippedPastSuccess
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PhaseState::Error | PhaseState::Processed | PhaseState::RetrySkippedPastSuccess
        )
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhaseState::Init => "INIT",
            PhaseState::CalculatingSql => "CALCULATING_SQL",
            PhaseState::CalculatedSql => "CALCULATED_SQL",
            PhaseState::CalculatedSqlWarning => "CALCULATED_SQL_WARNING",
            PhaseState::Error => "ERROR",
            PhaseState::ApplyingSql => "APPLYING_SQL",
            PhaseState::Processed => "PROCESSED",
            PhaseState::RetrySkippedPastSuccess => "RETRY_SKIPPED_PAST_SUCCESS",
        };
        f.write_str(s)
    }
}

/// One table being migrated. The unit of scheduling and of retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMirror {
    pub name: String,
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<DataStrategy>,
    #[serde(default)]
    pub phase_state: PhaseState,
    #[serde(default)]
    pub current_phase: u32,
    #[serde(default)]
    pub total_phase_count: u32,
    #[serde(default)]
    pub environments: BTreeMap<Environment, EnvironmentTable>,
    /// Coded errors and warnings raised while planning this table.
    #[serde(default)]
    pub messages: MessageSet,
    /// The global location map rewrote this table's location.
    #[serde(default)]
    pub remapped: bool,
    /// Filtered out before any strategy ran.
    #[serde(default)]
    pub remove: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// Environments exactly as collected, restored by `reset`.
    #[serde(skip)]
    collected: BTreeMap<Environment, EnvironmentTable>,
}

impl TableMirror {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
            strategy: None,
            phase_state: PhaseState::Init,
            current_phase: 0,
            total_phase_count: 0,
            environments: BTreeMap::new(),
            messages: MessageSet::new(),
            remapped: false,
            remove: false,
            remove_reason: None,
            start: None,
            duration_ms: None,
            collected: BTreeMap::new(),
        }
    }

    /// `db.table`, used in logs.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    pub fn environment_table(&self, env: Environment) -> Option<&EnvironmentTable> {
        self.environments.get(&env)
    }

    /// Snapshot for `env`, created on first access with the table's name.
    pub fn environment_table_mut(&mut self, env: Environment) -> &mut EnvironmentTable {
        let name = self.name.clone();
        self.environments
            .entry(env)
            .or_insert_with(|| EnvironmentTable::new(name))
    }

    /// Snapshot for `env` or an empty one when it was never created.
    pub fn env_or_default(&self, env: Environment) -> EnvironmentTable {
        self.environments
            .get(&env)
            .cloned()
            .unwrap_or_else(|| EnvironmentTable::new(self.name.clone()))
    }

    pub fn exists(&self, env: Environment) -> bool {
        self.environments.get(&env).map(|t| t.exists).unwrap_or(false)
    }

    pub fn definition(&self, env: Environment) -> &[String] {
        self.environments
            .get(&env)
            .map(|t| t.definition.as_slice())
            .unwrap_or(&[])
    }

    pub fn add_issue(&mut self, env: Environment, issue: impl Into<String>) {
        self.environment_table_mut(env).add_issue(issue);
    }

    pub fn add_error(&mut self, env: Environment, error: impl Into<String>) {
        self.environment_table_mut(env).add_error(error);
    }

    /// Record a coded message on the table and as an issue on `env`.
    pub fn add_message(&mut self, env: Environment, code: MessageCode, args: &[String]) {
        let mut single = MessageSet::new();
        single.set_with_args(code, args.iter().cloned());
        for text in single.messages() {
            if code.is_warning() {
                self.add_issue(env, text);
            } else {
                self.add_error(env, text);
            }
        }
        self.messages.merge(&single);
    }

    /// Column layouts match between two environments.
    pub fn schemas_equal(&self, a: Environment, b: Environment) -> bool {
        definition::fields_fingerprint(self.definition(a))
            == definition::fields_fingerprint(self.definition(b))
    }

    /// Move to `next` if the transition is legal. Illegal transitions are
    /// logged and refused.
    pub fn set_phase_state(&mut self, next: PhaseState) -> bool {
        if self.phase_state == next {
            return true;
        }
        if !self.phase_state.can_transition_to(next) {
            warn!(
                "{}: refusing phase transition {} -> {}",
                self.qualified_name(),
                self.phase_state,
                next
            );
            return false;
        }
        debug!("{}: {} -> {}", self.qualified_name(), self.phase_state, next);
        self.phase_state = next;
        true
    }

    /// Advance the progress counter.
    pub fn next_phase(&mut self, description: &str) {
        self.current_phase += 1;
        if self.current_phase > self.total_phase_count {
            self.total_phase_count = self.current_phase;
        }
        debug!(
            "{}: step {}/{} {}",
            self.qualified_name(),
            self.current_phase,
            self.total_phase_count,
            description
        );
    }

    /// Remember the collected environments so `reset` can restore them.
    pub fn mark_collected(&mut self) {
        self.collected = self.environments.clone();
    }

    /// Return to the freshly collected state: INIT, no plan, no messages.
    pub fn reset(&mut self) {
        self.environments = self.collected.clone();
        for table in self.environments.values_mut() {
            table.clear_plan();
        }
        self.phase_state = PhaseState::Init;
        self.current_phase = 0;
        self.messages = MessageSet::new();
        self.remapped = false;
    }

    /// Any environment recorded an error message.
    pub fn has_errors(&self) -> bool {
        self.environments.values().any(|t| !t.errors.is_empty())
    }

    /// Partitions on the source side.
    pub fn source_partition_count(&self) -> usize {
        self.environments
            .get(&Environment::Source)
            .map(|t| t.partition_count())
            .unwrap_or(0)
    }
}
