//! Run state for resume.
//!
//! After every run the per-table outcome is written to a JSON state file
//! signed with HMAC-SHA256, keyed by the config hash. A resumed run with
//! the same config skips tables that already passed planning.

use crate::error::{MigrateError, Result};
use crate::mirror::{PhaseState, TableMirror};
use crate::strategy::DataStrategy;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// State of one planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,

    /// SHA256 hash of the configuration the run used.
    pub config_hash: String,

    pub started_at: DateTime<Utc>,

    pub status: RunStatus,

    /// Per-table outcome, keyed by `db.table`.
    pub tables: BTreeMap<String, TableRecord>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Signature over the state without this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Last known outcome for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub phase_state: PhaseState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<DataStrategy>,

    pub completed_at: Option<DateTime<Utc>>,

    /// First error recorded on the table, if planning failed.
    pub error: Option<String>,
}

impl RunState {
    pub fn new(run_id: String, config_hash: String) -> Self {
        Self {
            run_id,
            config_hash,
            started_at: Utc::now(),
            status: RunStatus::Running,
            tables: BTreeMap::new(),
            completed_at: None,
            hmac: None,
        }
    }

    fn compute_hmac(&self) -> Result<String> {
        let mut unsigned = self.clone();
        unsigned.hmac = None;

        let content = serde_json::to_string(&unsigned)
            .map_err(|e| MigrateError::State(format!("Failed to serialize state for HMAC: {}", e)))?;

        let mut mac = HmacSha256::new_from_slice(self.config_hash.as_bytes())
            .map_err(|e| MigrateError::State(format!("Failed to create HMAC: {}", e)))?;
        mac.update(content.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Load and verify a state file. An unsigned file is accepted with a
    /// warning.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::State(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let state: Self = serde_json::from_str(&content)?;

        match &state.hmac {
            Some(stored) => {
                if stored != &state.compute_hmac()? {
                    return Err(MigrateError::State(
                        "State file integrity check failed: HMAC mismatch".to_string(),
                    ));
                }
            }
            None => warn!("State file {} has no HMAC signature", path.display()),
        }
        Ok(state)
    }

    /// Sign and write the state. The file is replaced atomically.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.hmac = Some(self.compute_hmac()?);

        let content = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// A resume must use the config the state was written with.
    pub fn validate_config(&self, config_hash: &str) -> Result<()> {
        if self.config_hash != config_hash {
            return Err(MigrateError::ConfigChanged);
        }
        Ok(())
    }

    /// Record where `mirror` ended up.
    pub fn record(&mut self, mirror: &TableMirror) {
        let error = if mirror.phase_state == PhaseState::Error {
            mirror
                .environments
                .values()
                .flat_map(|t| t.errors.iter().chain(t.issues.iter()))
                .next()
                .cloned()
        } else {
            None
        };
        let completed_at = mirror.phase_state.is_past_calculation().then(Utc::now);
        self.tables.insert(
            mirror.qualified_name(),
            TableRecord {
                phase_state: mirror.phase_state,
                strategy: mirror.strategy,
                completed_at,
                error,
            },
        );
    }

    /// The table passed planning in an earlier run.
    pub fn is_past_success(&self, qualified_name: &str) -> bool {
        self.tables
            .get(qualified_name)
            .map(|t| t.phase_state.is_past_calculation())
            .unwrap_or(false)
    }

    pub fn mark_completed(&mut self) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_cancelled(&mut self) {
        self.status = RunStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::Environment;
    use tempfile::NamedTempFile;

    fn planned(name: &str, phase: PhaseState) -> TableMirror {
        let mut mirror = TableMirror::new("sales", name);
        mirror.strategy = Some(DataStrategy::SchemaOnly);
        mirror.phase_state = phase;
        mirror
    }

    #[test]
    fn test_save_load() {
        let mut state = RunState::new("run-1".into(), "abc123".into());
        state.record(&planned("orders", PhaseState::CalculatedSql));

        let file = NamedTempFile::new().unwrap();
        state.save(file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&content).is_ok());

        let loaded = RunState::load(file.path()).unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(
            loaded.tables["sales.orders"].strategy,
            Some(DataStrategy::SchemaOnly)
        );
        assert!(loaded.is_past_success("sales.orders"));
    }

    #[test]
    fn test_tampered_state_rejected() {
        let mut state = RunState::new("run-1".into(), "abc123".into());
        state.record(&planned("orders", PhaseState::Error));

        let file = NamedTempFile::new().unwrap();
        state.save(file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        std::fs::write(file.path(), content.replace("\"ERROR\"", "\"PROCESSED\"")).unwrap();
        assert!(matches!(RunState::load(file.path()), Err(MigrateError::State(_))));
    }

    #[test]
    fn test_config_validation() {
        let state = RunState::new("run-1".into(), "abc123".into());
        assert!(state.validate_config("abc123").is_ok());
        assert!(matches!(
            state.validate_config("different"),
            Err(MigrateError::ConfigChanged)
        ));
    }

    #[test]
    fn test_failed_table_is_not_past_success() {
        let mut state = RunState::new("run-1".into(), "abc123".into());
        let mut failed = planned("events", PhaseState::Error);
        failed.add_issue(Environment::Target, "Schema exists already");
        state.record(&failed);

        assert!(!state.is_past_success("sales.events"));
        assert!(!state.is_past_success("sales.unknown"));
        assert_eq!(
            state.tables["sales.events"].error.as_deref(),
            Some("Schema exists already")
        );
    }

    #[test]
    fn test_unsigned_state_accepted() {
        let state = RunState::new("run-1".into(), "abc123".into());
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(&state).unwrap()).unwrap();
        assert!(RunState::load(file.path()).unwrap().hmac.is_none());
    }
}
