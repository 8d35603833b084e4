//! # hms-mirror
//!
//! Hive metastore table migration planner.
//!
//! For every table of the configured databases the planner compares the
//! source and target cluster definitions, picks a data strategy and produces
//! ordered, environment-tagged SQL scripts:
//!
//! - **Strategies** for schema-only, linked, common storage, SQL, export/import,
//!   hybrid, intermediate storage, ACID downgrades, storage migration, dump
//!   and Iceberg conversion
//! - **Location translation** with a global location map, namespace
//!   substitution and distcp plans
//! - **Parallel planning** with bounded worker pools
//! - **Resume capability** via signed JSON state files
//! - **Coded messages** folded into a single return code
//!
//! ## Example
//!
//! ```rust,no_run
//! use hms_mirror::{Config, FileMetadataSource, Orchestrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> hms_mirror::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let metadata = Arc::new(FileMetadataSource::load("metadata.yaml")?);
//!     let result = Orchestrator::new(config, metadata).run(None).await?;
//!     println!("Planned {} tables", result.tables_success);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod copy_spec;
pub mod error;
pub mod executor;
pub mod messages;
pub mod metadata;
pub mod mirror;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod state;
pub mod strategy;
pub mod translator;

// Re-exports for convenient access
pub use config::Config;
pub use copy_spec::CopySpec;
pub use error::{MigrateError, Result};
pub use executor::{DryRunExecutor, TableSqlExecutor};
pub use messages::{MessageCode, MessageSet};
pub use metadata::{FileMetadataSource, MetadataSource};
pub use mirror::{CreateStrategy, Environment, EnvironmentTable, PhaseState, TableMirror};
pub use orchestrator::{MigrationResult, Orchestrator};
pub use state::RunState;
pub use strategy::{handler_for, select_strategy, DataStrategy, StrategyContext, StrategyHandler};
pub use translator::Translator;
