//! Script output.
//!
//! For every database and visible environment the planned SQL of all tables
//! is written to `<db>_<ENV>_execute.sql` and `<db>_<ENV>_cleanup.sql`, each
//! statement preceded by its description as a SQL comment. Consolidated
//! distcp plans go to `<db>_distcp_plan.txt`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::mirror::{Environment, SqlPair, TableMirror};

/// Render one script. Tables are separated by a header naming the table.
fn render(database: &str, env: Environment, scripts: &[(&str, &[SqlPair])]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "-- {} {} generated by hms-mirror", database, env);
    for (table, sql) in scripts {
        let _ = writeln!(out, "\n-- Table: {}", table);
        for pair in sql.iter() {
            let _ = writeln!(out, "-- {}", pair.description);
            let _ = writeln!(out, "{};", pair.action);
        }
    }
    out
}

/// Write the execute and cleanup scripts of every database. Files with no
/// statements are not written. Returns the written paths.
pub fn write_scripts(dir: &Path, mirrors: &[TableMirror]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut by_database: BTreeMap<&str, Vec<&TableMirror>> = BTreeMap::new();
    for mirror in mirrors.iter().filter(|m| !m.remove) {
        by_database.entry(mirror.database.as_str()).or_default().push(mirror);
    }

    let mut written = Vec::new();
    for (database, tables) in by_database {
        for env in [Environment::Source, Environment::Target] {
            let mut execute: Vec<(&str, &[SqlPair])> = Vec::new();
            let mut cleanup: Vec<(&str, &[SqlPair])> = Vec::new();
            for mirror in &tables {
                if let Some(table) = mirror.environment_table(env) {
                    if !table.sql.is_empty() {
                        execute.push((mirror.name.as_str(), table.sql.as_slice()));
                    }
                    if !table.cleanup_sql.is_empty() {
                        cleanup.push((mirror.name.as_str(), table.cleanup_sql.as_slice()));
                    }
                }
            }

            for (kind, scripts) in [("execute", &execute), ("cleanup", &cleanup)] {
                if scripts.is_empty() {
                    continue;
                }
                let path = dir.join(format!("{}_{}_{}.sql", database, env, kind));
                std::fs::write(&path, render(database, env, scripts))?;
                debug!("Wrote {}", path.display());
                written.push(path);
            }
        }
    }

    info!("Wrote {} script files to {}", written.len(), dir.display());
    Ok(written)
}

/// Write one distcp plan per database: each target directory followed by
/// the source directories copied into it.
pub fn write_distcp_plans(
    dir: &Path,
    plans: &BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (database, plan) in plans {
        let mut out = String::new();
        for (target, sources) in plan {
            let _ = writeln!(out, "{}", target);
            for source in sources {
                let _ = writeln!(out, "  {}", source);
            }
        }
        let path = dir.join(format!("{}_distcp_plan.txt", database));
        std::fs::write(&path, out)?;
        written.push(path);
    }
    Ok(written)
}
