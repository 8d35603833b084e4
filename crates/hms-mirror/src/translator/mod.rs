//! Storage location translation between environments.
//!
//! The global location map is sorted once at construction (longest key first,
//! ties broken lexicographically) and never changes during a run. Every
//! translation is recorded per database and environment so distcp plans can
//! be derived from the table-level rewrites.

pub mod namespace;

use crate::config::Config;
use crate::error::{MigrateError, Result};
use crate::messages::MessageCode;
use crate::mirror::{definition, Environment, EnvironmentTable, TableMirror};
use crate::strategy::DataStrategy;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

pub const RELATIVE_PATH_ASSUMED: &str =
    "Location has no namespace. Treated as a relative path and left relative.";

/// One recorded rewrite.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TranslationLevel {
    pub original: String,
    pub target: String,
    /// Directories consumed by the table-level translation.
    pub level: usize,
}

impl TranslationLevel {
    pub fn adjusted_original(&self) -> String {
        namespace::reduce_url_by(&self.original, self.level)
    }

    pub fn adjusted_target(&self) -> String {
        namespace::reduce_url_by(&self.target, self.level)
    }
}

/// Rewrites recorded for one database, by environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvironmentMap {
    translations: BTreeMap<Environment, BTreeSet<TranslationLevel>>,
}

impl EnvironmentMap {
    pub fn add(&mut self, env: Environment, translation: TranslationLevel) {
        self.translations.entry(env).or_default().insert(translation);
    }

    pub fn get(&self, env: Environment) -> Option<&BTreeSet<TranslationLevel>> {
        self.translations.get(&env)
    }

    pub fn environments(&self) -> impl Iterator<Item = &Environment> {
        self.translations.keys()
    }
}

/// Location translator for one run.
pub struct Translator {
    config: Arc<Config>,
    location_map: Vec<(String, String)>,
    record: DashMap<String, EnvironmentMap>,
}

impl Translator {
    pub fn new(config: Arc<Config>) -> Self {
        let mut location_map: Vec<(String, String)> = config
            .translator
            .global_location_map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        location_map.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self {
            config,
            location_map,
            record: DashMap::new(),
        }
    }

    /// Global location map in match order.
    pub fn ordered_location_map(&self) -> &[(String, String)] {
        &self.location_map
    }

    /// Apply the first (most specific) matching global map entry.
    pub fn process_global_location_map(&self, dir: &str) -> Option<String> {
        self.location_map.iter().find_map(|(from, to)| {
            dir.strip_prefix(from.as_str()).map(|rest| {
                let mapped = format!("{}{}", to, rest);
                info!("Location map found. {}:{} new location: {}", from, to, mapped);
                mapped
            })
        })
    }

    /// Namespace that translated locations land in.
    pub fn target_namespace(&self) -> String {
        let transfer = &self.config.transfer;
        let ns = if self.config.data_strategy == DataStrategy::StorageMigration {
            transfer
                .target_namespace
                .as_deref()
                .or(transfer.common_storage.as_deref())
                .unwrap_or(&self.config.clusters.source.namespace)
        } else {
            transfer
                .common_storage
                .as_deref()
                .unwrap_or(&self.config.clusters.target.namespace)
        };
        ns.trim_end_matches('/').to_string()
    }

    /// Environment whose record (and issues) translations belong to.
    pub fn record_environment(&self) -> Environment {
        match self.config.data_strategy {
            DataStrategy::StorageMigration | DataStrategy::Dump => Environment::Source,
            _ => Environment::Target,
        }
    }

    /// Warehouse directory the translated location should fall under.
    fn warehouse_dir(&self, source: &EnvironmentTable) -> Option<String> {
        let warehouse = &self.config.transfer.warehouse;
        let dir = if source.is_acid() && !self.config.migrate_acid.downgrade {
            warehouse.managed_directory.as_deref()
        } else {
            warehouse.external_directory.as_deref()
        };
        dir.map(namespace::normalize_dir)
    }

    /// Translate a table (or partition) location.
    ///
    /// `level` is the number of trailing directories the record treats as
    /// table-specific. `partition_spec` extends reset-to-default layouts.
    pub fn translate_table_location(
        &self,
        mirror: &mut TableMirror,
        original: &str,
        level: usize,
        partition_spec: Option<&str>,
    ) -> Result<String> {
        let env = self.record_environment();
        let source_ns = self.config.clusters.source.namespace.trim_end_matches('/');
        let target_ns = self.target_namespace();
        let original = original.trim();

        let relative = namespace::get_namespace(original).is_none();
        let relative_dir = if relative {
            mirror.add_issue(env, RELATIVE_PATH_ASSUMED);
            original.to_string()
        } else if let Some(rest) = original.strip_prefix(source_ns) {
            rest.to_string()
        } else {
            return Err(MigrateError::translation(
                original,
                format!(
                    "prefix doesn't match the source namespace `{}`. The translation can't be made reliably",
                    source_ns
                ),
            ));
        };
        let with_ns = |dir: &str| {
            if relative {
                dir.to_string()
            } else {
                format!("{}{}", target_ns, dir)
            }
        };

        let source_table = mirror.env_or_default(Environment::Source);
        let warehouse_dir = self.warehouse_dir(&source_table);

        let translated = match self.process_global_location_map(&relative_dir) {
            Some(mapped) => {
                mirror.remapped = true;
                with_ns(&mapped)
            }
            None if self.config.reset_to_default_location && warehouse_dir.is_some() => {
                let mut dir = format!(
                    "{}/{}.db/{}",
                    warehouse_dir.clone().unwrap_or_default(),
                    mirror.database,
                    mirror.name
                );
                if let Some(spec) = partition_spec {
                    dir.push('/');
                    dir.push_str(spec);
                }
                with_ns(&dir)
            }
            None => match self.config.data_strategy {
                DataStrategy::Linked | DataStrategy::Common => original.to_string(),
                DataStrategy::StorageMigration
                    if target_ns == source_ns && !self.config.reset_to_default_location =>
                {
                    return Err(MigrateError::translation(
                        original,
                        "no matching global location map entry and the namespace is unchanged",
                    ));
                }
                _ => with_ns(&relative_dir),
            },
        };

        if let Some(dir) = &warehouse_dir {
            let expected = with_ns(dir);
            if !translated.starts_with(&expected) {
                let args = [
                    if partition_spec.is_some() { "partition" } else { "table" }.to_string(),
                    translated.clone(),
                    expected.clone(),
                ];
                if self.config.translator.strict {
                    mirror.add_message(env, MessageCode::LocationNotMatchWarehouse, &args);
                    return Err(MigrateError::translation(
                        original,
                        format!("{} is outside the warehouse directory {}", translated, expected),
                    ));
                }
                mirror.add_message(env, MessageCode::LocationNotMatchWarehouseWarning, &args);
            }
        }

        debug!("Translate location: {} -> {}", original, translated);
        self.add_location(&mirror.database, env, original, &translated, level);
        Ok(translated)
    }

    /// Translate every partition of the source table into `target`.
    ///
    /// Partitions under the table directory reuse the translated table
    /// location and keep their relative path; others are translated on
    /// their own. Returns false when a partition has no location.
    pub fn translate_partition_locations(
        &self,
        mirror: &mut TableMirror,
        target: Environment,
        translated_table_location: Option<&str>,
    ) -> Result<bool> {
        let source = mirror.env_or_default(Environment::Source);
        let source_location = source.location();
        let mut ok = true;
        let mut translated = BTreeMap::new();

        for (spec, location) in &source.partitions {
            if location.trim().is_empty() {
                mirror.add_issue(target, format!("Partition {} has no location", spec));
                ok = false;
                continue;
            }
            let level = spec.matches('/').count() + 2;
            let suffix = source_location
                .as_deref()
                .and_then(|base| location.strip_prefix(base))
                .filter(|rest| rest.starts_with('/'));
            let new_location = match (translated_table_location, suffix) {
                (Some(base), Some(rest)) if !self.config.reset_to_default_location => {
                    let new_location = format!("{}{}", base, rest);
                    self.add_location(
                        &mirror.database,
                        self.record_environment(),
                        location,
                        &new_location,
                        level,
                    );
                    new_location
                }
                _ => self.translate_table_location(mirror, location, level, Some(spec))?,
            };
            translated.insert(spec.clone(), new_location);
        }

        mirror.environment_table_mut(target).partitions = translated;
        Ok(ok)
    }

    /// Record a rewrite. Writers on the same database serialise on the map
    /// entry.
    pub fn add_location(
        &self,
        database: &str,
        env: Environment,
        original: &str,
        target: &str,
        level: usize,
    ) {
        self.record
            .entry(database.to_string())
            .or_default()
            .add(
                env,
                TranslationLevel {
                    original: original.to_string(),
                    target: target.to_string(),
                    level,
                },
            );
    }

    /// Copy of the rewrites recorded for `database`.
    pub fn locations(&self, database: &str) -> Option<EnvironmentMap> {
        self.record.get(database).map(|m| m.clone())
    }

    /// Databases with recorded rewrites.
    pub fn databases(&self) -> Vec<String> {
        let mut dbs: Vec<String> = self.record.iter().map(|e| e.key().clone()).collect();
        dbs.sort();
        dbs
    }

    /// distcp plan: target directory (reduced by `consolidation_level`) to
    /// the source directories that feed it.
    pub fn distcp_plan(
        &self,
        database: &str,
        env: Environment,
        consolidation_level: usize,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let mut plan: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        if let Some(map) = self.record.get(database) {
            if let Some(set) = map.get(env) {
                for t in set {
                    let target =
                        namespace::reduce_url_by(&t.adjusted_target(), consolidation_level);
                    plan.entry(target).or_default().insert(t.adjusted_original());
                }
            }
        }
        plan
    }
}

/// `ALTER TABLE ... ADD` body with one line per partition.
pub fn build_partition_add_statement(table: &EnvironmentTable) -> String {
    table
        .partitions
        .iter()
        .map(|(spec, location)| {
            format!(
                "\tPARTITION ({}) LOCATION '{}' \n",
                definition::to_partition_spec(spec),
                location
            )
        })
        .collect()
}
