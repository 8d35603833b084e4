//! In-place ACID downgrades on the source cluster.
//!
//! The ACID table is renamed out of the way (`<name>_archive`), an EXTERNAL
//! table is created under the original name and loaded from the archive,
//! and the archive is dropped on cleanup.

use super::base;
use super::export_import::{export_import_limit, export_location};
use super::statements::*;
use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::copy_spec::CopySpec;
use crate::mirror::definition::{self, TRANSLATED_TO_EXTERNAL};
use crate::mirror::{Environment, TableMirror};

const ARCHIVE_SUFFIX: &str = "_archive";

/// EXTERNAL replacement definition, built into the target slot.
fn build_downgraded_definition(ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
    let mut spec = CopySpec::new(Environment::Source, Environment::Target);
    spec.set_take_ownership(true)
        .set_make_external(true)
        .set_strip_location(true);
    base::build_table_schema(ctx, mirror, &spec)
}

/// Unset `TRANSLATED_TO_EXTERNAL` and rename the source to its archive
/// name. Returns the archive name.
fn archive_source(mirror: &mut TableMirror) -> String {
    let database = mirror.database.clone();
    let name = mirror.name.clone();
    let archive = format!("{}{}", name, ARCHIVE_SUFFIX);

    let source = mirror.environment_table_mut(Environment::Source);
    source.add_sql(USE_DESC, use_db(&database));
    if definition::has_property(&source.definition, TRANSLATED_TO_EXTERNAL) {
        source.add_sql(UNSET_PROPERTY_DESC, unset_property(&name, TRANSLATED_TO_EXTERNAL));
    }
    source.add_sql(RENAME_DESC, rename_table(&name, &archive));
    source.name = archive.clone();
    definition::set_table_name(&mut source.definition, &archive);
    source.add_cleanup_sql(DROP_ARCHIVE_DESC, drop_table(&archive));
    archive
}

/// Rename, recreate as EXTERNAL, reload with `INSERT OVERWRITE`.
pub struct SqlAcidDowngradeInplaceStrategy;

impl StrategyHandler for SqlAcidDowngradeInplaceStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::SqlAcidDowngradeInplace
    }

    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        build_downgraded_definition(ctx, mirror)
    }

    fn build_sql(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let config = &ctx.config;
        if !base::check_partition_limit(
            mirror,
            Environment::Source,
            config.migrate_acid.partition_limit,
            "migrate_acid->partition_limit",
        ) {
            return false;
        }

        let name = mirror.name.clone();
        let archive = archive_source(mirror);
        let create = base::create_statement(config, mirror, Environment::Target);
        mirror
            .environment_table_mut(Environment::Source)
            .add_sql(CREATE_DESC, create);
        base::add_owner_sql(ctx, mirror, Environment::Source, &name);

        base::add_session_overrides(config, mirror, Environment::Source);
        let count = mirror.source_partition_count();
        base::add_transfer_sql(
            ctx,
            mirror,
            Environment::Source,
            &archive,
            &name,
            &storage_migration_desc(count),
            TRANSFER_DESC,
        );
        true
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        vec![
            (Environment::Source, Script::Main),
            (Environment::Source, Script::Cleanup),
        ]
    }
}

/// Rename, `EXPORT` the archive, `IMPORT EXTERNAL` under the original name.
pub struct ExportImportAcidDowngradeInplaceStrategy;

impl StrategyHandler for ExportImportAcidDowngradeInplaceStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::ExportImportAcidDowngradeInplace
    }

    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        build_downgraded_definition(ctx, mirror)
    }

    fn build_sql(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        if !export_import_limit(ctx, mirror) {
            return false;
        }
        let name = mirror.name.clone();
        let location = export_location(ctx, mirror, &name);
        let archive = archive_source(mirror);

        let source = mirror.environment_table_mut(Environment::Source);
        source.add_sql(EXPORT_DESC, export_table(&archive, &location));
        source.add_sql(IMPORT_DESC, import_external_table(&name, &location));
        base::add_owner_sql(ctx, mirror, Environment::Source, &name);
        true
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        vec![
            (Environment::Source, Script::Main),
            (Environment::Source, Script::Cleanup),
        ]
    }
}

/// SQL for legacy sources and large partition counts, EXPORT/IMPORT
/// otherwise.
pub struct HybridAcidDowngradeInplaceStrategy;

impl StrategyHandler for HybridAcidDowngradeInplaceStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::HybridAcidDowngradeInplace
    }

    fn route(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> Option<DataStrategy> {
        let config = &ctx.config;
        if config.clusters.source.legacy_hive {
            return Some(DataStrategy::SqlAcidDowngradeInplace);
        }
        let source = mirror.env_or_default(Environment::Source);
        let limit = config.hybrid.export_import_partition_limit;
        if source.is_partitioned() && limit > 0 && source.partition_count() > limit {
            Some(DataStrategy::SqlAcidDowngradeInplace)
        } else {
            Some(DataStrategy::ExportImportAcidDowngradeInplace)
        }
    }

    // Routing always picks a concrete strategy.
    fn build_definition(&self, _ctx: &StrategyContext, _mirror: &mut TableMirror) -> bool {
        false
    }

    fn build_sql(&self, _ctx: &StrategyContext, _mirror: &mut TableMirror) -> bool {
        false
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        Vec::new()
    }
}
