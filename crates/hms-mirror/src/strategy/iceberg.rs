use super::statements::*;
use super::{DataStrategy, Script, StrategyContext, StrategyHandler};
use crate::mirror::definition::get_property;
use crate::mirror::{Environment, TableMirror};

pub const NOT_ICEBERG_COMPATIBLE: &str = "Table is not compatible with Iceberg conversion.";

fn is_iceberg(definition: &[String]) -> bool {
    get_property(definition, "storage_handler")
        .map(|h| h == ICEBERG_STORAGE_HANDLER)
        .unwrap_or(false)
        || definition.iter().any(|l| l.contains(ICEBERG_STORAGE_HANDLER))
}

/// Convert a Hive table to Iceberg in place by switching its storage
/// handler.
pub struct IcebergConversionStrategy;

impl StrategyHandler for IcebergConversionStrategy {
    fn kind(&self) -> DataStrategy {
        DataStrategy::IcebergConversion
    }

    fn build_definition(&self, ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let source = mirror.env_or_default(Environment::Source);
        if source.is_acid()
            || source.is_view()
            || !source.is_hive_native()
            || ctx.config.clusters.source.legacy_hive
        {
            mirror.add_issue(Environment::Source, NOT_ICEBERG_COMPATIBLE);
            return false;
        }
        if is_iceberg(&source.definition) {
            mirror.add_issue(
                Environment::Source,
                "Table has already been converted.  Is currently ICEBERG.",
            );
            return false;
        }
        true
    }

    fn build_sql(&self, _ctx: &StrategyContext, mirror: &mut TableMirror) -> bool {
        let database = mirror.database.clone();
        let source = mirror.environment_table_mut(Environment::Source);
        let mut properties = format!(
            "'storage_handler'='{}','format-version'='2'",
            ICEBERG_STORAGE_HANDLER
        );
        match source.file_format() {
            Some(format) if format != "PARQUET" => {
                properties.push_str(&format!(",'write.format.default'='{}'", format.to_lowercase()));
            }
            _ => {}
        }
        let name = source.name.clone();
        source.add_sql(USE_DESC, use_db(&database));
        source.add_sql(SET_PROPERTY_DESC, set_properties(&name, &properties));
        true
    }

    fn execution_plan(&self, _ctx: &StrategyContext, _mirror: &TableMirror) -> Vec<(Environment, Script)> {
        vec![(Environment::Source, Script::Main)]
    }
}
