//! HiveQL statement text and the descriptions that annotate it in scripts.

pub const USE_DESC: &str = "Selecting DB";
pub const CREATE_DESC: &str = "Creating Table";
pub const CREATE_TRANSFER_DESC: &str = "Creating Transfer Table";
pub const CREATE_SHADOW_DESC: &str = "Creating Shadow Table";
pub const DROP_DESC: &str = "Dropping Table";
pub const DROP_SHADOW_DESC: &str = "Dropping Shadow Table";
pub const DROP_TRANSFER_DESC: &str = "Dropping Transfer Table";
pub const DROP_ARCHIVE_DESC: &str = "Dropping Archive Table";
pub const RENAME_DESC: &str = "RENAME Table";
pub const SET_OWNER_DESC: &str = "Set table owner";
pub const EXPORT_DESC: &str = "EXPORT Table";
pub const IMPORT_DESC: &str = "IMPORT Table";
pub const REPAIR_DESC: &str = "Repairing Table (MSCK)";
pub const ADD_PARTITIONS_DESC: &str = "Add partitions with explicit locations";
pub const ALTER_LOCATION_DESC: &str = "Alter table location";
pub const UNSET_PROPERTY_DESC: &str = "Remove table property";
pub const SET_PROPERTY_DESC: &str = "Set table properties";
pub const TEZ_DESC: &str = "Set 'tez' as the execution engine";
pub const TRANSFER_DESC: &str = "Moving data to new table";
pub const LOAD_FROM_SHADOW_DESC: &str = "Loading table from Shadow";
pub const CLEANUP_DESC: &str = "Post Migration Cleanup";
pub const DISTCP_NOTE: &str = "-- Run distcp commands";
pub const DISTCP_TARGET_NOTE: &str = "-- Run the Distcp output to migrate data.";
pub const CLEANUP_NOTE: &str = "-- To be run AFTER final TARGET SQL statements.";

pub const SORT_DYNAMIC_PARTITION: &str = "hive.optimize.sort.dynamic.partition";
pub const SORT_DYNAMIC_PARTITION_THRESHOLD: &str = "hive.optimize.sort.dynamic.partition.threshold";
pub const SET_TEZ_AS_EXECUTION_ENGINE: &str = "set hive.execution.engine=tez";

pub const ICEBERG_STORAGE_HANDLER: &str = "org.apache.iceberg.mr.hive.HiveIcebergStorageHandler";

pub fn transfer_partition_desc(count: usize) -> String {
    format!("Moving data to partitioned ({}) transfer table", count)
}

pub fn load_from_partitioned_shadow_desc(count: usize) -> String {
    format!("Loading table from Partitioned ({}) Shadow", count)
}

pub fn storage_migration_desc(count: usize) -> String {
    format!("Moving data to partitioned ({}) table in the new storage location", count)
}

pub fn setting_desc(key: &str) -> String {
    format!("Setting {}", key)
}

pub fn partition_location_desc(spec: &str) -> String {
    format!("Alter partition ({}) location", spec)
}

pub fn use_db(database: &str) -> String {
    format!("USE {}", database)
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table)
}

pub fn drop_view(view: &str) -> String {
    format!("DROP VIEW IF EXISTS {}", view)
}

pub fn rename_table(from: &str, to: &str) -> String {
    format!("ALTER TABLE {} RENAME TO {}", from, to)
}

pub fn set_owner(table: &str, owner: &str) -> String {
    format!("ALTER TABLE {} SET OWNER USER {}", table, owner)
}

pub fn export_table(table: &str, location: &str) -> String {
    format!("EXPORT TABLE {} TO \"{}\"", table, location)
}

pub fn import_table(table: &str, location: &str) -> String {
    format!("IMPORT TABLE {} FROM \"{}\"", table, location)
}

pub fn import_external_table(table: &str, location: &str) -> String {
    format!("IMPORT EXTERNAL TABLE {} FROM \"{}\"", table, location)
}

pub fn import_external_table_at(table: &str, location: &str, table_location: &str) -> String {
    format!(
        "IMPORT EXTERNAL TABLE {} FROM \"{}\" LOCATION \"{}\"",
        table, location, table_location
    )
}

pub fn alter_table_location(table: &str, location: &str) -> String {
    format!("ALTER TABLE {} SET LOCATION \"{}\"", table, location)
}

pub fn alter_partition_location(table: &str, spec: &str, location: &str) -> String {
    format!(
        "ALTER TABLE {} PARTITION ({}) SET LOCATION \"{}\"",
        table, spec, location
    )
}

pub fn add_partitions(table: &str, partitions: &str) -> String {
    format!("ALTER TABLE {} ADD IF NOT EXISTS\n{}", table, partitions)
}

pub fn msck_repair(table: &str) -> String {
    format!("MSCK REPAIR TABLE {}", table)
}

pub fn unset_property(table: &str, key: &str) -> String {
    format!("ALTER TABLE {} UNSET TBLPROPERTIES (\"{}\")", table, key)
}

pub fn set_properties(table: &str, properties: &str) -> String {
    format!("ALTER TABLE {} SET TBLPROPERTIES ({})", table, properties)
}

pub fn set_session(key: &str, value: &str) -> String {
    format!("set {}={}", key, value)
}

pub fn insert_overwrite(source: &str, target: &str) -> String {
    format!("FROM {} INSERT OVERWRITE TABLE {} SELECT *", source, target)
}

pub fn insert_overwrite_declarative(source: &str, target: &str, partitions: &str) -> String {
    format!(
        "FROM {} INSERT OVERWRITE TABLE {} PARTITION ({}) SELECT *",
        source, target, partitions
    )
}

pub fn insert_overwrite_prescriptive(
    source: &str,
    target: &str,
    partitions: &str,
    distribute_by: &str,
) -> String {
    format!(
        "FROM {} INSERT OVERWRITE TABLE {} PARTITION ({}) SELECT * DISTRIBUTE BY {}",
        source, target, partitions, distribute_by
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_forms() {
        assert_eq!(
            insert_overwrite("a", "b"),
            "FROM a INSERT OVERWRITE TABLE b SELECT *"
        );
        assert_eq!(
            insert_overwrite_prescriptive("a", "b", "`dt`", "`dt`"),
            "FROM a INSERT OVERWRITE TABLE b PARTITION (`dt`) SELECT * DISTRIBUTE BY `dt`"
        );
    }

    #[test]
    fn test_import_forms() {
        assert_eq!(
            import_external_table_at("t", "hdfs://a/x", "hdfs://b/t"),
            "IMPORT EXTERNAL TABLE t FROM \"hdfs://a/x\" LOCATION \"hdfs://b/t\""
        );
        assert_eq!(export_table("t", "/x"), "EXPORT TABLE t TO \"/x\"");
    }
}
