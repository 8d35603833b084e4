//! Helpers over `SHOW CREATE TABLE` output held as ordered lines.
//!
//! Hive renders one clause keyword per line (`LOCATION`, `TBLPROPERTIES (`,
//! ...) followed by its value on the next line, so most operations locate a
//! keyword line and work relative to it. Comparisons use trimmed lines because
//! Hive leaves trailing spaces on several keyword lines.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

pub const CREATE: &str = "CREATE";
pub const CREATE_TABLE: &str = "CREATE TABLE";
pub const CREATE_EXTERNAL_TABLE: &str = "CREATE EXTERNAL TABLE";
pub const CREATE_VIEW: &str = "CREATE VIEW";
pub const PARTITIONED_BY: &str = "PARTITIONED BY";
pub const CLUSTERED_BY: &str = "CLUSTERED BY";
pub const ROW_FORMAT_SERDE: &str = "ROW FORMAT SERDE";
pub const ROW_FORMAT_DELIMITED: &str = "ROW FORMAT DELIMITED";
pub const STORED_AS_INPUTFORMAT: &str = "STORED AS INPUTFORMAT";
pub const STORED_BY: &str = "STORED BY";
pub const OUTPUTFORMAT: &str = "OUTPUTFORMAT";
pub const LOCATION: &str = "LOCATION";
pub const WITH_SERDEPROPERTIES: &str = "WITH SERDEPROPERTIES (";
pub const TBL_PROPERTIES: &str = "TBLPROPERTIES (";
pub const INTO: &str = "INTO";
pub const BUCKETS: &str = "BUCKETS";

pub const TRANSACTIONAL: &str = "transactional";
pub const TRANSACTIONAL_PROPERTIES: &str = "transactional_properties";
pub const BUCKETING_VERSION: &str = "bucketing_version";
pub const EXTERNAL_TABLE_PURGE: &str = "external.table.purge";
pub const DISCOVER_PARTITIONS: &str = "discover.partitions";
pub const TRANSLATED_TO_EXTERNAL: &str = "TRANSLATED_TO_EXTERNAL";
pub const DOWNGRADED_FROM_ACID: &str = "downgraded_from_acid";
pub const AVRO_SCHEMA_URL: &str = "avro.schema.url";

pub const HMS_MIRROR_LEGACY_MANAGED_FLAG: &str = "hmsMirror_LegacyManaged";
pub const HMS_MIRROR_CONVERTED_FLAG: &str = "hmsMirror_Converted";
pub const HMS_MIRROR_METADATA_FLAG: &str = "hmsMirror_Metadata_Stage1";
pub const HMS_MIRROR_STORAGE_SQL_FLAG: &str = "hmsMirror_Storage_SQL_Stage2";
pub const HMS_MIRROR_STORAGE_IMPORT_FLAG: &str = "hmsMirror_Storage_IMPORT_Stage2";
pub const HMS_MIRROR_SHADOW_FLAG: &str = "hmsMirror_Shadow_Stage2";
pub const HMS_STORAGE_MIGRATION_FLAG: &str = "hms-mirror-STORAGE_MIGRATED";

/// Properties that describe table state on the source cluster and are
/// meaningless (or harmful) on a freshly created copy.
pub const STATISTICS_PROPERTIES: [&str; 10] = [
    "COLUMN_STATS_ACCURATE",
    "numFiles",
    "numRows",
    "rawDataSize",
    "totalSize",
    DISCOVER_PARTITIONS,
    "transient_lastDdlTime",
    "external",
    "last_modified_by",
    "last_modified_time",
];

static CREATE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(CREATE\s+(?:EXTERNAL\s+|TEMPORARY\s+)?(?:TABLE|VIEW)\s+(?:IF\s+NOT\s+EXISTS\s+)?)(?:`?([A-Za-z0-9_]+)`?\.)?`?([A-Za-z0-9_]+)`?",
    )
    .unwrap()
});

fn trimmed_index(definition: &[String], keyword: &str) -> Option<usize> {
    definition.iter().position(|l| l.trim() == keyword)
}

fn create_line_index(definition: &[String]) -> Option<usize> {
    definition
        .iter()
        .position(|l| l.trim_start().starts_with(CREATE))
}

fn strip_quotes(value: &str) -> String {
    value.trim().trim_matches(|c| c == '\'' || c == '"').to_string()
}

/// Table name from the `CREATE` line, without database qualifier.
pub fn table_name(definition: &[String]) -> Option<String> {
    let idx = create_line_index(definition)?;
    CREATE_LINE
        .captures(definition[idx].trim_start())
        .and_then(|c| c.get(3))
        .map(|m| m.as_str().to_string())
}

/// Remove the `db.` qualifier from the `CREATE` line.
pub fn strip_database(definition: &mut [String]) {
    if let Some(idx) = create_line_index(definition) {
        let line = definition[idx].trim_start().to_string();
        definition[idx] = CREATE_LINE.replace(&line, "$1`$3`").into_owned();
    }
}

/// Rename the table on the `CREATE` line. Any database qualifier is dropped.
pub fn set_table_name(definition: &mut [String], new_name: &str) -> bool {
    match create_line_index(definition) {
        Some(idx) => {
            let line = definition[idx].trim_start().to_string();
            if !CREATE_LINE.is_match(&line) {
                return false;
            }
            let replacement = format!("${{1}}`{}`", new_name);
            definition[idx] = CREATE_LINE
                .replace(&line, replacement.as_str())
                .into_owned();
            true
        }
        None => false,
    }
}

pub fn is_managed(definition: &[String]) -> bool {
    definition.iter().any(|l| l.starts_with(CREATE_TABLE))
}

pub fn is_external(definition: &[String]) -> bool {
    definition.iter().any(|l| l.starts_with(CREATE_EXTERNAL_TABLE))
}

pub fn is_view(definition: &[String]) -> bool {
    definition
        .iter()
        .any(|l| l.trim_start().starts_with(CREATE_VIEW))
}

pub fn is_partitioned(definition: &[String]) -> bool {
    definition.iter().any(|l| l.starts_with(PARTITIONED_BY))
}

/// Native Hive tables carry a LOCATION; storage-handler tables (HBase, Kafka,
/// JDBC) do not, or declare `STORED BY`.
pub fn is_hive_native(definition: &[String]) -> bool {
    let stored_by = definition
        .iter()
        .any(|l| l.trim_start().starts_with(STORED_BY));
    !stored_by && definition.iter().any(|l| l.trim().starts_with(LOCATION))
}

fn property_is_true(definition: &[String], key: &str) -> bool {
    get_property(definition, key)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn is_acid(definition: &[String]) -> bool {
    is_managed(definition) && property_is_true(definition, TRANSACTIONAL)
}

pub fn is_external_purge(definition: &[String]) -> bool {
    is_external(definition) && property_is_true(definition, EXTERNAL_TABLE_PURGE)
}

pub fn is_hms_converted(definition: &[String]) -> bool {
    property_is_true(definition, HMS_MIRROR_CONVERTED_FLAG)
}

pub fn is_hms_legacy_managed(definition: &[String]) -> bool {
    property_is_true(definition, HMS_MIRROR_LEGACY_MANAGED_FLAG)
}

/// Table location with quotes removed.
pub fn location(definition: &[String]) -> Option<String> {
    let idx = trimmed_index(definition, LOCATION)?;
    definition.get(idx + 1).map(|l| strip_quotes(l))
}

/// Drop the LOCATION clause.
pub fn strip_location(definition: &mut Vec<String>) -> bool {
    match trimmed_index(definition, LOCATION) {
        Some(idx) if idx + 1 < definition.len() => {
            definition.drain(idx..=idx + 1);
            true
        }
        _ => false,
    }
}

/// Point LOCATION (and a Spark `'path'` serde property) at `new_location`.
/// Adds a LOCATION clause before TBLPROPERTIES when the table has none.
pub fn set_location(definition: &mut Vec<String>, new_location: &str) -> bool {
    let quoted = format!("  '{}'", new_location.replace('\'', ""));
    let updated = match trimmed_index(definition, LOCATION) {
        Some(idx) if idx + 1 < definition.len() => {
            definition[idx + 1] = quoted;
            true
        }
        _ => {
            let at = trimmed_index(definition, TBL_PROPERTIES).unwrap_or(definition.len());
            definition.insert(at, LOCATION.to_string());
            definition.insert(at + 1, quoted);
            true
        }
    };

    if let Some(wsp) = trimmed_index(definition, WITH_SERDEPROPERTIES) {
        for line in definition.iter_mut().skip(wsp + 1) {
            let t = line.trim().to_string();
            if t.starts_with("'path'=") {
                let mut prop = format!("  'path'='{}'", new_location.replace('\'', ""));
                if t.ends_with(',') {
                    prop.push(',');
                } else if t.ends_with(')') {
                    prop.push(')');
                }
                *line = prop;
                break;
            }
            if t.ends_with(')') {
                break;
            }
        }
    }
    updated
}

/// Number of buckets from `INTO n BUCKETS`, 0 when not bucketed.
pub fn num_buckets(definition: &[String]) -> u32 {
    definition
        .iter()
        .map(|l| l.trim())
        .find(|l| l.starts_with(INTO) && l.contains(BUCKETS))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Remove the CLUSTERED BY ... INTO n BUCKETS clause when the bucket count is
/// at or below `threshold`. A negative threshold disables removal.
pub fn remove_buckets(definition: &mut Vec<String>, threshold: i32) -> bool {
    if threshold < 0 || i64::from(num_buckets(definition)) > i64::from(threshold) {
        return false;
    }
    let start = match definition
        .iter()
        .position(|l| l.trim_start().starts_with(CLUSTERED_BY))
    {
        Some(s) => s,
        None => return false,
    };
    let end = match definition
        .iter()
        .skip(start)
        .position(|l| l.contains(BUCKETS))
    {
        Some(offset) => start + offset,
        None => return false,
    };
    definition.drain(start..=end);
    true
}

/// Convert a managed table to EXTERNAL and drop the transactional markers.
pub fn make_external(definition: &mut Vec<String>) -> bool {
    if !is_managed(definition) {
        return false;
    }
    for line in definition.iter_mut() {
        if line.starts_with(CREATE_TABLE) {
            *line = line.replacen(CREATE_TABLE, CREATE_EXTERNAL_TABLE, 1);
        }
    }
    remove_property(definition, TRANSACTIONAL);
    remove_property(definition, TRANSACTIONAL_PROPERTIES);
    remove_property(definition, BUCKETING_VERSION);
    true
}

/// Partition column names joined with commas, e.g. `` `dt`,`region` ``.
pub fn partition_elements(definition: &[String]) -> Option<String> {
    let start = definition
        .iter()
        .position(|l| l.trim_start().starts_with(PARTITIONED_BY))?;
    let section_end = |l: &String| {
        let t = l.trim_start();
        [
            ROW_FORMAT_SERDE,
            ROW_FORMAT_DELIMITED,
            STORED_AS_INPUTFORMAT,
            STORED_BY,
            OUTPUTFORMAT,
            CLUSTERED_BY,
            LOCATION,
            TBL_PROPERTIES,
        ]
        .iter()
        .any(|k| t.starts_with(k))
    };
    let end = definition
        .iter()
        .skip(start + 1)
        .position(section_end)
        .map(|p| p + start + 1)
        .unwrap_or(definition.len());
    let columns: Vec<&str> = definition[start + 1..end]
        .iter()
        .filter_map(|l| l.split_whitespace().next())
        .collect();
    if columns.is_empty() {
        None
    } else {
        Some(columns.join(","))
    }
}

/// Storage format inferred from the serde class.
pub fn file_format(definition: &[String]) -> Option<&'static str> {
    let idx = trimmed_index(definition, ROW_FORMAT_SERDE)?;
    let serde = definition.get(idx + 1)?.to_lowercase();
    if serde.contains("orc") {
        Some("ORC")
    } else if serde.contains("parquet") {
        Some("PARQUET")
    } else if serde.contains("avro") {
        Some("AVRO")
    } else if serde.contains("lazysimpleserde") || serde.contains("opencsv") {
        Some("TEXTFILE")
    } else if serde.contains("json") {
        Some("JSONFILE")
    } else {
        None
    }
}

/// Deterministic fingerprint of the column section: every line after the
/// `CREATE` line up to LOCATION, trimmed. Table name and storage location do
/// not contribute.
pub fn fields_fingerprint(definition: &[String]) -> String {
    let mut hasher = Sha256::new();
    for line in definition.iter().skip(1) {
        let t = line.trim();
        if t == LOCATION || t == TBL_PROPERTIES {
            break;
        }
        hasher.update(t.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// `a=1/b=2` to `a="1",b="2"`.
pub fn to_partition_spec(simple: &str) -> String {
    simple
        .split('/')
        .filter(|p| !p.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => format!("{}=\"{}\"", k, v),
            None => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// TBLPROPERTIES
// ---------------------------------------------------------------------------

fn properties_range(definition: &[String]) -> Option<(usize, usize)> {
    let start = trimmed_index(definition, TBL_PROPERTIES)?;
    let end = definition
        .iter()
        .skip(start + 1)
        .position(|l| l.trim_end().ends_with(')'))
        .map(|p| p + start + 1)?;
    Some((start, end))
}

fn parse_property(line: &str) -> (String, Option<String>) {
    let t = line.trim();
    let t = t
        .strip_suffix(',')
        .or_else(|| t.strip_suffix(')'))
        .unwrap_or(t)
        .trim();
    match t.split_once('=') {
        Some((k, v)) => (strip_quotes(k), Some(strip_quotes(v))),
        None => (strip_quotes(t), None),
    }
}

fn read_properties(definition: &[String]) -> Vec<(String, Option<String>)> {
    match properties_range(definition) {
        Some((start, end)) => definition[start + 1..=end]
            .iter()
            .map(|l| parse_property(l))
            .collect(),
        None => Vec::new(),
    }
}

fn write_properties(definition: &mut Vec<String>, props: &[(String, Option<String>)]) {
    let rendered: Vec<String> = props
        .iter()
        .enumerate()
        .map(|(i, (k, v))| {
            let mut line = match v {
                Some(v) => format!("  '{}'='{}'", k, v),
                None => format!("  '{}'", k),
            };
            line.push(if i + 1 == props.len() { ')' } else { ',' });
            line
        })
        .collect();

    match properties_range(definition) {
        Some((start, end)) => {
            if rendered.is_empty() {
                definition.drain(start..=end);
            } else {
                definition.splice(start + 1..=end, rendered);
            }
        }
        None => {
            if !rendered.is_empty() {
                definition.push(TBL_PROPERTIES.to_string());
                definition.extend(rendered);
            }
        }
    }
}

/// Property value (quotes removed), matched case-insensitively.
pub fn get_property(definition: &[String], key: &str) -> Option<String> {
    read_properties(definition)
        .into_iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .and_then(|(_, v)| v)
}

pub fn has_property(definition: &[String], key: &str) -> bool {
    read_properties(definition)
        .iter()
        .any(|(k, _)| k.eq_ignore_ascii_case(key))
}

/// Add or replace a property. New properties go first in the block.
pub fn upsert_property(definition: &mut Vec<String>, key: &str, value: &str) {
    let mut props = read_properties(definition);
    match props.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
        Some(existing) => existing.1 = Some(value.to_string()),
        None => props.insert(0, (key.to_string(), Some(value.to_string()))),
    }
    write_properties(definition, &props);
}

/// Remove a property if present.
pub fn remove_property(definition: &mut Vec<String>, key: &str) -> bool {
    let mut props = read_properties(definition);
    let before = props.len();
    props.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    if props.len() == before {
        return false;
    }
    write_properties(definition, &props);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    fn acid_table() -> Vec<String> {
        lines(
            "CREATE TABLE `sales`.`orders`(
  `id` int,
  `amount` double)
PARTITIONED BY (
  `dt` string,
  `region` string)
CLUSTERED BY (
  id)
INTO 2 BUCKETS
ROW FORMAT SERDE
  'org.apache.hadoop.hive.ql.io.orc.OrcSerde'
STORED AS INPUTFORMAT
  'org.apache.hadoop.hive.ql.io.orc.OrcInputFormat'
OUTPUTFORMAT
  'org.apache.hadoop.hive.ql.io.orc.OrcOutputFormat'
LOCATION
  'hdfs://prod/warehouse/tablespace/managed/hive/sales.db/orders'
TBLPROPERTIES (
  'bucketing_version'='2',
  'transactional'='true',
  'transactional_properties'='default',
  'transient_lastDdlTime'='1650000000')",
        )
    }

    #[test]
    fn test_table_name_and_strip_database() {
        let mut def = acid_table();
        assert_eq!(table_name(&def).as_deref(), Some("orders"));
        strip_database(&mut def);
        assert_eq!(def[0], "CREATE TABLE `orders`(");
    }

    #[test]
    fn test_set_table_name() {
        let mut def = acid_table();
        assert!(set_table_name(&mut def, "orders_archive"));
        assert_eq!(def[0], "CREATE TABLE `orders_archive`(");
    }

    #[test]
    fn test_classification() {
        let def = acid_table();
        assert!(is_managed(&def));
        assert!(!is_external(&def));
        assert!(is_acid(&def));
        assert!(is_partitioned(&def));
        assert!(is_hive_native(&def));
        assert!(!is_view(&def));
        assert_eq!(file_format(&def), Some("ORC"));
    }

    #[test]
    fn test_location_roundtrip() {
        let mut def = acid_table();
        assert_eq!(
            location(&def).as_deref(),
            Some("hdfs://prod/warehouse/tablespace/managed/hive/sales.db/orders")
        );
        set_location(&mut def, "s3a://bucket/orders");
        assert_eq!(location(&def).as_deref(), Some("s3a://bucket/orders"));
        assert!(strip_location(&mut def));
        assert_eq!(location(&def), None);
        set_location(&mut def, "s3a://bucket/again");
        let loc_idx = def.iter().position(|l| l == LOCATION).unwrap();
        assert_eq!(def[loc_idx + 2], TBL_PROPERTIES);
    }

    #[test]
    fn test_bucket_threshold_is_inclusive() {
        let mut def = acid_table();
        assert_eq!(num_buckets(&def), 2);
        assert!(!remove_buckets(&mut def.clone(), 1));
        assert!(remove_buckets(&mut def, 2));
        assert_eq!(num_buckets(&def), 0);
        assert!(!def.iter().any(|l| l.contains("CLUSTERED BY")));
        assert!(!def.iter().any(|l| l.contains("BUCKETS")));
    }

    #[test]
    fn test_bucket_removal_disabled_by_negative_threshold() {
        let mut def = acid_table();
        assert!(!remove_buckets(&mut def, -1));
        assert_eq!(num_buckets(&def), 2);
    }

    #[test]
    fn test_partition_elements() {
        let def = acid_table();
        assert_eq!(partition_elements(&def).as_deref(), Some("`dt`,`region`"));
    }

    #[test]
    fn test_properties() {
        let mut def = acid_table();
        assert_eq!(get_property(&def, "transactional").as_deref(), Some("true"));
        assert!(remove_property(&mut def, "transactional"));
        assert!(!has_property(&def, "transactional"));
        upsert_property(&mut def, EXTERNAL_TABLE_PURGE, "true");
        assert_eq!(get_property(&def, EXTERNAL_TABLE_PURGE).as_deref(), Some("true"));
        upsert_property(&mut def, EXTERNAL_TABLE_PURGE, "false");
        assert_eq!(get_property(&def, EXTERNAL_TABLE_PURGE).as_deref(), Some("false"));
        assert!(def.last().unwrap().ends_with(')'));
    }

    #[test]
    fn test_removing_last_property_drops_block() {
        let mut def = lines("CREATE EXTERNAL TABLE `t`(\n  `a` int)\nLOCATION\n  'hdfs://x/t'\nTBLPROPERTIES (\n  'k'='v')");
        assert!(remove_property(&mut def, "k"));
        assert!(!def.iter().any(|l| l == TBL_PROPERTIES));
        upsert_property(&mut def, "k2", "v2");
        assert_eq!(def[def.len() - 2], TBL_PROPERTIES);
        assert_eq!(def[def.len() - 1], "  'k2'='v2')");
    }

    #[test]
    fn test_make_external() {
        let mut def = acid_table();
        assert!(make_external(&mut def));
        assert!(def[0].starts_with(CREATE_EXTERNAL_TABLE));
        assert!(!has_property(&def, TRANSACTIONAL));
        assert!(!has_property(&def, BUCKETING_VERSION));
        assert!(!make_external(&mut def));
    }

    #[test]
    fn test_fingerprint_ignores_name_and_location() {
        let a = acid_table();
        let mut b = acid_table();
        set_table_name(&mut b, "other");
        set_location(&mut b, "s3a://elsewhere");
        assert_eq!(fields_fingerprint(&a), fields_fingerprint(&b));

        let mut c = acid_table();
        c[2] = "  `amount` decimal(10,2))".to_string();
        assert_ne!(fields_fingerprint(&a), fields_fingerprint(&c));
    }

    #[test]
    fn test_to_partition_spec() {
        assert_eq!(to_partition_spec("dt=2024-01-01/region=eu"), "dt=\"2024-01-01\",region=\"eu\"");
    }

    #[test]
    fn test_storage_handler_not_native() {
        let def = lines("CREATE EXTERNAL TABLE `t`(\n  `a` int)\nSTORED BY \n  'org.apache.hadoop.hive.hbase.HBaseStorageHandler'\nTBLPROPERTIES (\n  'k'='v')");
        assert!(!is_hive_native(&def));
    }
}
