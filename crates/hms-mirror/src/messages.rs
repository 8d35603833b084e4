//! Coded errors and warnings, and their bitset return-code encoding.
//!
//! Every [`MessageCode`] owns a fixed bit position. A run's aggregate state is
//! the OR of `1 << code` over every code that fired; the CLI reports the
//! negated value so a non-zero exit status can be decoded back into the set
//! of codes with [`MessageCode::decode`].
//!
//! Code numbers are part of the external contract. Never renumber a variant;
//! retired codes stay reserved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of coded configuration and planning messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageCode {
    // Errors. 5, 8, 10-16 and 21 are reserved (connection checks live outside this crate).
    ValidSyncStrategies,
    ValidAcidStrategies,
    AcidNotTopLevelStrategy,
    CommonStorageWithLinked,
    IntermediateStorageWithLinked,
    LegacyHiveTargetCluster,
    DowngradeOnlyForAcid,
    ReplaceOnlyWithDowngrade,
    ConfigurationRemovedOrInvalid,
    StorageMigrationRequiredNamespace,
    StorageMigrationRequiredStrategy,
    StorageMigrationRequiredWarehouseOptions,
    ResetToDefaultLocation,
    CommonStorageWithDowngradeInPlace,
    IntermediateStorageWithDowngradeInPlace,
    ValidAcidDowngradeInPlaceStrategies,
    DowngradeInPlaceNonLegacy,
    NonLegacyToLegacy,
    StorageMigrationDistcpAcid,
    LocationNotMatchWarehouse,
    PartitionLimitExceeded,
    TablePlanningFailed,
    EvaluatePartitionLocationUse,
    WarehouseDirsSameDir,

    // Warnings.
    ResetToDefaultLocationWarning,
    ResetToDefaultLocationWithoutWarehouseDirs,
    LocationNotMatchWarehouseWarning,
    TableLocationRemapped,
    TableLocationForced,
    StorageMigrationNamespaceSource,
    EvaluatePartitionLocation,
}

impl MessageCode {
    /// Every code, in declaration order.
    pub const ALL: [MessageCode; 31] = [
        MessageCode::ValidSyncStrategies,
        MessageCode::ValidAcidStrategies,
        MessageCode::AcidNotTopLevelStrategy,
        MessageCode::CommonStorageWithLinked,
        MessageCode::IntermediateStorageWithLinked,
        MessageCode::LegacyHiveTargetCluster,
        MessageCode::DowngradeOnlyForAcid,
        MessageCode::ReplaceOnlyWithDowngrade,
        MessageCode::ConfigurationRemovedOrInvalid,
        MessageCode::StorageMigrationRequiredNamespace,
        MessageCode::StorageMigrationRequiredStrategy,
        MessageCode::StorageMigrationRequiredWarehouseOptions,
        MessageCode::ResetToDefaultLocation,
        MessageCode::CommonStorageWithDowngradeInPlace,
        MessageCode::IntermediateStorageWithDowngradeInPlace,
        MessageCode::ValidAcidDowngradeInPlaceStrategies,
        MessageCode::DowngradeInPlaceNonLegacy,
        MessageCode::NonLegacyToLegacy,
        MessageCode::StorageMigrationDistcpAcid,
        MessageCode::LocationNotMatchWarehouse,
        MessageCode::PartitionLimitExceeded,
        MessageCode::TablePlanningFailed,
        MessageCode::EvaluatePartitionLocationUse,
        MessageCode::WarehouseDirsSameDir,
        MessageCode::ResetToDefaultLocationWarning,
        MessageCode::ResetToDefaultLocationWithoutWarehouseDirs,
        MessageCode::LocationNotMatchWarehouseWarning,
        MessageCode::TableLocationRemapped,
        MessageCode::TableLocationForced,
        MessageCode::StorageMigrationNamespaceSource,
        MessageCode::EvaluatePartitionLocation,
    ];

    /// Stable bit position of this code.
    pub const fn code(self) -> u8 {
        match self {
            MessageCode::ValidSyncStrategies => 0,
            MessageCode::ValidAcidStrategies => 1,
            MessageCode::AcidNotTopLevelStrategy => 2,
            MessageCode::CommonStorageWithLinked => 3,
            MessageCode::IntermediateStorageWithLinked => 4,
            MessageCode::LegacyHiveTargetCluster => 6,
            MessageCode::DowngradeOnlyForAcid => 7,
            MessageCode::ReplaceOnlyWithDowngrade => 9,
            MessageCode::ConfigurationRemovedOrInvalid => 17,
            MessageCode::StorageMigrationRequiredNamespace => 18,
            MessageCode::StorageMigrationRequiredStrategy => 19,
            MessageCode::StorageMigrationRequiredWarehouseOptions => 20,
            MessageCode::ResetToDefaultLocation => 22,
            MessageCode::CommonStorageWithDowngradeInPlace => 23,
            MessageCode::IntermediateStorageWithDowngradeInPlace => 24,
            MessageCode::ValidAcidDowngradeInPlaceStrategies => 25,
            MessageCode::DowngradeInPlaceNonLegacy => 26,
            MessageCode::NonLegacyToLegacy => 27,
            MessageCode::StorageMigrationDistcpAcid => 28,
            MessageCode::LocationNotMatchWarehouse => 29,
            MessageCode::PartitionLimitExceeded => 30,
            MessageCode::TablePlanningFailed => 31,
            MessageCode::EvaluatePartitionLocationUse => 32,
            MessageCode::WarehouseDirsSameDir => 33,
            MessageCode::ResetToDefaultLocationWarning => 53,
            MessageCode::ResetToDefaultLocationWithoutWarehouseDirs => 54,
            MessageCode::LocationNotMatchWarehouseWarning => 55,
            MessageCode::TableLocationRemapped => 56,
            MessageCode::TableLocationForced => 57,
            MessageCode::StorageMigrationNamespaceSource => 58,
            MessageCode::EvaluatePartitionLocation => 59,
        }
    }

    /// Look a code up by its bit position.
    pub fn from_code(code: u8) -> Option<MessageCode> {
        Self::ALL.iter().copied().find(|m| m.code() == code)
    }

    /// Warnings occupy bit 50 and above.
    pub const fn is_warning(self) -> bool {
        self.code() >= 50
    }

    /// Message template. `{0}`, `{1}` are replaced with recorded arguments.
    pub const fn description(self) -> &'static str {
        match self {
            MessageCode::ValidSyncStrategies => {
                "'sync' only valid for SCHEMA_ONLY, LINKED, SQL, EXPORT_IMPORT, HYBRID, and COMMON data strategies"
            }
            MessageCode::ValidAcidStrategies => {
                "Migrating ACID tables only valid for SCHEMA_ONLY, DUMP, SQL, EXPORT_IMPORT, HYBRID, and STORAGE_MIGRATION data strategies"
            }
            MessageCode::AcidNotTopLevelStrategy => {
                "The ACID strategy is not a valid top level strategy. Use HYBRID or SQL along with migrate_acid to address ACID tables."
            }
            MessageCode::CommonStorageWithLinked => {
                "Common storage is not a valid option for the LINKED data strategy."
            }
            MessageCode::IntermediateStorageWithLinked => {
                "Intermediate storage is not a valid option for the LINKED data strategy."
            }
            MessageCode::LegacyHiveTargetCluster => {
                "Legacy Hive is not supported as a target cluster. clusters.target.legacy_hive"
            }
            MessageCode::DowngradeOnlyForAcid => {
                "migrate_acid.downgrade can only be used when ACID migration is enabled (migrate_acid.on or migrate_acid.only)."
            }
            MessageCode::ReplaceOnlyWithDowngrade => {
                "migrate_acid.in_place must be used with migrate_acid.downgrade."
            }
            MessageCode::ConfigurationRemovedOrInvalid => {
                "A configuration element is no longer valid. Remove it from the configuration and try again. {0}"
            }
            MessageCode::StorageMigrationRequiredNamespace => {
                "STORAGE_MIGRATION requires transfer.target_namespace or transfer.common_storage to define the new namespace."
            }
            MessageCode::StorageMigrationRequiredStrategy => {
                "STORAGE_MIGRATION requires transfer.storage_migration.data_strategy. Applicable options are SCHEMA_ONLY, SQL, EXPORT_IMPORT, or HYBRID"
            }
            MessageCode::StorageMigrationRequiredWarehouseOptions => {
                "STORAGE_MIGRATION requires transfer.warehouse.managed_directory and transfer.warehouse.external_directory."
            }
            MessageCode::ResetToDefaultLocation => {
                "'reset_to_default_location' is NOT available for this data strategy."
            }
            MessageCode::CommonStorageWithDowngradeInPlace => {
                "Common storage is not a valid option for ACID downgrades in place."
            }
            MessageCode::IntermediateStorageWithDowngradeInPlace => {
                "Intermediate storage is not a valid option for ACID downgrades in place."
            }
            MessageCode::ValidAcidDowngradeInPlaceStrategies => {
                "In place downgrade of ACID tables is only valid for the SQL, EXPORT_IMPORT and HYBRID data strategies"
            }
            MessageCode::DowngradeInPlaceNonLegacy => {
                "ACID in place downgrade only works on non-legacy Hive (Hive 3+)."
            }
            MessageCode::NonLegacyToLegacy => {
                "Migrations from Hive 3 to Hive 1/2 are not supported."
            }
            MessageCode::StorageMigrationDistcpAcid => {
                "STORAGE_MIGRATION with 'distcp' can't support the direct transfer of ACID tables without evaluate_partition_location."
            }
            MessageCode::LocationNotMatchWarehouse => {
                "After all translations, the {0} location {1} does not fall under the configured warehouse directory {2}."
            }
            MessageCode::PartitionLimitExceeded => {
                "The partition count for {0} exceeds the configured limit of {1} for this strategy."
            }
            MessageCode::TablePlanningFailed => {
                "One or more tables could not be planned. Review the table issues for details."
            }
            MessageCode::EvaluatePartitionLocationUse => {
                "evaluate_partition_location is only valid for SCHEMA_ONLY, DUMP and STORAGE_MIGRATION strategies."
            }
            MessageCode::WarehouseDirsSameDir => {
                "You can't use the same location for EXTERNAL {0} and MANAGED {1} warehouse locations."
            }
            MessageCode::ResetToDefaultLocationWarning => {
                "'reset_to_default_location' was specified. Table definition stripped of LOCATION. Location will be determined by the database or system warehouse settings."
            }
            MessageCode::ResetToDefaultLocationWithoutWarehouseDirs => {
                "When using 'reset_to_default_location', specify the warehouse locations to build distcp plans. Without them the default locations are unknown."
            }
            MessageCode::LocationNotMatchWarehouseWarning => {
                "The {0} location {1} does not fall under the configured warehouse directory {2}."
            }
            MessageCode::TableLocationRemapped => {
                "The table location matched one of the 'global location map' directories."
            }
            MessageCode::TableLocationForced => {
                "The table location was explicitly set."
            }
            MessageCode::StorageMigrationNamespaceSource => {
                "No target namespace for STORAGE_MIGRATION. Assuming the migration stays on the source namespace."
            }
            MessageCode::EvaluatePartitionLocation => {
                "evaluate_partition_location reviews every partition location. Expect this to be slow on large tables."
            }
        }
    }

    /// Decode a return code (or its negation) into the codes it contains.
    pub fn decode(return_code: i64) -> Vec<MessageCode> {
        let bits = return_code.unsigned_abs();
        (0u8..64)
            .filter(|bit| bits & (1u64 << bit) != 0)
            .filter_map(MessageCode::from_code)
            .collect()
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Accumulated message codes with optional format arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSet {
    bits: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    args: BTreeMap<u8, Vec<String>>,
}

impl MessageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a code.
    pub fn set(&mut self, code: MessageCode) {
        self.bits |= 1u64 << code.code();
    }

    /// Record a code along with the arguments for its template.
    pub fn set_with_args<I, S>(&mut self, code: MessageCode, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(code);
        self.args
            .insert(code.code(), args.into_iter().map(Into::into).collect());
    }

    pub fn contains(&self, code: MessageCode) -> bool {
        self.bits & (1u64 << code.code()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn has_errors(&self) -> bool {
        self.codes().iter().any(|c| !c.is_warning())
    }

    pub fn has_warnings(&self) -> bool {
        self.codes().iter().any(|c| c.is_warning())
    }

    /// Codes present, ordered by bit position.
    pub fn codes(&self) -> Vec<MessageCode> {
        MessageCode::decode(self.bits as i64)
    }

    /// Fold another set into this one. Arguments already recorded here win.
    pub fn merge(&mut self, other: &MessageSet) {
        self.bits |= other.bits;
        for (code, args) in &other.args {
            self.args.entry(*code).or_insert_with(|| args.clone());
        }
    }

    /// Only the error codes.
    pub fn errors(&self) -> MessageSet {
        self.filtered(|c| !c.is_warning())
    }

    /// Only the warning codes.
    pub fn warnings(&self) -> MessageSet {
        self.filtered(MessageCode::is_warning)
    }

    fn filtered(&self, keep: impl Fn(MessageCode) -> bool) -> MessageSet {
        let mut out = MessageSet::new();
        for code in self.codes().into_iter().filter(|c| keep(*c)) {
            out.set(code);
            if let Some(args) = self.args.get(&code.code()) {
                out.args.insert(code.code(), args.clone());
            }
        }
        out
    }

    /// OR of `1 << code` for every recorded code.
    pub fn return_code(&self) -> u64 {
        self.bits
    }

    /// Negated return code, as reported to the shell and in run summaries.
    pub fn exit_value(&self) -> i64 {
        -(self.bits as i64)
    }

    /// Rendered message text, ordered by code.
    pub fn messages(&self) -> Vec<String> {
        self.codes()
            .into_iter()
            .map(|code| {
                let mut text = code.description().to_string();
                if let Some(args) = self.args.get(&code.code()) {
                    for (i, arg) in args.iter().enumerate() {
                        text = text.replace(&format!("{{{}}}", i), arg);
                    }
                }
                format!("{} [{}]", text, code.code())
            })
            .collect()
    }
}
