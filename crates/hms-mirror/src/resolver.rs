//! Create-strategy resolution: decide whether the target table is left alone,
//! created, dropped, replaced or has its partitions amended.

use crate::config::Config;
use crate::mirror::{CreateStrategy, Environment, TableMirror};
use tracing::debug;

pub const SCHEMA_DROPPED: &str = "Schema doesn't exist in 'source'.  Will be DROPPED.";
pub const SCHEMA_MISSING: &str = "Schema missing, will be CREATED";
pub const SCHEMA_EXISTS_SYNC_PARTS: &str =
    "Schema exists already and matches. Partition locations will be reconciled.";
pub const SCHEMA_EXISTS_NO_ACTION_SYNC: &str = "Schema exists already and matches, no action necessary.";
pub const SCHEMA_MISMATCH_PURGE: &str = "Schema exists AND DOESN'T match.  But the 'TARGET' table has a PURGE option set. \
We can NOT safely replace the table without compromising the data. No action will be taken.";
pub const SCHEMA_MISMATCH_REPLACE: &str =
    "Schema exists AND DOESN'T match.  It will be REPLACED (DROPPED and RECREATED).";
pub const VIEW_REPLACE: &str = "View exists already.  Will REPLACE.";
pub const SCHEMA_CREATE_IF_NOT_EXISTS: &str = "Schema exists already.  But you've specified 'create_if_not_exists', \
which will attempt to create (possibly fail, softly) and continue with the remainder sql statements for the table/partitions.";
pub const SCHEMA_EXISTS_NO_ACTION: &str = "Schema exists already, no action. If you wish to rebuild the schema, \
drop it first and try again. Any following messages MAY be irrelevant about schema adjustments.";
pub const SCHEMA_CREATE: &str = "Schema will be created";

/// Everything the decision depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResolverInput {
    pub source_exists: bool,
    pub target_exists: bool,
    pub schemas_equal: bool,
    pub sync: bool,
    /// Target is EXTERNAL with `external.table.purge=true`.
    pub purge_protected: bool,
    /// Target is a view.
    pub is_view: bool,
    pub create_if_not_exists: bool,
    pub partitioned: bool,
    pub evaluate_partition_location: bool,
}

/// Decision plus the issue recorded for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub strategy: CreateStrategy,
    pub issue: Option<&'static str>,
    /// False when the strategy must stop for this table.
    pub proceed: bool,
}

impl Resolution {
    fn go(strategy: CreateStrategy, issue: &'static str) -> Self {
        Self {
            strategy,
            issue: Some(issue),
            proceed: true,
        }
    }

    fn stop(strategy: CreateStrategy, issue: &'static str) -> Self {
        Self {
            strategy,
            issue: Some(issue),
            proceed: false,
        }
    }
}

/// Pure decision function.
pub fn resolve(input: &ResolverInput) -> Resolution {
    if !input.source_exists && !input.target_exists {
        return Resolution {
            strategy: CreateStrategy::Nothing,
            issue: None,
            proceed: true,
        };
    }

    if input.sync {
        match (input.source_exists, input.target_exists) {
            (false, true) => Resolution::go(CreateStrategy::Drop, SCHEMA_DROPPED),
            (true, false) => Resolution::go(CreateStrategy::Create, SCHEMA_MISSING),
            _ if input.schemas_equal => {
                if input.partitioned && input.evaluate_partition_location {
                    Resolution::go(CreateStrategy::AmendParts, SCHEMA_EXISTS_SYNC_PARTS)
                } else {
                    Resolution::go(CreateStrategy::Leave, SCHEMA_EXISTS_NO_ACTION_SYNC)
                }
            }
            _ if input.purge_protected => {
                Resolution::stop(CreateStrategy::Leave, SCHEMA_MISMATCH_PURGE)
            }
            _ => Resolution::go(CreateStrategy::Replace, SCHEMA_MISMATCH_REPLACE),
        }
    } else if input.target_exists {
        if input.is_view {
            Resolution::go(CreateStrategy::Replace, VIEW_REPLACE)
        } else if input.create_if_not_exists {
            Resolution::go(CreateStrategy::Create, SCHEMA_CREATE_IF_NOT_EXISTS)
        } else {
            Resolution::stop(CreateStrategy::Leave, SCHEMA_EXISTS_NO_ACTION)
        }
    } else {
        Resolution::go(CreateStrategy::Create, SCHEMA_CREATE)
    }
}

/// Gather the inputs for `source -> target` from the mirror and config.
pub fn input_for(
    config: &Config,
    mirror: &TableMirror,
    source: Environment,
    target: Environment,
) -> ResolverInput {
    let target_table = mirror.environment_table(target);
    let source_table = mirror.environment_table(source);
    ResolverInput {
        source_exists: mirror.exists(source),
        target_exists: mirror.exists(target),
        schemas_equal: mirror.schemas_equal(source, target),
        sync: config.sync,
        purge_protected: target_table.map(|t| t.is_external_purge()).unwrap_or(false),
        is_view: target_table.map(|t| t.is_view()).unwrap_or(false),
        create_if_not_exists: config.cluster(target).create_if_not_exists,
        partitioned: source_table.map(|t| t.is_partitioned()).unwrap_or(false),
        evaluate_partition_location: config.evaluate_partition_location,
    }
}

/// Resolve and record the decision on the target snapshot. Returns
/// `proceed`.
pub fn apply(
    config: &Config,
    mirror: &mut TableMirror,
    source: Environment,
    target: Environment,
) -> bool {
    let input = input_for(config, mirror, source, target);
    let resolution = resolve(&input);
    debug!(
        "{}: create strategy {} for {}",
        mirror.qualified_name(),
        resolution.strategy,
        target
    );
    let table = mirror.environment_table_mut(target);
    table.create_strategy = resolution.strategy;
    if let Some(issue) = resolution.issue {
        table.add_issue(issue);
    }
    resolution.proceed
}
