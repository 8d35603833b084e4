//! Transformation descriptor for deriving one environment's table definition
//! from another's.

use crate::mirror::Environment;

/// Flags and overrides for a single definition build.
///
/// `upgrade` converts a legacy managed table to EXTERNAL, which is only safe
/// when the new table owns its data, so setting it also sets
/// `take_ownership` and pins it there. The last explicit ownership request
/// is still kept so the definition build can withhold the purge flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySpec {
    source: Environment,
    target: Environment,
    upgrade: bool,
    make_external: bool,
    make_non_transactional: bool,
    strip_location: bool,
    replace_location: bool,
    take_ownership: bool,
    ownership_requested: Option<bool>,
    table_name_prefix: Option<String>,
    location: Option<String>,
}

impl CopySpec {
    pub fn new(source: Environment, target: Environment) -> Self {
        Self {
            source,
            target,
            upgrade: false,
            make_external: false,
            make_non_transactional: false,
            strip_location: false,
            replace_location: false,
            take_ownership: false,
            ownership_requested: None,
            table_name_prefix: None,
            location: None,
        }
    }

    pub fn source(&self) -> Environment {
        self.source
    }

    pub fn target(&self) -> Environment {
        self.target
    }

    pub fn upgrade(&self) -> bool {
        self.upgrade
    }

    pub fn make_external(&self) -> bool {
        self.make_external
    }

    pub fn make_non_transactional(&self) -> bool {
        self.make_non_transactional
    }

    pub fn strip_location(&self) -> bool {
        self.strip_location
    }

    pub fn replace_location(&self) -> bool {
        self.replace_location
    }

    pub fn take_ownership(&self) -> bool {
        self.take_ownership
    }

    /// Ownership as last set through `set_take_ownership`, `None` when it
    /// was never set explicitly.
    pub fn ownership_requested(&self) -> Option<bool> {
        self.ownership_requested
    }

    pub fn table_name_prefix(&self) -> Option<&str> {
        self.table_name_prefix.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// The target table gets a prefixed name.
    pub fn renames_table(&self) -> bool {
        self.table_name_prefix.is_some()
    }

    pub fn set_upgrade(&mut self, upgrade: bool) -> &mut Self {
        self.upgrade = upgrade;
        if upgrade {
            self.take_ownership = true;
        }
        self
    }

    pub fn set_make_external(&mut self, value: bool) -> &mut Self {
        self.make_external = value;
        self
    }

    pub fn set_make_non_transactional(&mut self, value: bool) -> &mut Self {
        self.make_non_transactional = value;
        self
    }

    pub fn set_strip_location(&mut self, value: bool) -> &mut Self {
        self.strip_location = value;
        self
    }

    pub fn set_replace_location(&mut self, value: bool) -> &mut Self {
        self.replace_location = value;
        self
    }

    /// Ignored (ownership stays on) while `upgrade` is set.
    pub fn set_take_ownership(&mut self, value: bool) -> &mut Self {
        self.take_ownership = value || self.upgrade;
        self.ownership_requested = Some(value);
        self
    }

    pub fn set_table_name_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.table_name_prefix = Some(prefix.into());
        self
    }

    pub fn set_location(&mut self, location: impl Into<String>) -> &mut Self {
        self.location = Some(location.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_then_disown_keeps_ownership() {
        let mut spec = CopySpec::new(Environment::Source, Environment::Target);
        spec.set_upgrade(true).set_take_ownership(false);
        assert!(spec.take_ownership());
    }

    #[test]
    fn test_disown_then_upgrade_takes_ownership() {
        let mut spec = CopySpec::new(Environment::Source, Environment::Target);
        spec.set_take_ownership(false).set_upgrade(true);
        assert!(spec.take_ownership());
    }

    #[test]
    fn test_explicit_ownership_is_remembered_under_upgrade() {
        let mut spec = CopySpec::new(Environment::Source, Environment::Target);
        spec.set_upgrade(true);
        assert_eq!(spec.ownership_requested(), None);
        spec.set_take_ownership(false);
        assert!(spec.take_ownership());
        assert_eq!(spec.ownership_requested(), Some(false));
    }

    #[test]
    fn test_ownership_free_without_upgrade() {
        let mut spec = CopySpec::new(Environment::Source, Environment::Target);
        spec.set_take_ownership(true);
        assert!(spec.take_ownership());
        spec.set_take_ownership(false);
        assert!(!spec.take_ownership());
    }

    #[test]
    fn test_prefix_marks_rename() {
        let mut spec = CopySpec::new(Environment::Source, Environment::Transfer);
        assert!(!spec.renames_table());
        spec.set_table_name_prefix("hms_mirror_transfer_");
        assert!(spec.renames_table());
        assert_eq!(spec.table_name_prefix(), Some("hms_mirror_transfer_"));
    }
}
