//! Error types for the migration planner.

use thiserror::Error;

/// Main error type for planning operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Coded configuration checks failed before any table was processed.
    #[error("Configuration validation failed (return code {return_code}):\n{}", messages.join("\n"))]
    Validation {
        messages: Vec<String>,
        return_code: i64,
    },

    /// A storage location could not be translated into the target layout.
    #[error("Location translation failed for '{location}': {message}")]
    Translation { location: String, message: String },

    /// A strategy could not plan a table.
    #[error("Strategy failed for table {table}: {message}")]
    Strategy { table: String, message: String },

    /// Metadata snapshot could not be read or is inconsistent.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// SQL executor failure.
    #[error("Executor error: {0}")]
    Executor(String),

    /// State file error
    #[error("State file error: {0}")]
    State(String),

    /// Config hash mismatch on resume
    #[error("Config has changed since last run - cannot resume. Remove the state file to start fresh.")]
    ConfigChanged,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Run cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Translation error.
    pub fn translation(location: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Translation {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a Strategy error.
    pub fn strategy(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Strategy {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// Unix exit statuses are a single byte, so the full message bitset is
    /// reported separately; this only distinguishes error families.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Validation { .. } => 3,
            MigrateError::Metadata(_) => 4,
            MigrateError::State(_) | MigrateError::ConfigChanged => 5,
            MigrateError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for planning operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_error_display() {
        let err = MigrateError::translation("hdfs://a/x", "not under namespace");
        assert_eq!(
            err.to_string(),
            "Location translation failed for 'hdfs://a/x': not under namespace"
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_validation_error_lists_messages() {
        let err = MigrateError::Validation {
            messages: vec!["first".into(), "second".into()],
            return_code: -9,
        };
        let text = err.to_string();
        assert!(text.contains("return code -9"));
        assert!(text.contains("first\nsecond"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_format_detailed_includes_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.yaml");
        let err = MigrateError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: missing.yaml"));
    }
}
