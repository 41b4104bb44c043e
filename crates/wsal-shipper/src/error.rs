//! Error types for the WSAL shipper
//!
//! Every variant maps to a process exit status so cron and systemd can tell
//! configuration problems apart from database or upload outages.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shipper operations
pub type Result<T> = std::result::Result<T, ShipperError>;

/// Comprehensive error type for a shipping run
#[derive(Error, Debug)]
pub enum ShipperError {
    /// Configuration file missing, unparsable or incomplete
    #[error("Configuration error: {0}. Check the config file and WSAL_* / AWS_* environment variables.")]
    Config(String),

    /// Connecting to or querying the WordPress database failed
    #[error("Database error: {0}. Check the [database] settings in the config file.")]
    Database(#[from] sqlx::Error),

    /// Object storage rejected or never received the export
    #[error("Upload of '{key}' failed: {message}")]
    Upload { key: String, message: String },

    /// Another run holds the lock for this configuration
    #[error("Another run is in progress (holding lock on '{}')", .0.display())]
    Locked(PathBuf),

    /// Local file operation failed
    #[error("File operation failed: {0}. Check permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// Export serialization failed
    #[error("Failed to serialize export: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShipperError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an upload error
    pub fn upload(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upload {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Database(_) => 3,
            Self::Upload { .. } => 4,
            Self::Locked(_) => 5,
            Self::Io(_) | Self::Json(_) | Self::Other(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_category() {
        assert_eq!(ShipperError::config("missing bucket").exit_code(), 2);
        assert_eq!(ShipperError::Database(sqlx::Error::PoolTimedOut).exit_code(), 3);
        assert_eq!(ShipperError::upload("k", "denied").exit_code(), 4);
        assert_eq!(ShipperError::Locked(PathBuf::from("x.lock")).exit_code(), 5);
        assert_eq!(
            ShipperError::Io(std::io::Error::other("disk full")).exit_code(),
            1
        );
    }

    #[test]
    fn test_messages_name_the_failing_object() {
        let err = ShipperError::upload("wordpress/example.com/host--a.json", "AccessDenied");
        let msg = err.to_string();
        assert!(msg.contains("wordpress/example.com/host--a.json"));
        assert!(msg.contains("AccessDenied"));

        let err = ShipperError::Locked(PathBuf::from("/srv/log_track_config.lock"));
        assert!(err.to_string().contains("/srv/log_track_config.lock"));
    }
}
