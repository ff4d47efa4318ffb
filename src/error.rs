//! Error types for gitvault
//!
//! Provides structured error types with context for better debugging
//! and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for gitvault operations
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    #[error("No remote URL is configured")]
    MissingRemoteUrl,

    #[error("Failed to read settings from '{path}': {source}")]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write settings to '{path}': {source}")]
    SettingsWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file '{path}' is not valid TOML: {message}")]
    SettingsParse { path: PathBuf, message: String },

    #[error("Unknown settings key '{key}'")]
    UnknownSettingsKey { key: String },

    // ==========================================================================
    // Transport Errors
    // ==========================================================================
    #[error("Transport operation failed: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<git2::Error>,
    },

    // ==========================================================================
    // Repository Errors
    // ==========================================================================
    #[error("Repository operation failed: {message}")]
    Repository {
        message: String,
        #[source]
        source: Option<git2::Error>,
    },

    // ==========================================================================
    // Catch-all
    // ==========================================================================
    #[error("{0}")]
    Other(String),
}

/// Result type alias for gitvault operations
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Conversions from external error types
// =============================================================================

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        use git2::ErrorClass;

        let message = err.message().to_string();
        match err.class() {
            // Failures reaching or authenticating against the remote.
            ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssh | ErrorClass::Callback => {
                Error::Transport {
                    message,
                    source: Some(err),
                }
            }
            // Everything else is the local repository misbehaving.
            _ => Error::Repository {
                message,
                source: Some(err),
            },
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Other(err.to_string())
    }
}

// =============================================================================
// Error Display Helpers
// =============================================================================

impl Error {
    /// Returns a user-friendly suggestion for fixing the error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::MissingRemoteUrl => {
                Some("Set one with: gitvault config set remote_url <url>")
            }
            Error::SettingsRead { .. } => {
                Some("Create a settings file with: gitvault init")
            }
            Error::UnknownSettingsKey { .. } => {
                Some("Valid keys: remote_url, local_path, branch, git_username, git_password, sync_interval")
            }
            _ => None,
        }
    }

    /// Returns true if the error came from talking to the remote
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }
}
