//! Error types for vcrwrap

use std::io;
use thiserror::Error;

/// Result type for vcrwrap operations
pub type Result<T> = std::result::Result<T, VcrError>;

/// Boxed error returned by a live call
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in vcrwrap
#[derive(Debug, Error)]
pub enum VcrError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Cassette file could not be parsed or written
    #[error("Invalid cassette YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Cassette file parsed but its contents are unusable
    #[error("Invalid cassette format: {0}")]
    InvalidFormat(String),

    /// Settings file could not be parsed
    #[error("Invalid settings file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Record mode outside of the four accepted values
    #[error(
        "Invalid record mode `{0}`: expected one of once, new_episodes, none, all \
         (check the VCR_RECORD_MODE environment variable)"
    )]
    InvalidRecordMode(String),

    /// Cassette name that cannot be used as a file name
    #[error("Invalid cassette name: {0}")]
    InvalidCassetteName(String),

    /// Request URI that could not be parsed
    #[error("Invalid request URI `{uri}`: {reason}")]
    InvalidUri {
        /// The offending URI
        uri: String,
        /// Why parsing failed
        reason: &'static str,
    },

    /// Matcher name with no registered predicate
    #[error("Unknown matcher `{0}`")]
    UnknownMatcher(String),

    /// No recorded interaction matched and the record mode forbids recording
    #[error(
        "Cassette `{cassette}` has no interaction matching {method} {uri} \
         (record mode `{record_mode}`, matching on {match_on})"
    )]
    UnmatchedRequest {
        /// Cassette that was searched
        cassette: String,
        /// Request method
        method: String,
        /// Request URI
        uri: String,
        /// Active record mode
        record_mode: String,
        /// Matchers joined with ` / `
        match_on: String,
    },

    /// `Session::namespace` called without `use_namespaces`
    #[error("Namespaces are disabled for cassette `{0}`; enable `use_namespaces`")]
    NamespacesDisabled(String),

    /// The live call made on a cassette miss failed
    #[error("Live request failed: {0}")]
    Transport(#[source] BoxError),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}
