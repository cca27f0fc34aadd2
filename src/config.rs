//! Configuration types for vcrwrap
//!
//! Process-wide [`Settings`] are read once (environment or TOML) and passed
//! explicitly to whatever builds an [`ExternalCall`](crate::ExternalCall).
//! Per-test [`VcrOptions`] are merged over them into an immutable
//! [`VcrConfig`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::{Result, VcrError};

/// Environment variable naming the cassette directory
pub const ENV_CASSETTE_PATH: &str = "VCR_CASSETTE_PATH";
/// Environment variable that bypasses cassettes when set to `TRUE`
pub const ENV_MAKE_EXTERNAL_REQUESTS: &str = "VCR_MAKE_EXTERNAL_REQUESTS";
/// Environment variable holding the record mode
pub const ENV_RECORD_MODE: &str = "VCR_RECORD_MODE";

/// Record mode used when nothing else is configured
pub const DEFAULT_RECORD_MODE: &str = "none";
/// Cassette directory used when nothing else is configured
pub const DEFAULT_CASSETTE_DIR: &str = "cassettes";
/// Matchers applied when a test does not override `match_on`
pub const DEFAULT_MATCH_ON: [&str; 6] = ["method", "scheme", "host", "port", "path", "json_query"];
/// Headers stripped from recorded requests by default
pub const DEFAULT_FILTER_HEADERS: [&str; 1] = ["authorization"];

/// Policy deciding whether interactions are recorded, replayed, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Record if the cassette file is absent, otherwise replay only
    Once,
    /// Replay what matches, record everything else
    NewEpisodes,
    /// Replay only; never record
    None,
    /// Always record; never replay
    All,
}

impl RecordMode {
    /// Canonical spelling of the mode
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::NewEpisodes => "new_episodes",
            Self::None => "none",
            Self::All => "all",
        }
    }
}

impl FromStr for RecordMode {
    type Err = VcrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "once" => Ok(Self::Once),
            "new_episodes" | "new_episode" => Ok(Self::NewEpisodes),
            "none" => Ok(Self::None),
            "all" => Ok(Self::All),
            other => Err(VcrError::InvalidRecordMode(other.to_string())),
        }
    }
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide settings, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding cassettes; `None` falls back to [`DEFAULT_CASSETTE_DIR`]
    #[serde(default)]
    pub cassette_dir: Option<PathBuf>,
    /// Raw record mode, validated when an `ExternalCall` is built
    #[serde(default = "default_record_mode")]
    pub record_mode: String,
    /// Skip cassettes entirely and let every call reach the network
    #[serde(default)]
    pub make_external_requests: bool,
}

fn default_record_mode() -> String {
    DEFAULT_RECORD_MODE.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cassette_dir: None,
            record_mode: default_record_mode(),
            make_external_requests: false,
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            cassette_dir: lookup(ENV_CASSETTE_PATH).map(PathBuf::from),
            record_mode: lookup(ENV_RECORD_MODE).unwrap_or_else(default_record_mode),
            make_external_requests: lookup(ENV_MAKE_EXTERNAL_REQUESTS).as_deref() == Some("TRUE"),
        }
    }

    /// Settings read from the environment on first use and cached for the
    /// lifetime of the process
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Settings> = OnceLock::new();
        GLOBAL.get_or_init(Self::from_env)
    }

    /// Load settings from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VcrError::ConfigError(format!(
                "Failed to read settings file {}: {e}",
                path.display()
            ))
        })?;

        let settings: Self = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse the configured record mode
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidRecordMode`] for unknown modes
    pub fn record_mode(&self) -> Result<RecordMode> {
        self.record_mode.parse()
    }

    /// Validate settings
    ///
    /// # Errors
    ///
    /// Returns error if the record mode is invalid
    pub fn validate(&self) -> Result<()> {
        self.record_mode().map(|_| ())
    }
}

/// Per-test overrides; every `Some` replaces the matching default wholesale
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcrOptions {
    /// Cassette directory override
    pub cassette_library_dir: Option<PathBuf>,
    /// Record mode override
    pub record_mode: Option<String>,
    /// Matcher order override
    pub match_on: Option<Vec<String>>,
    /// Redacted header list override
    pub filter_headers: Option<Vec<String>>,
    /// Allow a recorded interaction to be replayed more than once
    pub allow_playback_repeats: Option<bool>,
    /// Enable `Session::namespace`
    pub use_namespaces: bool,
}

impl VcrOptions {
    /// Empty options (all defaults)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the cassette directory
    #[must_use]
    pub fn cassette_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cassette_library_dir = Some(dir.into());
        self
    }

    /// Override the record mode
    #[must_use]
    pub fn record_mode(mut self, mode: impl Into<String>) -> Self {
        self.record_mode = Some(mode.into());
        self
    }

    /// Replace the matcher order
    #[must_use]
    pub fn match_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.match_on = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the list of headers stripped before recording
    #[must_use]
    pub fn filter_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_headers = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Allow repeated playback of the same interaction
    #[must_use]
    pub fn allow_playback_repeats(mut self, allow: bool) -> Self {
        self.allow_playback_repeats = Some(allow);
        self
    }

    /// Expose `Session::namespace` to the test body
    #[must_use]
    pub fn use_namespaces(mut self, enabled: bool) -> Self {
        self.use_namespaces = enabled;
        self
    }
}

/// Fully resolved configuration for one cassette recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcrConfig {
    /// Directory holding cassette files
    pub cassette_library_dir: PathBuf,
    /// Record mode
    pub record_mode: RecordMode,
    /// Matcher names, applied in order
    pub match_on: Vec<String>,
    /// Header names removed from recorded requests
    pub filter_headers: Vec<String>,
    /// Allow a recorded interaction to be replayed more than once
    pub allow_playback_repeats: bool,
}

impl Default for VcrConfig {
    fn default() -> Self {
        Self {
            cassette_library_dir: PathBuf::from(DEFAULT_CASSETTE_DIR),
            record_mode: RecordMode::None,
            match_on: DEFAULT_MATCH_ON.iter().map(|s| (*s).to_string()).collect(),
            filter_headers: DEFAULT_FILTER_HEADERS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            allow_playback_repeats: false,
        }
    }
}

impl VcrConfig {
    /// Merge options over settings-derived defaults
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidRecordMode`] if either the global or the
    /// overriding record mode is invalid
    pub fn resolve(settings: &Settings, options: &VcrOptions) -> Result<Self> {
        let global_mode = settings.record_mode()?;
        let record_mode = match &options.record_mode {
            Some(mode) => mode.parse()?,
            None => global_mode,
        };

        let defaults = Self::default();
        let cassette_library_dir = options
            .cassette_library_dir
            .clone()
            .or_else(|| settings.cassette_dir.clone())
            .unwrap_or(defaults.cassette_library_dir);

        let config = Self {
            cassette_library_dir,
            record_mode,
            match_on: options.match_on.clone().unwrap_or(defaults.match_on),
            filter_headers: options
                .filter_headers
                .clone()
                .unwrap_or(defaults.filter_headers),
            allow_playback_repeats: options
                .allow_playback_repeats
                .unwrap_or(defaults.allow_playback_repeats),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if a matcher name is empty. An empty list is valid
    /// and matches every request.
    pub fn validate(&self) -> Result<()> {
        if self.match_on.iter().any(String::is_empty) {
            return Err(VcrError::ConfigError(
                "match_on cannot contain an empty matcher name".to_string(),
            ));
        }

        Ok(())
    }
}
