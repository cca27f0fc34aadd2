//! On-disk cassette format
//!
//! ```yaml
//! version: 1
//! interactions:
//!   - request:
//!       method: GET
//!       uri: https://api.example.com/items?q=1
//!       headers: [[accept, application/json]]
//!       body: ''
//!     response:
//!       status: 200
//!       headers: []
//!       body: '{"items":[]}'
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::interaction::Interaction;
use crate::{Result, VcrError};

/// Current cassette format version
pub const FORMAT_VERSION: u32 = 1;

/// Serialized cassette contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CassetteFile {
    /// Format version
    pub version: u32,
    /// Recorded interactions in recording order
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl CassetteFile {
    /// Wrap interactions in the current format version
    #[must_use]
    pub fn new(interactions: Vec<Interaction>) -> Self {
        Self {
            version: FORMAT_VERSION,
            interactions,
        }
    }
}

/// Read a cassette file; `Ok(None)` if it does not exist
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed, or has an
/// unsupported version
pub fn read(path: &Path) -> Result<Option<CassetteFile>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let file: CassetteFile = serde_yaml::from_str(&content)?;
    if file.version != FORMAT_VERSION {
        return Err(VcrError::InvalidFormat(format!(
            "Unsupported version {} in {}, expected {FORMAT_VERSION}",
            file.version,
            path.display()
        )));
    }

    Ok(Some(file))
}

/// Write a cassette file, creating parent directories
///
/// The file is written next to its destination and renamed into place so a
/// crash never leaves a truncated cassette behind.
///
/// # Errors
///
/// Returns error if serialization or any filesystem operation fails
pub fn write(path: &Path, file: &CassetteFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml::to_string(file)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, yaml)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
