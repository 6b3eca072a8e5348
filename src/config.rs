//! Configuration types for Overdub

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cassette::validate_cassette_name;
use crate::{OverdubError, Result};

/// Recording-mode policy
///
/// Decides, per request, whether a recorder replays from the cassette,
/// performs a real call, or fails hard when the fixture cannot satisfy
/// the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordingMode {
    /// Always perform and record real calls; never consult the cassette
    #[serde(rename = "record-all")]
    All,
    /// Replay only; a missing cassette or unmatched request is fatal
    None,
    /// Record while no cassette exists, then replay strictly
    #[default]
    Once,
    /// Replay matches and record unmatched requests as new entries
    NewEpisodes,
}

/// Recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Cassette name; doubles as the storage key under `library_dir`
    pub cassette: String,
    /// Directory existing cassettes are read from
    pub library_dir: PathBuf,
    /// Directory new recordings are written to; defaults to `library_dir`
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Recording-mode policy
    #[serde(default)]
    pub mode: RecordingMode,
    /// Master switch; with this off, any fallthrough to a real call is fatal
    #[serde(default = "default_recording_enabled")]
    pub recording_enabled: bool,
    /// Header names significant for replay matching
    #[serde(default)]
    pub headers_to_check: Vec<String>,
}

fn default_recording_enabled() -> bool {
    true
}

impl RecorderConfig {
    /// Create a configuration with default policy: mode `once`, recording
    /// enabled, no checked headers, recordings written back to
    /// `library_dir`.
    #[must_use]
    pub fn new(cassette: impl Into<String>, library_dir: impl Into<PathBuf>) -> Self {
        Self {
            cassette: cassette.into(),
            library_dir: library_dir.into(),
            output_dir: None,
            mode: RecordingMode::default(),
            recording_enabled: true,
            headers_to_check: Vec::new(),
        }
    }

    /// Directory new recordings are written to.
    #[must_use]
    pub fn write_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.library_dir)
    }

    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OverdubError::Config(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| OverdubError::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if the cassette name is unusable, the library
    /// directory is blank, or a checked header name is blank
    pub fn validate(&self) -> Result<()> {
        validate_cassette_name(&self.cassette)?;

        if self.library_dir.as_os_str().is_empty() {
            return Err(OverdubError::Config(
                "library_dir cannot be empty".to_string(),
            ));
        }

        for (i, name) in self.headers_to_check.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(OverdubError::Config(format!(
                    "headers_to_check[{i}]: header name cannot be blank"
                )));
            }
        }

        Ok(())
    }
}
