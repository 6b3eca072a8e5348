//! Cassette persistence
//!
//! Cassettes live one-per-file as pretty-printed JSON under a library
//! directory, keyed by name. Reads and writes may target different
//! directories so checked-in fixtures can be replayed while fresh
//! recordings land in a scratch directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cassette::format::Cassette;
use crate::error::{OverdubError, Result};

/// Loads and persists cassettes under configured directories.
#[derive(Debug, Clone)]
pub struct CassetteStore {
    read_dir: PathBuf,
    write_dir: PathBuf,
}

impl CassetteStore {
    /// Create a store that reads and writes the same library directory.
    #[must_use]
    pub fn new(library_dir: impl Into<PathBuf>) -> Self {
        let library_dir = library_dir.into();
        Self {
            read_dir: library_dir.clone(),
            write_dir: library_dir,
        }
    }

    /// Create a store with separate read and write directories.
    #[must_use]
    pub fn with_dirs(read_dir: impl Into<PathBuf>, write_dir: impl Into<PathBuf>) -> Self {
        Self {
            read_dir: read_dir.into(),
            write_dir: write_dir.into(),
        }
    }

    /// Directory cassettes are read from.
    #[must_use]
    pub fn read_dir(&self) -> &Path {
        &self.read_dir
    }

    /// Directory cassettes are written to.
    #[must_use]
    pub fn write_dir(&self) -> &Path {
        &self.write_dir
    }

    /// Path a cassette named `name` is read from.
    #[must_use]
    pub fn read_path(&self, name: &str) -> PathBuf {
        self.read_dir.join(format!("{name}.json"))
    }

    /// Path a cassette named `name` is written to.
    #[must_use]
    pub fn write_path(&self, name: &str) -> PathBuf {
        self.write_dir.join(format!("{name}.json"))
    }

    /// Load the cassette named `name`, or `None` when it is absent.
    ///
    /// A file that cannot be read or parsed is treated the same as a
    /// missing one, with a warning; callers then behave exactly as if no
    /// cassette existed.
    #[must_use]
    pub fn load(&self, name: &str) -> Option<Cassette> {
        let path = self.read_path(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No cassette '{}' at {}", name, path.display());
                return None;
            }
            Err(err) => {
                warn!("Failed to read cassette '{}': {}", name, err);
                return None;
            }
        };

        let cassette: Cassette = match serde_json::from_str(&raw) {
            Ok(cassette) => cassette,
            Err(err) => {
                warn!("Failed to parse cassette '{}': {}", name, err);
                return None;
            }
        };

        if !cassette.well_formed() {
            warn!("Cassette '{}' contains undecodable bodies", name);
            return None;
        }

        debug!(
            "Loaded cassette '{}': {} interactions",
            name,
            cassette.interactions.len()
        );
        Some(cassette)
    }

    /// Persist `cassette` to the write directory, replacing any previous
    /// file for the same name.
    ///
    /// The document is written to a temporary file and renamed into place
    /// so readers never observe a half-written cassette.
    ///
    /// # Errors
    ///
    /// Returns [`OverdubError::Persistence`] when the directory cannot be
    /// created or the file cannot be written.
    pub fn persist(&self, cassette: &Cassette) -> Result<PathBuf> {
        self.persist_inner(cassette)
            .map_err(|err| OverdubError::Persistence {
                name: cassette.name.clone(),
                reason: err.to_string(),
            })
    }

    fn persist_inner(&self, cassette: &Cassette) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.write_dir)?;

        let mut document = serde_json::to_vec_pretty(cassette)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        document.push(b'\n');

        let path = self.write_path(&cassette.name);
        let tmp_path = self.write_dir.join(format!(".{}.json.tmp", cassette.name));
        fs::write(&tmp_path, &document)?;
        fs::rename(&tmp_path, &path)?;

        debug!(
            "Persisted cassette '{}': {} interactions",
            cassette.name,
            cassette.interactions.len()
        );
        Ok(path)
    }
}

/// Check that `name` is usable as a cassette name and file stem.
///
/// # Errors
///
/// Returns [`OverdubError::InvalidCassetteName`] when the name is empty,
/// longer than 255 bytes, starts with a dot, or contains a path separator,
/// a NUL byte, or `..`.
pub fn validate_cassette_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(OverdubError::InvalidCassetteName(
            "Cassette name cannot be empty".to_string(),
        ));
    }

    if name.len() > 255 {
        return Err(OverdubError::InvalidCassetteName(format!(
            "Cassette name too long: {} > 255",
            name.len()
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(OverdubError::InvalidCassetteName(
            "Cassette name cannot contain path separators".to_string(),
        ));
    }

    if name.starts_with('.') {
        return Err(OverdubError::InvalidCassetteName(
            "Cassette name cannot start with dot".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(OverdubError::InvalidCassetteName(
            "Cassette name cannot contain null bytes".to_string(),
        ));
    }

    if name.contains("..") {
        return Err(OverdubError::InvalidCassetteName(
            "Cassette name cannot contain '..'".to_string(),
        ));
    }

    Ok(())
}
