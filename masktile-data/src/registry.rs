//! Append-only record of completed tiles.
//!
//! One line per tile name. A tile present in the registry is never
//! reprocessed; a tile absent from it is safely recomputed from
//! scratch, which is what makes a long batch resumable after an
//! interruption. Tiles are recorded whether they were empty or not.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// An I/O failure while reading or appending the registry file.
#[derive(Debug, Error)]
#[error("tile registry {path:?}: {source}")]
pub struct RegistryError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
}

/// The append-only list of completed tile names for one output
/// location.
#[derive(Debug)]
pub struct TileRegistry {
    path: PathBuf,
    recorded: HashSet<String>,
}

impl TileRegistry {
    /// Opens a registry, loading prior entries when the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let mut recorded = HashSet::new();
        if path.exists() {
            let file = File::open(&path).map_err(|source| RegistryError {
                path: path.clone(),
                source,
            })?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|source| RegistryError {
                    path: path.clone(),
                    source,
                })?;
                let name = line.trim();
                if !name.is_empty() {
                    recorded.insert(name.to_owned());
                }
            }
        }
        Ok(Self { path, recorded })
    }

    /// True when the tile was already completed in a prior run.
    pub fn contains(&self, name: &str) -> bool {
        self.recorded.contains(name)
    }

    /// Number of recorded tiles.
    pub fn len(&self) -> usize {
        self.recorded.len()
    }

    /// True when nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.recorded.is_empty()
    }

    /// Appends a tile name and flushes it to disk. Recording a name
    /// twice is a no-op.
    pub fn record(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.contains(name) {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| RegistryError {
                path: self.path.clone(),
                source,
            })?;
        writeln!(file, "{name}").map_err(|source| RegistryError {
            path: self.path.clone(),
            source,
        })?;
        file.flush().map_err(|source| RegistryError {
            path: self.path.clone(),
            source,
        })?;
        self.recorded.insert(name.to_owned());
        Ok(())
    }
}
