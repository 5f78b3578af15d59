//! Class path entries exposed by a loading context.
//!
//! An entry is either an exploded directory or a zip archive (`.jar`,
//! `.nar`). Every lookup opens the entry, reads what it needs and closes it
//! again, so no handle outlives a single call. A file that is not a zip
//! archive (a `.pom`, a truncated jar) contains nothing.

use crate::error::ExtensionResult;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use tracing::warn;
use zip::ZipArchive;

/// One location classes and resources are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassPathEntry {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl ClassPathEntry {
    /// Classify `path` by what is on disk.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            ClassPathEntry::Directory(path)
        } else {
            ClassPathEntry::Archive(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ClassPathEntry::Directory(p) | ClassPathEntry::Archive(p) => p,
        }
    }

    /// Read the entry named `name` (a `/`-separated relative path), if
    /// present.
    pub fn read(&self, name: &str) -> ExtensionResult<Option<Vec<u8>>> {
        match self {
            ClassPathEntry::Directory(root) => {
                let path = entry_path(root, name);
                if !path.is_file() {
                    return Ok(None);
                }
                Ok(Some(std::fs::read(path)?))
            }
            ClassPathEntry::Archive(path) => {
                let file = BufReader::new(File::open(path)?);
                let mut archive = match ZipArchive::new(file) {
                    Ok(archive) => archive,
                    Err(ZipError::InvalidArchive(reason) | ZipError::UnsupportedArchive(reason)) => {
                        warn!("Skipping unreadable class path entry {:?}: {}", path, reason);
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                };
                let result = match archive.by_name(name) {
                    Ok(mut entry) => {
                        // The declared size is untrusted.
                        let mut bytes = Vec::new();
                        entry.read_to_end(&mut bytes)?;
                        Ok(Some(bytes))
                    }
                    Err(ZipError::FileNotFound) => Ok(None),
                    Err(e) => Err(e.into()),
                };
                result
            }
        }
    }

}

fn entry_path(root: &Path, name: &str) -> PathBuf {
    name.split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |p, s| p.join(s))
}
