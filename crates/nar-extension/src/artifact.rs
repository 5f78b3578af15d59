//! Artifact coordinates and resolved artifacts.
//!
//! A coordinate identifies an artifact in a repository by group, id,
//! version, type and an optional classifier. Coordinates are totally ordered
//! so they can be kept in sets and subtracted from each other while the
//! hierarchy is built.

use crate::error::{ExtensionError, ExtensionResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default artifact type when a coordinate omits one.
pub const DEFAULT_TYPE: &str = "jar";

/// Identity of an artifact in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    group: String,
    artifact: String,
    version: String,
    kind: String,
    classifier: Option<String>,
}

impl Coordinate {
    /// Create a coordinate with the given type and no classifier.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            kind: kind.into(),
            classifier: None,
        }
    }

    /// Create a `jar` coordinate.
    pub fn jar(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::new(group, artifact, version, DEFAULT_TYPE)
    }

    /// Return a copy of this coordinate with a classifier.
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The artifact type (`jar`, `nar`, ...).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// Check whether this artifact is of the given type, ignoring case.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.eq_ignore_ascii_case(kind)
    }

    /// Check whether this coordinate names `group:artifact`, any version.
    pub fn matches(&self, group: &str, artifact: &str) -> bool {
        self.group == group && self.artifact == artifact
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.kind)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        write!(f, ":{}", self.version)
    }
}

impl FromStr for Coordinate {
    type Err = ExtensionError;

    /// Parse `group:id:version`, `group:id:type:version` or
    /// `group:id:type:classifier:version`.
    fn from_str(s: &str) -> ExtensionResult<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ExtensionError::InvalidCoordinate(s.to_string()));
        }

        match parts.as_slice() {
            [group, artifact, version] => Ok(Self::jar(*group, *artifact, *version)),
            [group, artifact, kind, version] => Ok(Self::new(*group, *artifact, *version, *kind)),
            [group, artifact, kind, classifier, version] => {
                Ok(Self::new(*group, *artifact, *version, *kind).with_classifier(*classifier))
            }
            _ => Err(ExtensionError::InvalidCoordinate(s.to_string())),
        }
    }
}

/// A coordinate together with its binary location, if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub coordinate: Coordinate,

    /// Location of the artifact's file or exploded directory. `None` means
    /// the resolver must be asked for it.
    pub file: Option<PathBuf>,
}

impl ResolvedArtifact {
    pub fn new(coordinate: Coordinate, file: Option<PathBuf>) -> Self {
        Self { coordinate, file }
    }
}
