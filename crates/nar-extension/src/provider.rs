//! Seams to the dependency-graph and artifact-resolution collaborators.
//!
//! The builder never walks a repository itself. It asks a
//! [`DependencyGraphProvider`] for the transitive dependencies of a module and
//! an [`ArtifactResolver`] for the file of any artifact that arrives without
//! one.

use crate::artifact::{Coordinate, ResolvedArtifact};
use crate::error::ExtensionResult;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Transitive dependency set of an artifact. Keys are unique coordinates;
/// a `None` file means the location has to be resolved on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    artifacts: BTreeMap<Coordinate, Option<PathBuf>>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact. The first location recorded for a coordinate wins.
    pub fn insert(&mut self, coordinate: Coordinate, file: Option<PathBuf>) {
        self.artifacts.entry(coordinate).or_insert(file);
    }

    /// Merge another set into this one, keeping existing locations.
    pub fn extend(&mut self, other: &DependencySet) {
        for (coordinate, file) in &other.artifacts {
            self.insert(coordinate.clone(), file.clone());
        }
    }

    pub fn remove(&mut self, coordinate: &Coordinate) -> Option<Option<PathBuf>> {
        self.artifacts.remove(coordinate)
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        self.artifacts.contains_key(coordinate)
    }

    pub fn coordinates(&self) -> impl Iterator<Item = &Coordinate> {
        self.artifacts.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = ResolvedArtifact> + '_ {
        self.artifacts
            .iter()
            .map(|(c, f)| ResolvedArtifact::new(c.clone(), f.clone()))
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl FromIterator<ResolvedArtifact> for DependencySet {
    fn from_iter<T: IntoIterator<Item = ResolvedArtifact>>(iter: T) -> Self {
        let mut set = DependencySet::new();
        for artifact in iter {
            set.insert(artifact.coordinate, artifact.file);
        }
        set
    }
}

/// Produces the full transitive dependency set of an artifact.
pub trait DependencyGraphProvider {
    /// Return every artifact `coordinate` depends on, directly or
    /// transitively. The set may include `coordinate` itself.
    fn dependencies(&self, coordinate: &Coordinate) -> ExtensionResult<DependencySet>;
}

/// Locates the binary file of an artifact.
pub trait ArtifactResolver {
    /// Return the location of `coordinate`, or
    /// [`ExtensionError::UnresolvableArtifact`](crate::ExtensionError::UnresolvableArtifact).
    fn resolve(&self, coordinate: &Coordinate) -> ExtensionResult<PathBuf>;
}

impl<T: DependencyGraphProvider + ?Sized> DependencyGraphProvider for &T {
    fn dependencies(&self, coordinate: &Coordinate) -> ExtensionResult<DependencySet> {
        (**self).dependencies(coordinate)
    }
}

impl<T: ArtifactResolver + ?Sized> ArtifactResolver for &T {
    fn resolve(&self, coordinate: &Coordinate) -> ExtensionResult<PathBuf> {
        (**self).resolve(coordinate)
    }
}
