//! Builds the loading-context chain for a module.
//!
//! Each module may depend on at most one other module. The builder follows
//! that single-parent relation down to a module with no module dependency,
//! creates the shared foundation context there, and then builds one context
//! per module level on the way back up:
//!
//! ```text
//! foundation (framework API, extension points, logging contract)
//!   └── grandparent module
//!         └── parent module
//!               └── root module   <- returned
//! ```
//!
//! Nothing is built until every level's dependency set has been fetched and
//! checked, so a structural error leaves no partial chain behind.

use crate::artifact::{Coordinate, ResolvedArtifact};
use crate::config::{ArtifactKey, FoundationConfig};
use crate::context::LoadingContext;
use crate::error::{ExtensionError, ExtensionResult};
use crate::provider::{ArtifactResolver, DependencyGraphProvider, DependencySet};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds the loading-context hierarchy of a module.
pub struct ModuleContextBuilder<G, R> {
    graph: G,
    resolver: R,
    config: FoundationConfig,
    excluded: BTreeSet<Coordinate>,
}

impl<G, R> ModuleContextBuilder<G, R>
where
    G: DependencyGraphProvider,
    R: ArtifactResolver,
{
    pub fn new(graph: G, resolver: R) -> Self {
        Self {
            graph,
            resolver,
            config: FoundationConfig::default(),
            excluded: BTreeSet::new(),
        }
    }

    pub fn with_config(mut self, config: FoundationConfig) -> Self {
        self.config = config;
        self
    }

    /// Never expose `coordinate` in any level, typically the invoking tool's
    /// own artifact.
    pub fn exclude(mut self, coordinate: Coordinate) -> Self {
        self.excluded.insert(coordinate);
        self
    }

    pub fn config(&self) -> &FoundationConfig {
        &self.config
    }

    /// Build the chain for `root` and return its leaf context.
    pub fn build(&self, root: &Coordinate) -> ExtensionResult<Arc<LoadingContext>> {
        info!("Building loading contexts for {}", root);

        let mut visited = vec![root.clone()];
        let dependencies = self.module_dependencies(root, &visited)?;

        debug!("Module artifacts of {}:", root);
        for coordinate in dependencies.coordinates() {
            debug!("  {}", coordinate);
        }

        let mut accumulated = dependencies.clone();
        let leaf = self.build_level(root, dependencies, &mut accumulated, &mut visited)?;

        debug!("Full loading context is:\n{}", leaf.to_tree());
        Ok(leaf)
    }

    fn build_level(
        &self,
        module: &Coordinate,
        mut dependencies: DependencySet,
        accumulated: &mut DependencySet,
        visited: &mut Vec<Coordinate>,
    ) -> ExtensionResult<Arc<LoadingContext>> {
        let parent = match self.take_parent_module(module, &mut dependencies)? {
            Some(parent_module) => {
                info!("Found module dependency of {}: {}", module, parent_module);
                visited.push(parent_module.clone());

                let parent_dependencies = self.module_dependencies(&parent_module, visited)?;
                accumulated.extend(&parent_dependencies);
                self.build_level(&parent_module, parent_dependencies, accumulated, visited)?
            }
            None => self.build_foundation(accumulated)?,
        };

        self.build_module_context(module, &dependencies, parent)
    }

    /// Transitive dependencies of `module`, minus the modules already on the
    /// chain and the excluded artifacts.
    fn module_dependencies(
        &self,
        module: &Coordinate,
        visited: &[Coordinate],
    ) -> ExtensionResult<DependencySet> {
        let mut dependencies = self.graph.dependencies(module).map_err(|e| match e {
            ExtensionError::DependencyGraphBuildFailed { .. } => e,
            other => ExtensionError::DependencyGraphBuildFailed {
                coordinate: module.clone(),
                reason: other.to_string(),
            },
        })?;

        for coordinate in visited.iter().chain(self.excluded.iter()) {
            if dependencies.remove(coordinate).is_some() && coordinate != module {
                debug!("Ignoring dependency of {} on {}", module, coordinate);
            }
        }

        debug!(
            "Dependencies of {} resolved to {} artifacts",
            module,
            dependencies.len()
        );
        Ok(dependencies)
    }

    /// Remove and return the single module-typed dependency, if any.
    fn take_parent_module(
        &self,
        module: &Coordinate,
        dependencies: &mut DependencySet,
    ) -> ExtensionResult<Option<Coordinate>> {
        let candidates: Vec<Coordinate> = dependencies
            .coordinates()
            .filter(|c| c.is_kind(&self.config.module_type))
            .cloned()
            .collect();

        match candidates.len() {
            0 => Ok(None),
            1 => {
                let parent = candidates.into_iter().next();
                if let Some(parent) = &parent {
                    dependencies.remove(parent);
                }
                Ok(parent)
            }
            _ => Err(ExtensionError::AmbiguousParentModule {
                module: module.clone(),
                candidates,
            }),
        }
    }

    fn build_foundation(&self, accumulated: &DependencySet) -> ExtensionResult<Arc<LoadingContext>> {
        let api = &self.config.api;
        let api_version = self
            .provided_version(accumulated, api)
            .ok_or_else(|| ExtensionError::MissingApiDependency(api.to_string()))?;
        info!("Found a dependency on version {} of {}", api_version, api);

        let mut provided = vec![
            Coordinate::jar(&api.group, &api.artifact, &api_version),
            Coordinate::jar(&api.group, &self.config.framework_api_artifact, &api_version),
        ];

        let logging = &self.config.logging;
        match self.provided_version(accumulated, logging) {
            Some(version) => provided.push(Coordinate::jar(&logging.group, &logging.artifact, version)),
            None => warn!(
                "No dependency on {} found; the foundation context will not include it",
                logging
            ),
        }

        let mut artifacts = BTreeMap::new();
        for coordinate in provided {
            let known = accumulated
                .iter()
                .find(|a| a.coordinate == coordinate)
                .and_then(|a| a.file);
            let path = self.locate(&ResolvedArtifact::new(coordinate.clone(), known))?;
            artifacts.insert(coordinate, path);
        }

        debug!(
            "Creating foundation context with artifacts: {:?}",
            artifacts.keys().map(|c| c.to_string()).collect::<Vec<_>>()
        );
        Ok(Arc::new(LoadingContext::new(artifacts, None, None)))
    }

    /// Version of `key` the hierarchy depends on: a direct dependency first,
    /// then one found in the dependency graph of any accumulated artifact.
    fn provided_version(&self, accumulated: &DependencySet, key: &ArtifactKey) -> Option<String> {
        debug!("Determining provided version of {}", key);

        if let Some(found) = accumulated
            .coordinates()
            .find(|c| c.matches(&key.group, &key.artifact))
        {
            return Some(found.version().to_string());
        }

        for candidate in accumulated.coordinates() {
            match self.graph.dependencies(candidate) {
                Ok(dependencies) => {
                    if let Some(found) = dependencies
                        .coordinates()
                        .find(|c| c.matches(&key.group, &key.artifact))
                    {
                        debug!(
                            "Found version of {} to be {} via {}",
                            key,
                            found.version(),
                            candidate
                        );
                        return Some(found.version().to_string());
                    }
                }
                Err(e) => {
                    warn!(
                        "Unable to build dependency graph of {} when determining the version of {}",
                        candidate, key
                    );
                    debug!("Dependency graph failure for {}: {}", candidate, e);
                }
            }
        }

        None
    }

    fn build_module_context(
        &self,
        module: &Coordinate,
        dependencies: &DependencySet,
        parent: Arc<LoadingContext>,
    ) -> ExtensionResult<Arc<LoadingContext>> {
        let mut artifacts = BTreeMap::new();
        for artifact in dependencies.iter() {
            if parent.exposes(&artifact.coordinate) {
                debug!(
                    "{} is already exposed by an ancestor of {}",
                    artifact.coordinate, module
                );
                continue;
            }
            let path = self.locate(&artifact)?;
            artifacts.insert(artifact.coordinate, path);
        }

        info!(
            "Created loading context for {} with {} artifacts",
            module,
            artifacts.len()
        );
        Ok(Arc::new(LoadingContext::new(
            artifacts,
            Some(parent),
            Some(module.clone()),
        )))
    }

    /// File of `artifact`, resolving it when absent.
    fn locate(&self, artifact: &ResolvedArtifact) -> ExtensionResult<PathBuf> {
        match &artifact.file {
            Some(file) if file.exists() => {
                debug!("Adding {:?} for {}", file, artifact.coordinate);
                Ok(file.clone())
            }
            Some(file) => {
                debug!(
                    "{:?} does not exist; resolving {} instead",
                    file, artifact.coordinate
                );
                self.resolve(&artifact.coordinate)
            }
            None => {
                debug!(
                    "Attempting to resolve {} because it has no file associated with it",
                    artifact.coordinate
                );
                self.resolve(&artifact.coordinate)
            }
        }
    }

    fn resolve(&self, coordinate: &Coordinate) -> ExtensionResult<PathBuf> {
        match self.resolver.resolve(coordinate) {
            Ok(path) if path.exists() => {
                debug!("Resolved {} to {:?}", coordinate, path);
                Ok(path)
            }
            Ok(path) => {
                debug!("Resolver returned missing file {:?} for {}", path, coordinate);
                Err(ExtensionError::UnresolvableArtifact(coordinate.clone()))
            }
            Err(e) => {
                debug!("Could not resolve {}: {}", coordinate, e);
                Err(ExtensionError::UnresolvableArtifact(coordinate.clone()))
            }
        }
    }
}
