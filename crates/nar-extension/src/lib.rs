//! # nar-extension
//!
//! Loading-context hierarchy and extension discovery for NAR modules.
//!
//! This crate provides:
//! - Artifact coordinates, dependency sets and a local repository layout
//! - A builder that mirrors a module's single-parent module chain as a chain
//!   of isolated loading contexts rooted at a shared API foundation
//! - Class file introspection that never runs class code
//! - Discovery of registered extensions and extraction of their metadata
//! - Properties, XML and JSON renderings of the results
//!
//! ## Loading Model
//!
//! Each context exposes its own artifacts and delegates to at most one
//! parent. Lookups are parent-first, so a contract interface provided by the
//! foundation or by a parent module keeps a single identity no matter which
//! level asks for it. Service API attribution relies on that identity: a
//! controller service's interfaces are credited to the module whose level
//! defined them.

pub mod artifact;
pub mod builder;
pub mod classfile;
pub mod classpath;
pub mod config;
pub mod context;
pub mod definition;
pub mod discovery;
pub mod docs;
pub mod error;
pub mod extract;
pub mod provider;
pub mod repository;
pub mod writer;

pub use artifact::{Coordinate, ResolvedArtifact};
pub use builder::ModuleContextBuilder;
pub use config::{ArtifactKey, ContractMapping, DiscoveryConfig, FoundationConfig, MarkerNames};
pub use context::{ContextId, LoadedClass, LoadingContext};
pub use definition::{
    DefinitionMap, ExtensionDefinition, ExtensionType, Restriction, Restrictions,
    ServiceApiDefinition,
};
pub use discovery::{parse_registration, ExtensionDiscovery};
pub use docs::{DiscoveryFailure, DocumentationGenerator, DocumentationReport, OutputFormat};
pub use error::{ExtensionError, ExtensionResult};
pub use extract::MetadataExtractor;
pub use provider::{ArtifactResolver, DependencyGraphProvider, DependencySet};
pub use repository::{DependencyLockfile, LocalRepository};
