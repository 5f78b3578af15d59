//! Error types for loading-context construction and extension discovery.

use crate::artifact::Coordinate;
use crate::definition::ExtensionType;
use thiserror::Error;

/// Errors that can occur while building loading contexts or extracting
/// extension metadata.
#[derive(Error, Debug)]
pub enum ExtensionError {
    /// A module's dependency set names more than one other module.
    #[error("Module {module} depends on more than one module: {candidates:?}")]
    AmbiguousParentModule {
        module: Coordinate,
        candidates: Vec<Coordinate>,
    },

    /// No level of the hierarchy depends on the framework API.
    #[error("Could not find any dependency, provided or otherwise, on [{0}]")]
    MissingApiDependency(String),

    /// An artifact has no file and the resolver could not supply one.
    #[error("Could not resolve artifact {0}")]
    UnresolvableArtifact(Coordinate),

    /// The dependency graph of an artifact could not be produced.
    #[error("Failed to build dependency graph for {coordinate}: {reason}")]
    DependencyGraphBuildFailed { coordinate: Coordinate, reason: String },

    /// A class is not visible from the loading context.
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// Class file bytes could not be parsed.
    #[error("Invalid class file {class}: {reason}")]
    InvalidClassFile { class: String, reason: String },

    /// A metadata marker carried a value of an unexpected shape.
    #[error("Invalid {marker} marker on {class}: {reason}")]
    InvalidMarker {
        marker: String,
        class: String,
        reason: String,
    },

    /// The extension type has no contract interface configured.
    #[error("No contract interface is mapped for extension type {0}")]
    UnmappedExtensionType(ExtensionType),

    /// Introspection of one candidate class failed.
    #[error("Failed to create extension definition for {extension_type} {class_name}: {source}")]
    ExtensionDefinition {
        extension_type: ExtensionType,
        class_name: String,
        source: Box<ExtensionError>,
    },

    /// An artifact coordinate string was malformed.
    #[error("Invalid artifact coordinate: {0}")]
    InvalidCoordinate(String),

    /// The dependency lockfile is structurally invalid.
    #[error("Invalid lockfile: {0}")]
    InvalidLockfile(String),

    /// A properties document does not describe an extension.
    #[error("Invalid extension properties: {0}")]
    InvalidProperties(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive error.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for extension operations.
pub type ExtensionResult<T> = std::result::Result<T, ExtensionError>;
