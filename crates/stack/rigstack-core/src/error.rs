//! Error taxonomy for the stack engine.
//!
//! Construction-time problems (`StackError`, `RegistryError`, `SnapshotError`) are returned to
//! the caller. Build-time problems are `BuildFailure`s: they are recorded on the component
//! and folded into the pass result, never raised.

use std::path::PathBuf;

use rigstack_api_core::AttributeCategory;
use thiserror::Error;

use crate::component::ComponentStatus;
use crate::ids::ComponentId;
use crate::registry::Version;

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// No registration carries this identifier
    #[error("no component registered as '{identifier}'")]
    NotFound { identifier: String },

    /// The identifier exists but not at the pinned version
    #[error("component '{identifier}' has no version {version} (available: {available:?})")]
    VersionNotFound {
        identifier: String,
        version: Version,
        available: Vec<Version>,
    },

    /// A search location could not be read
    #[error("cannot scan component path {path:?}: {reason}")]
    SearchPath { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum StackError {
    #[error("unknown component type '{identifier}': {source}")]
    UnknownComponentType {
        identifier: String,
        #[source]
        source: RegistryError,
    },

    #[error("component {0} is not a member of this stack")]
    UnknownComponent(ComponentId),

    #[error("cannot place component {component} under {parent}: it would become its own ancestor")]
    CyclicParent {
        component: ComponentId,
        parent: ComponentId,
    },

    #[error("component '{label}' declares no {category} named '{name}'")]
    UnknownAttribute {
        label: String,
        category: AttributeCategory,
        name: String,
    },

    /// Labels must be non-empty and bracket-free so their addresses parse back
    #[error("invalid component label '{label}': {reason}")]
    InvalidLabel { label: String, reason: &'static str },

    #[error("on_enter_stack failed for '{label}': {message}")]
    EnterStack { label: String, message: String },

    #[error("invalid snapshot: {reason}")]
    InvalidSnapshot { reason: String },
}

impl StackError {
    /// Coarse category for logging.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownComponentType { .. } => "registry",
            Self::UnknownComponent(_) | Self::CyclicParent { .. } => "forest",
            Self::UnknownAttribute { .. } => "attribute",
            Self::InvalidLabel { .. } => "label",
            Self::EnterStack { .. } => "plugin",
            Self::InvalidSnapshot { .. } => "snapshot",
        }
    }
}

/// Why a component did not reach `Success` during a build pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildFailure {
    /// `is_valid()` returned false
    #[error("component reported itself invalid")]
    InvalidComponent,

    /// One or more `validate` requirements were empty
    #[error("unsatisfied requirements: {}", .names.join(", "))]
    UnsatisfiedRequirement { names: Vec<String> },

    /// `run` returned an error or panicked
    #[error("run fault: {message}")]
    RunFault { message: String },

    /// `run` completed but reported failure
    #[error("run reported failure")]
    RunReturnedFalse,
}

impl BuildFailure {
    /// Status a component ends the pass with after this failure.
    pub fn status(&self) -> ComponentStatus {
        match self {
            Self::InvalidComponent | Self::UnsatisfiedRequirement { .. } => {
                ComponentStatus::Invalid
            }
            Self::RunFault { .. } | Self::RunReturnedFalse => ComponentStatus::Failed,
        }
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported snapshot format {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value '{value}' for {key}")]
    InvalidEnv { key: &'static str, value: String },
}
