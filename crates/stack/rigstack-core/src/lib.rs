//! rigstack-core
//!
//! The component stack build engine: a forest of components with explicit ordering, named
//! attributes addressed by string, a versioned registry of component implementations, and a
//! deterministic build pass that records per-component status.
//!
//! Host-specific construction (scene graph, naming) lives behind the traits in [`host`];
//! the engine only calls component lifecycle methods.

pub mod attribute;
pub mod component;
pub mod config;
pub mod error;
pub mod host;
pub mod ids;
pub mod registry;
pub mod resolver;
pub mod snapshot;
pub mod stack;

pub use attribute::{Attribute, AttributeSet};
pub use component::{BuildContext, Component, ComponentNode, ComponentStatus};
pub use config::{BuildConfig, Config, FailurePolicy, NamingConfig, RegistryConfig};
pub use error::{BuildFailure, ConfigError, RegistryError, SnapshotError, StackError};
pub use ids::ComponentId;
pub use registry::{
    ComponentDefinition, ComponentRegistry, DefinitionSource, DiscoveryReport, Factory,
    Registration, Version,
};
pub use snapshot::{ComponentSnapshot, StackSnapshot};
pub use stack::{BuildEntry, BuildReport, ComponentRequest, Stack};

pub use rigstack_api_core::{Address, AddressError, AttributeCategory, Value, ValueKind};
