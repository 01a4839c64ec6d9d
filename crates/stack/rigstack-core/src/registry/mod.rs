//! Component registry: versioned lookup from identifier to factory.
//!
//! Implementations reach the registry two ways:
//! - [`ComponentRegistry::register`] binds an identifier and version to a factory in code.
//! - [`ComponentRegistry::discover`] scans directories for definition files. Each file names
//!   a native builder (made available through [`ComponentRegistry::register_builder`]) and
//!   pins an identifier + version, optionally overriding the builder's declared defaults.
//!
//! Every registered revision is retained so a rig authored against an old revision keeps
//! rebuilding the same way, while new components default to the newest revision.

mod discovery;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use hashbrown::HashMap;
use indexmap::IndexMap;
use log::{debug, info, warn};
use rigstack_api_core::{AttributeCategory, Value};
use serde::{Deserialize, Serialize, Serializer};

use crate::attribute::AttributeSet;
use crate::component::Component;
use crate::config::RegistryConfig;
use crate::error::RegistryError;

pub use discovery::{DiscoveryReport, RejectedDefinition};

/// Creates a fresh behaviour instance for one component.
pub type Factory = Rc<dyn Fn() -> Box<dyn Component>>;

/// Component revision. Integer or fractional; compared numerically.
#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(transparent)]
pub struct Version(f64);

impl Version {
    pub fn new(version: f64) -> Self {
        Version(version)
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Version(1.0)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{:.0}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // whole revisions are written as integers
        if self.0.fract() == 0.0 && self.0.abs() < 9.0e15 {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl From<u32> for Version {
    fn from(v: u32) -> Self {
        Version(f64::from(v))
    }
}

impl From<i32> for Version {
    fn from(v: i32) -> Self {
        Version(f64::from(v))
    }
}

impl From<f64> for Version {
    fn from(v: f64) -> Self {
        Version(v)
    }
}

/// Where a registration came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefinitionSource {
    /// Registered in code
    Builtin,
    /// Discovered from a definition file
    File(PathBuf),
}

impl fmt::Display for DefinitionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionSource::Builtin => f.write_str("<builtin>"),
            DefinitionSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Metadata for one registered revision.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDefinition {
    pub identifier: String,
    pub version: Version,
    /// Native builder the factory came from.
    pub builder: String,
    pub description: Option<String>,
    /// Default overrides applied on top of the builder's declarations.
    pub options: IndexMap<String, Value>,
    pub requirements: IndexMap<String, Value>,
    pub source: DefinitionSource,
}

impl ComponentDefinition {
    pub fn builtin(identifier: impl Into<String>, version: Version) -> Self {
        let identifier = identifier.into();
        Self {
            builder: identifier.clone(),
            identifier,
            version,
            description: None,
            options: IndexMap::new(),
            requirements: IndexMap::new(),
            source: DefinitionSource::Builtin,
        }
    }

    fn same_registration(&self, other: &ComponentDefinition) -> bool {
        self.identifier == other.identifier
            && self.version == other.version
            && self.source == other.source
    }
}

/// A definition bound to the factory that instantiates it.
#[derive(Clone)]
pub struct Registration {
    definition: ComponentDefinition,
    factory: Factory,
    sequence: u64,
}

impl Registration {
    pub fn definition(&self) -> &ComponentDefinition {
        &self.definition
    }

    pub fn identifier(&self) -> &str {
        &self.definition.identifier
    }

    pub fn version(&self) -> Version {
        self.definition.version
    }

    /// Create a behaviour instance and run its declarations, then apply the definition's
    /// default overrides.
    pub fn instantiate(&self) -> (Box<dyn Component>, AttributeSet) {
        let behaviour = (self.factory)();
        let mut attributes = AttributeSet::new();
        behaviour.declare(&mut attributes);

        let overrides = [
            (AttributeCategory::Option, &self.definition.options),
            (AttributeCategory::Requirement, &self.definition.requirements),
        ];
        for (category, values) in overrides {
            for (name, value) in values {
                match attributes.get_mut(category, name) {
                    Some(attr) => attr.reseed_default(value.clone()),
                    None => warn!(
                        "definition {} v{} overrides undeclared {} '{}'",
                        self.definition.identifier, self.definition.version, category, name
                    ),
                }
            }
        }
        (behaviour, attributes)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("definition", &self.definition)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

/// Versioned plugin library. Construct one per session (or per test) and hand it to the
/// [`Stack`](crate::stack::Stack); nothing here is process-global.
pub struct ComponentRegistry {
    builders: HashMap<String, Factory>,
    entries: HashMap<String, Vec<Registration>>,
    search_paths: Vec<PathBuf>,
    extension: String,
    recursive: bool,
    sequence: u64,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::from_config(&RegistryConfig::default())
    }

    /// Registry seeded with the configured search paths. Nothing is scanned until
    /// [`ComponentRegistry::refresh`] or [`ComponentRegistry::discover`] runs.
    pub fn from_config(cfg: &RegistryConfig) -> Self {
        Self {
            builders: HashMap::new(),
            entries: HashMap::new(),
            search_paths: cfg.search_paths.clone(),
            extension: cfg.extension.clone(),
            recursive: cfg.recursive,
            sequence: 0,
        }
    }

    /// Expose a native builder that definition files can refer to by `name`.
    pub fn register_builder<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Component> + 'static,
    {
        self.builders.insert(name.into(), Rc::new(factory));
    }

    pub fn has_builder(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Register a factory in code. Returns false when this identifier + version is already
    /// registered from code.
    pub fn register<F>(&mut self, identifier: impl Into<String>, version: impl Into<Version>, factory: F) -> bool
    where
        F: Fn() -> Box<dyn Component> + 'static,
    {
        let definition = ComponentDefinition::builtin(identifier, version.into());
        self.register_definition(definition, Rc::new(factory))
    }

    /// Register a definition with an explicit factory. Duplicate (identifier, version,
    /// source) triples are ignored and reported as `false`.
    pub fn register_definition(&mut self, definition: ComponentDefinition, factory: Factory) -> bool {
        let slot = self
            .entries
            .entry(definition.identifier.clone())
            .or_default();
        if slot
            .iter()
            .any(|existing| existing.definition.same_registration(&definition))
        {
            debug!(
                "skipping duplicate registration {} v{} from {}",
                definition.identifier, definition.version, definition.source
            );
            return false;
        }
        self.sequence += 1;
        debug!(
            "registered {} v{} from {}",
            definition.identifier, definition.version, definition.source
        );
        slot.push(Registration {
            definition,
            factory,
            sequence: self.sequence,
        });
        true
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Remember a search location for future [`ComponentRegistry::refresh`] calls.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    /// Scan `paths` for definition files, remembering them as search locations.
    /// Scanning the same location again registers nothing new.
    ///
    /// Every location is listed before anything is registered or remembered, so an
    /// unreadable path leaves the registry as it was.
    pub fn discover<I, P>(&mut self, paths: I) -> Result<DiscoveryReport, RegistryError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        let files = self.collect(&paths)?;
        for path in paths {
            self.add_search_path(path);
        }
        Ok(self.register_files(files))
    }

    /// Drop everything discovered from files and rescan all remembered search paths.
    /// Code registrations survive. If any path cannot be listed the registry is untouched.
    pub fn refresh(&mut self) -> Result<DiscoveryReport, RegistryError> {
        let files = self.collect(&self.search_paths)?;
        for slot in self.entries.values_mut() {
            slot.retain(|reg| reg.definition.source == DefinitionSource::Builtin);
        }
        self.entries.retain(|_, slot| !slot.is_empty());
        Ok(self.register_files(files))
    }

    fn collect(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>, RegistryError> {
        let mut files = Vec::new();
        for root in paths {
            files.extend(discovery::collect_definition_files(
                root,
                &self.extension,
                self.recursive,
            )?);
        }
        Ok(files)
    }

    fn register_files(&mut self, files: Vec<PathBuf>) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        for file in files {
            let definition = match discovery::read_definition(&file) {
                Ok(definition) => definition,
                Err(reason) => {
                    warn!("rejected component definition {}: {}", file.display(), reason);
                    report.reject(file, reason);
                    continue;
                }
            };
            let Some(factory) = self.builders.get(&definition.builder).cloned() else {
                let reason = format!("unknown builder '{}'", definition.builder);
                warn!("rejected component definition {}: {}", file.display(), reason);
                report.reject(file, reason);
                continue;
            };
            let key = (definition.identifier.clone(), definition.version);
            if self.register_definition(definition, factory) {
                report.registered.push(key);
            } else {
                report.duplicates += 1;
            }
        }
        info!(
            "component discovery: {} registered, {} already known, {} rejected",
            report.registered.len(),
            report.duplicates,
            report.rejected.len()
        );
        report
    }

    /// Resolve an identifier to a registration: the newest revision when `version` is
    /// `None`, otherwise exactly the pinned one. Ties at one version go to the most recent
    /// registration.
    pub fn request(
        &self,
        identifier: &str,
        version: Option<Version>,
    ) -> Result<&Registration, RegistryError> {
        let slot = self
            .entries
            .get(identifier)
            .filter(|slot| !slot.is_empty())
            .ok_or_else(|| RegistryError::NotFound {
                identifier: identifier.to_string(),
            })?;

        let found = match version {
            None => slot
                .iter()
                .max_by(|a, b| (a.version(), a.sequence).cmp(&(b.version(), b.sequence))),
            Some(pinned) => slot
                .iter()
                .filter(|reg| reg.version() == pinned)
                .max_by_key(|reg| reg.sequence),
        };

        found.ok_or_else(|| RegistryError::VersionNotFound {
            identifier: identifier.to_string(),
            version: version.unwrap_or_default(),
            available: self.versions(identifier),
        })
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries
            .get(identifier)
            .is_some_and(|slot| !slot.is_empty())
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, slot)| !slot.is_empty())
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Distinct versions registered for `identifier`, ascending.
    pub fn versions(&self, identifier: &str) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .entries
            .get(identifier)
            .map(|slot| slot.iter().map(Registration::version).collect())
            .unwrap_or_default();
        versions.sort();
        versions.dedup();
        versions
    }

    /// Total number of registrations across all identifiers and versions.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builders: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        builders.sort_unstable();
        f.debug_struct("ComponentRegistry")
            .field("identifiers", &self.identifiers())
            .field("registrations", &self.len())
            .field("builders", &builders)
            .field("search_paths", &self.search_paths)
            .finish()
    }
}
